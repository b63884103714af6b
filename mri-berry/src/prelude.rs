//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::window::IntensityWindow;
pub use crate::data::{MriVolume, NiftiHeaderAttr, SliceImage, VoxelSpacing};

pub use crate::consts::label::{BACKGROUND, EDEMA, ENHANCING, NECROTIC};
pub use crate::consts::{DEFAULT_SLICE, IMG_SIZE, VOLUME_SLICES, VOLUME_START_AT};

pub use crate::preprocess::{Normalization, SliceWindow};

pub use crate::measure::{measure_slice, SliceMeasurement};

pub use crate::inference::{ClassificationModel, InferenceError, ModelCache, SegmentationModel};

pub use crate::classify::{ClassificationResult, Classifier, Severity, TumorClass};
pub use crate::segment::{MaskStack, SegmentationResult, Segmenter};

pub use crate::patient::{PatientForm, PatientRecord, PatientStore};

pub use crate::session::Session;
