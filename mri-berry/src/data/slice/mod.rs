//! MRI 切片对象的操作.

mod core;
mod save;

pub use core::{OwnedSliceImage, SliceImage};

pub use save::ImgWriteVis;
