//! 三维分割流程: 重采样 -> 推理 -> argmax -> 按需测量.

use crate::inference::{argmax_mask, InferenceError, SegmentationModel};
use crate::measure::{self, ClassAreas, SliceMeasurement};
use crate::preprocess::{resample_stack, PreprocessError, SliceWindow};
use crate::{MriVolume, NiftiHeaderAttr, VoxelSpacing};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use ndarray_npy::{write_npy, WriteNpyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;

/// 分割流程错误.
#[derive(Debug)]
pub enum SegmentError {
    /// 预处理失败.
    Preprocess(PreprocessError),

    /// 推理失败.
    Inference(InferenceError),

    /// 请求的切片不在窗口内.
    SliceOutOfRange {
        /// 请求的窗口内索引.
        index: usize,

        /// 窗口切片总数.
        count: usize,
    },
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preprocess(e) => write!(f, "preprocessing failed: {e}"),
            Self::Inference(e) => write!(f, "{e}"),
            Self::SliceOutOfRange { index, count } => {
                write!(f, "slice {index} out of range, the mask has {count} slices")
            }
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Preprocess(e) => Some(e),
            Self::Inference(e) => Some(e),
            Self::SliceOutOfRange { .. } => None,
        }
    }
}

impl From<PreprocessError> for SegmentError {
    fn from(value: PreprocessError) -> Self {
        Self::Preprocess(value)
    }
}

impl From<InferenceError> for SegmentError {
    fn from(value: InferenceError) -> Self {
        Self::Inference(value)
    }
}

/// 分割标签栈, 形状为 `(n, rows, cols)`, 每个像素是 [`crate::consts::label`] 中的一个标签.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskStack {
    data: Array3<u8>,
}

impl From<Array3<u8>> for MaskStack {
    #[inline]
    fn from(data: Array3<u8>) -> Self {
        Self { data }
    }
}

impl MaskStack {
    /// 切片张数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 是否没有切片?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 单张切片形状 (行, 列).
    #[inline]
    pub fn slice_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.data.dim();
        (h, w)
    }

    /// 第 `index` 张切片. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<ArrayView2<'_, u8>> {
        (index < self.len()).then(|| self.data.index_axis(Axis(0), index))
    }

    /// 全部数据视图.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// 取出内部数组.
    #[inline]
    pub fn into_raw(self) -> Array3<u8> {
        self.data
    }

    /// 含有肿瘤像素的切片 (升序).
    #[inline]
    pub fn tumor_slices(&self) -> Vec<usize> {
        measure::tumor_slices(self.data.view())
    }

    /// 以 `.npy` 格式导出全部标签.
    pub fn save_npy<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteNpyError> {
        write_npy(path, &self.data)
    }

    /// 压缩数据.
    pub fn compress(&self) -> io::Result<CompactMaskStack> {
        let data = self.data.as_standard_layout();
        let buf = data.as_slice().unwrap_or_default();
        let mut e = ZlibEncoder::new(Vec::with_capacity(8), Compression::best());
        e.write_all(buf)?;
        Ok(CompactMaskStack {
            buf: e.finish()?,
            sh: self.data.dim(),
        })
    }
}

/// 压缩存储的 [`MaskStack`]; 不透明类型.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactMaskStack {
    /// 压缩的不透明字节流.
    buf: Vec<u8>,

    /// 形状.
    sh: (usize, usize, usize),
}

impl CompactMaskStack {
    /// 解压缩数据. 数据损坏或长度与形状不符时返回错误.
    pub fn decompress(&self) -> io::Result<MaskStack> {
        let (n, h, w) = self.sh;
        let mut d = ZlibDecoder::new(self.buf.as_slice());
        let mut buf = Vec::with_capacity(n * h * w);
        d.read_to_end(&mut buf)?;
        let data = Array3::from_shape_vec(self.sh, buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(MaskStack { data })
    }
}

/// 一次分割的结果.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    /// 窗口内全部切片的标签.
    pub mask: MaskStack,

    /// 测量时使用的切片内分辨率.
    pub spacing: VoxelSpacing,

    /// 生成标签时使用的切片窗口.
    pub window: SliceWindow,
}

impl SegmentationResult {
    fn slice(&self, index: usize) -> Result<ArrayView2<'_, u8>, SegmentError> {
        self.mask.get(index).ok_or(SegmentError::SliceOutOfRange {
            index,
            count: self.mask.len(),
        })
    }

    /// 重新计算窗口内第 `index` 张切片的测量值.
    pub fn measure(&self, index: usize) -> Result<SliceMeasurement, SegmentError> {
        Ok(measure::measure_slice(self.slice(index)?, self.spacing))
    }

    /// 窗口内第 `index` 张切片上各子区域的面积.
    pub fn class_areas(&self, index: usize) -> Result<ClassAreas, SegmentError> {
        Ok(measure::class_areas(self.slice(index)?, self.spacing))
    }

    /// 窗口内第 `index` 张切片在原始体数据上的 z 索引.
    #[inline]
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.window.source_index(index)
    }
}

/// 分割流程.
#[derive(Debug, Clone)]
pub struct Segmenter<M> {
    model: M,
    window: SliceWindow,
    rescale_spacing: bool,
}

impl<M: SegmentationModel> Segmenter<M> {
    /// 使用默认窗口创建.
    pub fn new(model: M) -> Self {
        Self {
            model,
            window: SliceWindow::default(),
            rescale_spacing: false,
        }
    }

    /// 修改切片窗口.
    pub fn with_window(mut self, window: SliceWindow) -> Self {
        self.window = window;
        self
    }

    /// 测量时是否按缩放后的切片重新计算分辨率. 默认沿用原始 header 中的分辨率.
    pub fn rescale_spacing(mut self, yes: bool) -> Self {
        self.rescale_spacing = yes;
        self
    }

    /// 当前切片窗口.
    #[inline]
    pub fn window(&self) -> &SliceWindow {
        &self.window
    }

    /// 对一对 FLAIR / T1CE 体数据执行分割.
    pub fn run(
        &self,
        flair: &MriVolume,
        t1ce: &MriVolume,
    ) -> Result<SegmentationResult, SegmentError> {
        let x = resample_stack(flair, t1ce, &self.window)?;
        let probs = self.model.predict_probs(x.view())?;

        let (count, size) = (self.window.count, self.window.size);
        let (n, h, w, classes) = probs.dim();
        if (n, h, w) != (count, size, size) || classes == 0 {
            return Err(InferenceError::OutputShape {
                expected: "(count, size, size, classes)",
                found: probs.shape().to_vec(),
            }
            .into());
        }

        let mask = MaskStack::from(argmax_mask(probs.view()));
        let native = flair.spacing();
        let spacing = if self.rescale_spacing {
            native.rescaled(flair.slice_shape(), self.window.slice_shape())
        } else {
            native
        };
        log::info!(
            "segmented {count} slices, {} with tumor, spacing {:.3}x{:.3} mm",
            mask.tumor_slices().len(),
            spacing.dx,
            spacing.dy
        );

        Ok(SegmentationResult {
            mask,
            spacing,
            window: self.window,
        })
    }
}
