//! 网络输入预处理.
//!
//! 1. 体数据: 固定切片窗口重采样, 两模态叠为通道, 全局最大值归一化.
//! 2. 二维图像: 缩放, RGB -> BGR, 加 batch 维, 网络相关的归一化.

mod image2d;
mod resize;
mod volume;

use crate::consts::{IMG_SIZE, VOLUME_SLICES, VOLUME_START_AT};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use image2d::{prepare_image, Normalization};
pub use resize::resize_bilinear;
pub use volume::resample_stack;

/// 预处理错误.
#[derive(Debug)]
pub enum PreprocessError {
    /// 切片窗口参数非法 (张数或边长为 0, 或结束位置溢出).
    InvalidWindow(SliceWindow),

    /// 体数据切片数不足以容纳切片窗口.
    WindowOutOfRange {
        /// 体数据的名称 (序列名).
        modality: &'static str,

        /// 窗口需要的最少切片数.
        needed: usize,

        /// 实际切片数.
        depth: usize,
    },

    /// 图像为空.
    EmptyImage,

    /// 底层数组形状错误.
    Shape(ndarray::ShapeError),
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWindow(w) => write!(f, "invalid slice window {w:?}"),
            Self::WindowOutOfRange {
                modality,
                needed,
                depth,
            } => write!(
                f,
                "{modality} volume has {depth} slices but the window needs {needed}"
            ),
            Self::EmptyImage => write!(f, "image is empty"),
            Self::Shape(e) => write!(f, "array shape error: {e}"),
        }
    }
}

impl std::error::Error for PreprocessError {}

impl From<ndarray::ShapeError> for PreprocessError {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

/// 体数据切片窗口.
///
/// 从原始体数据 z 方向第 `start` 张切片开始, 连续取 `count` 张,
/// 每张缩放为 `size * size`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceWindow {
    /// 起点.
    pub start: usize,

    /// 张数.
    pub count: usize,

    /// 缩放后的边长.
    pub size: usize,
}

impl Default for SliceWindow {
    #[inline]
    fn default() -> Self {
        Self {
            start: VOLUME_START_AT,
            count: VOLUME_SLICES,
            size: IMG_SIZE,
        }
    }
}

impl SliceWindow {
    /// 构建窗口. `count` 或 `size` 为 0, 或 `start + count` 溢出时返回 `None`.
    pub fn new(start: usize, count: usize, size: usize) -> Option<Self> {
        let w = Self { start, count, size };
        w.validate().is_ok().then_some(w)
    }

    /// 窗口在原始体数据上的结束位置 (不含). 溢出时饱和到 `usize::MAX`.
    #[inline]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.count)
    }

    /// 窗口内第 `i` 张切片在原始体数据上的索引. 越界时返回 `None`.
    #[inline]
    pub fn source_index(&self, i: usize) -> Option<usize> {
        if i < self.count {
            self.start.checked_add(i)
        } else {
            None
        }
    }

    /// 窗口内切片的形状 (行, 列).
    #[inline]
    pub fn slice_shape(&self) -> (usize, usize) {
        (self.size, self.size)
    }

    fn validate(&self) -> Result<(), PreprocessError> {
        if self.count == 0 || self.size == 0 || self.start.checked_add(self.count).is_none() {
            return Err(PreprocessError::InvalidWindow(*self));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SliceWindow;

    #[test]
    fn test_default_window() {
        let w = SliceWindow::default();
        assert_eq!((w.start, w.count, w.size), (22, 100, 128));
        assert_eq!(w.end(), 122);
        assert_eq!(w.source_index(60), Some(82));
        assert_eq!(w.source_index(100), None);
    }

    #[test]
    fn test_window_new() {
        assert!(SliceWindow::new(0, 0, 128).is_none());
        assert!(SliceWindow::new(0, 1, 0).is_none());
        assert_eq!(SliceWindow::new(3, 4, 5).unwrap().slice_shape(), (5, 5));
    }

    #[test]
    fn test_window_end_overflow() {
        assert!(SliceWindow::new(usize::MAX, 1, 2).is_none());
        assert!(SliceWindow::new(usize::MAX - 1, 1, 2).is_some());

        let w = SliceWindow {
            start: usize::MAX,
            count: 3,
            size: 2,
        };
        assert_eq!(w.end(), usize::MAX);
        assert_eq!(w.source_index(2), None);
    }
}
