//! 预训练网络推理接缝.
//!
//! 网络本身是不透明的文件, 本模块只规定输入输出张量的形状:
//!
//! 1. 分割网络: `(n, 128, 128, 2)` -> `(n, 128, 128, classes)`, 通道在最后.
//! 2. 分类网络: `(1, h, w, 3)` -> `(1, classes)`.

use ndarray::{Array2, Array3, Array4, ArrayView4, Axis};
use once_cell::sync::OnceCell;
use ordered_float::OrderedFloat;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "rten")]
mod onnx;

#[cfg(feature = "rten")]
pub use onnx::OnnxModel;

/// 推理错误.
#[derive(Debug, Clone)]
pub enum InferenceError {
    /// 网络文件加载失败.
    Load {
        /// 网络文件路径.
        path: PathBuf,

        /// 底层错误描述.
        reason: String,
    },

    /// 网络运行失败.
    Run(String),

    /// 网络输出形状与预期不符.
    OutputShape {
        /// 预期形状描述.
        expected: &'static str,

        /// 实际形状.
        found: Vec<usize>,
    },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { path, reason } => {
                write!(f, "unable to load model {}: {reason}", path.display())
            }
            Self::Run(reason) => write!(f, "prediction failed: {reason}"),
            Self::OutputShape { expected, found } => {
                write!(f, "unexpected model output shape {found:?}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for InferenceError {}

/// 分割网络.
pub trait SegmentationModel {
    /// 输入 `(n, h, w, channels)`, 输出每个像素的类别概率 `(n, h, w, classes)`.
    fn predict_probs(&self, input: ArrayView4<f32>) -> Result<Array4<f32>, InferenceError>;
}

/// 分类网络.
pub trait ClassificationModel {
    /// 输入 `(1, h, w, 3)`, 输出类别概率 `(1, classes)`.
    fn predict_scores(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, InferenceError>;
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Arc<M> {
    #[inline]
    fn predict_probs(&self, input: ArrayView4<f32>) -> Result<Array4<f32>, InferenceError> {
        (**self).predict_probs(input)
    }
}

impl<M: ClassificationModel + ?Sized> ClassificationModel for Arc<M> {
    #[inline]
    fn predict_scores(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, InferenceError> {
        (**self).predict_scores(input)
    }
}

/// 最大值所在的位置. 存在多个最大值时取第一个; NaN 视为最大.
/// 序列为空时返回 `None`.
pub fn argmax<'a, I: IntoIterator<Item = &'a f32>>(it: I) -> Option<usize> {
    let mut best: Option<(usize, OrderedFloat<f32>)> = None;
    for (i, v) in it.into_iter().enumerate() {
        let v = OrderedFloat(*v);
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// 沿最后一维 (类别维) 取 argmax, 得到标签掩码 `(n, h, w)`.
///
/// 类别数为 0 时所有标签记为 0.
pub fn argmax_mask(probs: ArrayView4<f32>) -> Array3<u8> {
    probs.map_axis(Axis(3), |lane| argmax(lane.iter()).unwrap_or(0) as u8)
}

/// 网络加载函数.
pub type ModelLoader<M> = fn(&Path) -> Result<M, InferenceError>;

/// 一次加载、反复使用的网络缓存.
///
/// 第一次调用 [`ModelCache::get`] 时才真正从硬盘加载. 加载失败不会被缓存,
/// 下次调用会重试.
pub struct ModelCache<M> {
    path: PathBuf,
    loader: ModelLoader<M>,
    cell: OnceCell<Arc<M>>,
}

impl<M> fmt::Debug for ModelCache<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<M> ModelCache<M> {
    /// 创建缓存, 此时不加载.
    pub fn new<P: AsRef<Path>>(path: P, loader: ModelLoader<M>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            loader,
            cell: OnceCell::new(),
        }
    }

    /// 获取网络. 首次调用时加载.
    pub fn get(&self) -> Result<Arc<M>, InferenceError> {
        self.cell
            .get_or_try_init(|| {
                log::info!("loading model {}", self.path.display());
                (self.loader)(&self.path).map(Arc::new)
            })
            .cloned()
    }

    /// 网络是否已加载.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// 网络文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "rten")]
impl ModelCache<OnnxModel> {
    /// 使用 `rten` 后端的网络缓存.
    #[inline]
    pub fn onnx<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, OnnxModel::load)
    }
}
