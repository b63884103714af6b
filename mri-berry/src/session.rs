//! 最近一次预测的会话缓存.
//!
//! 命令行每次只执行一个动作, 因此最近一次分割 / 分类的结果会被持久化到一个
//! `bincode` 文件中, 后续的测量与渲染直接复用, 不必重新推理.

use crate::classify::ClassificationResult;
use crate::preprocess::SliceWindow;
use crate::segment::{CompactMaskStack, SegmentationResult};
use crate::VoxelSpacing;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 会话文件读写错误.
#[derive(Debug)]
pub enum SessionError {
    /// 文件读写或 (解) 压缩失败.
    Io(io::Error),

    /// 编解码失败.
    Codec(bincode::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "session I/O error: {e}"),
            Self::Codec(e) => write!(f, "corrupted session file: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Codec(e) => Some(e.as_ref()),
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<bincode::Error> for SessionError {
    fn from(value: bincode::Error) -> Self {
        Self::Codec(value)
    }
}

/// 持久化的分割结果, 标签栈以压缩形式保存.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSegmentation {
    mask: CompactMaskStack,
    spacing: VoxelSpacing,
    window: SliceWindow,

    /// FLAIR 体数据路径.
    pub flair: PathBuf,

    /// T1CE 体数据路径.
    pub t1ce: PathBuf,
}

impl StoredSegmentation {
    /// 还原分割结果.
    pub fn restore(&self) -> Result<SegmentationResult, SessionError> {
        Ok(SegmentationResult {
            mask: self.mask.decompress()?,
            spacing: self.spacing,
            window: self.window,
        })
    }
}

/// 持久化的分类结果.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredClassification {
    /// 分类结果.
    pub result: ClassificationResult,

    /// 源图像路径.
    pub image: PathBuf,
}

/// 会话.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    segmentation: Option<StoredSegmentation>,
    classification: Option<StoredClassification>,
}

impl Session {
    /// 从 `path` 读取会话.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// 从 `path` 读取会话. 文件不存在时返回空会话.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        match Self::load(path) {
            Err(SessionError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            r => r,
        }
    }

    /// 写入 `path`, 必要时创建父目录.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(self)?;
        fs::write(path, bytes)?;
        log::debug!("session saved to {}", path.display());
        Ok(())
    }

    /// 记录最近一次分割.
    pub fn set_segmentation(
        &mut self,
        result: &SegmentationResult,
        flair: &Path,
        t1ce: &Path,
    ) -> Result<(), SessionError> {
        self.segmentation = Some(StoredSegmentation {
            mask: result.mask.compress()?,
            spacing: result.spacing,
            window: result.window,
            flair: flair.to_owned(),
            t1ce: t1ce.to_owned(),
        });
        Ok(())
    }

    /// 最近一次分割.
    #[inline]
    pub fn segmentation(&self) -> Option<&StoredSegmentation> {
        self.segmentation.as_ref()
    }

    /// 记录最近一次分类.
    pub fn set_classification(&mut self, result: ClassificationResult, image: &Path) {
        self.classification = Some(StoredClassification {
            result,
            image: image.to_owned(),
        });
    }

    /// 最近一次分类.
    #[inline]
    pub fn classification(&self) -> Option<&StoredClassification> {
        self.classification.as_ref()
    }
}
