//! 通用常量.

/// 分割网络的输出标签.
pub mod label {
    /// 背景.
    pub const BACKGROUND: u8 = 0;

    /// 坏死 / 非增强肿瘤核心.
    pub const NECROTIC: u8 = 1;

    /// 水肿.
    pub const EDEMA: u8 = 2;

    /// 增强肿瘤.
    pub const ENHANCING: u8 = 3;

    /// 分割网络的类别总数 (含背景).
    pub const SEG_CLASSES: usize = 4;

    /// 像素是否属于肿瘤 (任何非零标签)?
    #[inline]
    pub const fn is_tumor(p: u8) -> bool {
        p != BACKGROUND
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 标签的法语名称, 与报告保持一致.
    pub const fn name(p: u8) -> &'static str {
        match p {
            BACKGROUND => "Fond",
            NECROTIC => "Nécrose",
            EDEMA => "Œdème",
            ENHANCING => "Zone active",
            _ => "Inconnu",
        }
    }
}

/// 分割网络输入切片的边长 (像素).
pub const IMG_SIZE: usize = 128;

/// 切片窗口在原始体数据 z 方向上的起点.
pub const VOLUME_START_AT: usize = 22;

/// 切片窗口的切片张数.
pub const VOLUME_SLICES: usize = 100;

/// 默认展示的切片 (窗口内索引).
pub const DEFAULT_SLICE: usize = 60;

/// 分割网络输入通道数 (FLAIR, T1CE).
pub const SEG_CHANNELS: usize = 2;

/// 分类网络输入图像的边长 (像素).
pub const CLASSIFY_SIZE: usize = 150;

/// 置信度 (百分比) 低于该值时只给出警告级别.
pub const ALERT_CONFIDENCE: f32 = 80.0;

/// 分割网络默认文件名.
pub const SEG_MODEL_FILE: &str = "model_x81_dcs65.rten";

/// 分类网络默认文件名.
pub const CLS_MODEL_FILE: &str = "effnet.rten";
