use super::{resize_bilinear, PreprocessError};
use image::DynamicImage;
use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};

/// 分类网络相关的输入归一化方式.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// 不做变换, 保持 `[0, 255]`. EfficientNet 系列网络在内部自带缩放层.
    #[default]
    EfficientNet,

    /// 除以 255, 映射到 `[0, 1]`.
    UnitScale,

    /// 映射到 `[-1, 1]`.
    Symmetric,
}

impl Normalization {
    /// 对单个 `[0, 255]` 像素值应用归一化.
    #[inline]
    pub fn apply(&self, v: f32) -> f32 {
        match self {
            Self::EfficientNet => v,
            Self::UnitScale => v / 255.0,
            Self::Symmetric => v / 127.5 - 1.0,
        }
    }
}

/// 将任意图像转换为分类网络输入张量.
///
/// 步骤: 转为 RGB (灰度 / RGBA 图像会先被展开或丢弃透明通道),
/// 双线性缩放到 `size * size` 并取整回 8-bit, 通道顺序换为 BGR,
/// 加 batch 维, 最后按 `norm` 归一化. 结果形状为 `(1, size, size, 3)`.
pub fn prepare_image(
    img: &DynamicImage,
    size: usize,
    norm: Normalization,
) -> Result<Array4<f32>, PreprocessError> {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    if w == 0 || h == 0 || size == 0 {
        return Err(PreprocessError::EmptyImage);
    }
    let src = Array3::from_shape_vec((h as usize, w as usize, 3), rgb.into_raw())?;

    let mut out = Array3::<f32>::zeros((size, size, 3));
    for c in 0..3 {
        let resized = resize_bilinear(src.index_axis(Axis(2), c), (size, size));
        // RGB -> BGR.
        out.index_axis_mut(Axis(2), 2 - c)
            .assign(&resized.mapv(|v| num::clamp(v.round(), 0.0, 255.0)));
    }
    out.mapv_inplace(|v| norm.apply(v));
    Ok(out.insert_axis(Axis(0)))
}
