//! 分割掩码的切片物理测量.
//!
//! 所有测量都把非零标签视为肿瘤. 面积以 mm² 计, 周长以 mm 计,
//! 密度为肿瘤面积占整张切片面积的比例.

use crate::consts::label::{self, EDEMA, ENHANCING, NECROTIC};
use crate::VoxelSpacing;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::arc_length;
use ndarray::{ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// 单张切片的物理测量结果.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceMeasurement {
    /// 肿瘤面积, mm².
    pub surface_mm2: f64,

    /// 所有外轮廓的周长之和, mm.
    pub perimeter_mm: f64,

    /// 肿瘤密度, 取值 `[0, 1]`.
    pub density: f64,
}

/// 单张切片各肿瘤子区域的面积, mm².
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassAreas {
    /// 坏死区.
    pub necrotic: f64,

    /// 水肿区.
    pub edema: f64,

    /// 增强区.
    pub enhancing: f64,
}

impl ClassAreas {
    /// 三类面积之和.
    #[inline]
    pub fn total(&self) -> f64 {
        self.necrotic + self.edema + self.enhancing
    }
}

/// 二值化: 肿瘤像素为 255, 其余为 0.
///
/// 四周补一圈 0. 贴边区域的外轮廓在 `find_contours` 中会被标成孔洞,
/// 补边后才能得到正确的外轮廓. 周长只依赖相对坐标, 不受平移影响.
fn binarize(mask: &ArrayView2<u8>) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32 + 2, rows as u32 + 2, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let inside = (1..=cols).contains(&x) && (1..=rows).contains(&y);
        let tumor = inside && label::is_tumor(mask[(y - 1, x - 1)]);
        Luma([if tumor { 255 } else { 0 }])
    })
}

/// 所有外轮廓 (不含孔洞, 也不含嵌套在孔洞内的轮廓) 的像素周长之和.
///
/// 轮廓按像素中心连成闭合折线计算长度, 单像素区域的周长为 0.
pub fn external_perimeter_px(mask: ArrayView2<u8>) -> f64 {
    let binary = binarize(&mask);
    find_contours::<i32>(&binary)
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| arc_length(&c.points, true))
        .sum()
}

/// 计算一张切片的面积、周长和密度.
///
/// 1. 面积 = 肿瘤像素数 * `dx` * `dy`.
/// 2. 周长 = 外轮廓像素周长 * `dx`.
/// 3. 密度 = 面积 / 整张切片面积; 整张切片面积为 0 时密度为 0.
pub fn measure_slice(mask: ArrayView2<u8>, spacing: VoxelSpacing) -> SliceMeasurement {
    let (rows, cols) = mask.dim();
    let tumor = mask.iter().filter(|p| label::is_tumor(**p)).count();
    let surface_mm2 = tumor as f64 * spacing.pixel_area();

    let perimeter_mm = if tumor == 0 {
        0.0
    } else {
        external_perimeter_px(mask) * spacing.dx
    };

    let total = (rows * cols) as f64 * spacing.pixel_area();
    let density = if total > 0.0 {
        surface_mm2 / total
    } else {
        0.0
    };

    SliceMeasurement {
        surface_mm2,
        perimeter_mm,
        density,
    }
}

/// 计算一张切片上坏死、水肿、增强三个子区域各自的面积.
pub fn class_areas(mask: ArrayView2<u8>, spacing: VoxelSpacing) -> ClassAreas {
    let mut counts = [0usize; 3];
    for p in mask.iter() {
        match *p {
            NECROTIC => counts[0] += 1,
            EDEMA => counts[1] += 1,
            ENHANCING => counts[2] += 1,
            _ => {}
        }
    }
    let area = |n: usize| n as f64 * spacing.pixel_area();
    ClassAreas {
        necrotic: area(counts[0]),
        edema: area(counts[1]),
        enhancing: area(counts[2]),
    }
}

/// 收集含有肿瘤像素的切片索引 (按升序). `masks` 形状为 `(n, rows, cols)`.
pub fn tumor_slices(masks: ArrayView3<u8>) -> Vec<usize> {
    masks
        .axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(i, s)| s.iter().any(|p| label::is_tumor(*p)).then_some(i))
        .collect()
}
