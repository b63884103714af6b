//! 文本报告与可视化图像.
//!
//! 文本报告使用法语, 与界面保持一致.

use crate::classify::ClassificationResult;
use crate::consts::label::{self, ENHANCING};
use crate::segment::{SegmentError, SegmentationResult};
use crate::{ImgWriteVis, SliceImage};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use itertools::Itertools;
use ndarray::ArrayView2;

const DISCLAIMER: &str = "Note: Ce rapport est généré automatiquement par un système d'IA.\n\
Consultez toujours un professionnel de santé pour un diagnostic définitif.\n";

/// 分类结果的文本报告.
pub fn classification_report(result: &ClassificationResult) -> String {
    let details = result
        .percentages()
        .iter()
        .map(|(class, p)| format!("- {}: {p:.1}%\n", class.display_name()))
        .join("");
    format!(
        "RAPPORT D'ANALYSE - CLASSIFICATION DE TUMEUR CÉRÉBRALE\n\n\
         Résultat: {}\n\
         Confiance: {:.1}%\n\n\
         Détails des probabilités:\n\
         {details}\n\
         {DISCLAIMER}",
        result.class.display_name(),
        result.confidence_percent(),
    )
}

/// 分割结果的文本报告, 包含窗口内第 `index` 张切片的测量值.
pub fn segmentation_report(
    result: &SegmentationResult,
    index: usize,
) -> Result<String, SegmentError> {
    let m = result.measure(index)?;
    let areas = result.class_areas(index)?;
    let w = &result.window;
    let tumor = result.mask.tumor_slices();

    let regions = (1..=ENHANCING)
        .zip([areas.necrotic, areas.edema, areas.enhancing])
        .map(|(l, a)| format!("- {}: {a:.2} mm²\n", label::name(l)))
        .join("");
    let tumor_line = if tumor.is_empty() {
        "Coupes avec tumeur: aucune".to_owned()
    } else {
        format!(
            "Coupes avec tumeur ({}): {}",
            tumor.len(),
            tumor.iter().join(", ")
        )
    };

    Ok(format!(
        "RAPPORT D'ANALYSE - SEGMENTATION 3D\n\n\
         Coupes analysées: {}..{} ({} coupes, {}x{} pixels)\n\
         Résolution: {:.3} x {:.3} mm/pixel\n\n\
         Coupe {index} (coupe d'origine {}):\n\
         - Surface: {:.2} mm²\n\
         - Périmètre: {:.2} mm\n\
         - Densité: {:.4}\n\n\
         Surface par région:\n\
         {regions}\n\
         {tumor_line}\n\n\
         {DISCLAIMER}",
        w.start,
        w.end(),
        w.count,
        w.size,
        w.size,
        result.spacing.dx,
        result.spacing.dy,
        w.start + index,
        m.surface_mm2,
        m.perimeter_mm,
        m.density,
    ))
}

/// matplotlib "jet" 色图的控制点.
const JET_R: [(f32, f32); 5] = [(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_G: [(f32, f32); 6] = [
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_B: [(f32, f32); 5] = [(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

/// 分段线性插值. `t` 会先被截断到 `[0, 1]`.
fn interp(points: &[(f32, f32)], t: f32) -> f32 {
    let t = num::clamp(t, 0.0, 1.0);
    points
        .iter()
        .tuple_windows()
        .find(|(_, (x1, _))| t <= *x1)
        .map(|((x0, y0), (x1, y1))| {
            if x1 > x0 {
                y0 + (y1 - y0) * (t - x0) / (x1 - x0)
            } else {
                *y1
            }
        })
        .unwrap_or(0.0)
}

/// "jet" 色图. `t` 取值 `[0, 1]`, 越界值被截断.
pub fn jet(t: f32) -> Rgb<u8> {
    let c = |points: &[(f32, f32)]| (interp(points, t) * 255.0).round() as u8;
    Rgb([c(&JET_R), c(&JET_G), c(&JET_B)])
}

/// 分割标签的显示颜色. 标签按固定范围 `0..=3` 映射到 "jet" 色图.
#[inline]
pub fn label_color(l: u8) -> Rgb<u8> {
    jet(f32::from(l) / f32::from(ENHANCING))
}

/// 将标签切片渲染为彩色图像.
pub fn colorize_mask(mask: ArrayView2<u8>) -> RgbImage {
    let (rows, cols) = mask.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        label_color(mask[(y as usize, x as usize)])
    })
}

/// 面板之间的间隔 (像素).
const PANEL_GAP: u32 = 4;

fn gray_to_rgb(g: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(g.clone()).to_rgb8()
}

/// 渲染 FLAIR | T1CE | 分割 三联图.
///
/// 两个原始切片会先缩放到标签切片的形状, 再按各自的强度范围拉伸为灰度图.
pub fn render_slice_panel(
    flair: SliceImage<'_>,
    t1ce: SliceImage<'_>,
    mask: ArrayView2<u8>,
) -> RgbImage {
    let (rows, cols) = mask.dim();
    let panels = [
        gray_to_rgb(&flair.resized((rows, cols)).to_gray()),
        gray_to_rgb(&t1ce.resized((rows, cols)).to_gray()),
        colorize_mask(mask),
    ];

    let (w, h) = (cols as u32, rows as u32);
    let mut canvas = RgbImage::new(w * 3 + PANEL_GAP * 2, h);
    for (i, p) in panels.iter().enumerate() {
        let x = i as u32 * (w + PANEL_GAP);
        imageops::replace(&mut canvas, p, i64::from(x), 0);
    }
    canvas
}

/// 标注文字的颜色.
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// 标注文字左上角的位置.
const TEXT_ORIGIN: (i32, i32) = (10, 10);

/// 点阵字形的边长.
const GLYPH: u32 = 8;

/// 标注图上的诊断文字.
pub fn diagnosis_text(result: &ClassificationResult) -> String {
    format!(
        "Diagnostic: {} ({:.1}%)",
        result.class.display_name(),
        result.confidence_percent()
    )
}

/// 以 8x8 点阵字体在 `(x, y)` 处绘制一行文字, 每个点放大为 `scale * scale`.
///
/// 字体不含的字符留空. 超出图像的部分被裁掉.
fn draw_text(img: &mut RgbImage, text: &str, (x, y): (i32, i32), scale: u32, color: Rgb<u8>) {
    let step = (GLYPH * scale) as i32;
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| LATIN_FONTS.get(ch)) else {
            continue;
        };
        let x0 = x + i as i32 * step;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = x0 + (col * scale) as i32;
                let py = y + (row as u32 * scale) as i32;
                draw_filled_rect_mut(img, Rect::at(px, py).of_size(scale, scale), color);
            }
        }
    }
}

/// 在原图上标注分类结果: 左上角写诊断与置信度, 外加按严重程度着色的边框,
/// 底部为置信度条.
pub fn annotate_classification(img: &DynamicImage, result: &ClassificationResult) -> RgbImage {
    let mut out = img.to_rgb8();
    let (w, h) = out.dimensions();
    if w == 0 || h == 0 {
        return out;
    }
    let color = Rgb(result.severity().color());

    let thickness = (w.min(h) / 50).max(2);
    for t in 0..thickness.min(w / 2).min(h / 2) {
        let rect = Rect::at(t as i32, t as i32).of_size(w - 2 * t, h - 2 * t);
        draw_hollow_rect_mut(&mut out, rect, color);
    }

    let text = diagnosis_text(result);
    let len = text.chars().count().max(1) as u32;
    let room = w.saturating_sub(2 * TEXT_ORIGIN.0 as u32);
    let scale = (room / (len * GLYPH)).clamp(1, 4);
    draw_text(&mut out, &text, TEXT_ORIGIN, scale, TEXT_COLOR);

    let bar_h = (h / 20).max(3).min(h);
    let bar_w = (w as f32 * result.confidence_percent() / 100.0).round() as u32;
    let bar_w = bar_w.min(w);
    let y = (h - bar_h) as i32;
    draw_filled_rect_mut(&mut out, Rect::at(0, y).of_size(w, bar_h), Rgb([32, 32, 32]));
    if bar_w > 0 {
        draw_filled_rect_mut(&mut out, Rect::at(0, y).of_size(bar_w, bar_h), color);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Severity, TumorClass};
    use crate::preprocess::SliceWindow;
    use crate::segment::MaskStack;
    use crate::VoxelSpacing;
    use image::RgbImage;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_classification_report() {
        let r = ClassificationResult::from_scores(&[0.9, 0.05, 0.03, 0.02]).unwrap();
        let text = classification_report(&r);
        assert!(text.contains("Résultat: Gliome"));
        assert!(text.contains("Confiance: 90.0%"));
        assert!(text.contains("- Aucune tumeur: 5.0%"));
        assert!(text.contains("- Tumeur pituitaire: 2.0%"));
        assert!(text.contains("professionnel de santé"));
    }

    fn seg_result() -> SegmentationResult {
        let mut m = Array3::<u8>::zeros((3, 8, 8));
        m[(1, 2, 2)] = 1;
        m[(1, 2, 3)] = 2;
        m[(1, 3, 3)] = 3;
        m[(2, 0, 0)] = 2;
        SegmentationResult {
            mask: MaskStack::from(m),
            spacing: VoxelSpacing::new(1.0, 1.0).unwrap(),
            window: SliceWindow::new(10, 3, 8).unwrap(),
        }
    }

    #[test]
    fn test_segmentation_report() {
        let text = segmentation_report(&seg_result(), 1).unwrap();
        assert!(text.contains("Coupes analysées: 10..13 (3 coupes, 8x8 pixels)"));
        assert!(text.contains("Coupe 1 (coupe d'origine 11):"));
        assert!(text.contains("- Surface: 3.00 mm²"));
        assert!(text.contains("- Nécrose: 1.00 mm²"));
        assert!(text.contains("Coupes avec tumeur (2): 1, 2"));
        assert!(segmentation_report(&seg_result(), 3).is_err());
    }

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(label_color(0), Rgb([0, 0, 128]));
        assert_eq!(label_color(3), Rgb([128, 0, 0]));
        assert_eq!(jet(-1.0), jet(0.0));
        assert_eq!(jet(0.5), Rgb([123, 255, 123]));
    }

    #[test]
    fn test_render_panel() {
        let flair = Array2::from_shape_fn((16, 16), |(i, j)| (i + j) as f32);
        let t1ce = Array2::<f32>::ones((16, 16));
        let mut mask = Array2::<u8>::zeros((8, 8));
        mask[(4, 4)] = 3;
        let img = render_slice_panel(
            SliceImage::new(flair.view()),
            SliceImage::new(t1ce.view()),
            mask.view(),
        );
        assert_eq!(img.dimensions(), (8 * 3 + 2 * PANEL_GAP, 8));
        let x0 = 2 * (8 + PANEL_GAP);
        assert_eq!(*img.get_pixel(x0 + 4, 4), label_color(3));
        assert_eq!(*img.get_pixel(x0, 0), label_color(0));
    }

    #[test]
    fn test_annotate() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([255, 255, 255])));
        let r = ClassificationResult {
            probabilities: [0.0, 0.0, 0.5, 0.5],
            class: TumorClass::Meningioma,
        };
        let out = annotate_classification(&img, &r);
        let orange = Rgb(Severity::Warning.color());
        assert_eq!(*out.get_pixel(0, 50), orange);
        assert_eq!(*out.get_pixel(50, 50), Rgb([255, 255, 255]));
        // 置信度 50%: 条的左半部分着色.
        assert_eq!(*out.get_pixel(10, 98), orange);
        assert_eq!(*out.get_pixel(90, 97), Rgb([32, 32, 32]));

        // 诊断文字写在左上角, 文字行下方保持原样.
        let text_row = |y: u32| (10..100).filter(|x| *out.get_pixel(*x, y) == TEXT_COLOR).count();
        assert!((10..18).map(text_row).sum::<usize>() > 0);
        assert_eq!(text_row(40), 0);
    }

    #[test]
    fn test_diagnosis_text() {
        let r = ClassificationResult::from_scores(&[0.05, 0.05, 0.8, 0.1]).unwrap();
        assert_eq!(diagnosis_text(&r), "Diagnostic: Méningiome (80.0%)");
    }

    #[test]
    fn test_draw_text_scaled() {
        let mut img = RgbImage::new(40, 20);
        draw_text(&mut img, "I", (0, 0), 2, TEXT_COLOR);
        let lit = img.pixels().filter(|p| **p == TEXT_COLOR).count();
        let dots: u32 = BASIC_FONTS
            .get('I')
            .unwrap()
            .iter()
            .map(|b| b.count_ones())
            .sum();
        assert_eq!(lit, dots as usize * 4);

        // 字体之外的字符留空.
        let mut blank = RgbImage::new(16, 8);
        draw_text(&mut blank, "\u{4e2d}", (0, 0), 1, TEXT_COLOR);
        assert!(blank.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
