use crate::Idx2d;
use ndarray::{Array2, ArrayView2};
use num::ToPrimitive;

/// 单轴插值系数: (左邻索引, 右邻索引, 右邻权重).
type Coeff = (usize, usize, f32);

/// 计算长度 `src` 缩放到 `dst` 时每个输出位置的插值系数.
///
/// 采样点位于像素中心: `f = (d + 0.5) * src / dst - 0.5`, 越界时钳制到边缘像素.
fn axis_coeffs(src: usize, dst: usize) -> Vec<Coeff> {
    debug_assert!(src > 0);
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let f = (d as f64 + 0.5) * scale - 0.5;
            let s = f.floor();
            let (s, frac) = if s < 0.0 { (0, 0.0) } else { (s as usize, f - s) };
            if s + 1 >= src {
                (src - 1, src - 1, 0.0)
            } else {
                (s, s + 1, frac as f32)
            }
        })
        .collect()
}

/// 双线性缩放二维数组到 `(h, w)`.
///
/// 行为与常见视觉库的默认线性缩放一致 (像素中心对齐, 边缘钳制,
/// 缩小时不做抗锯齿). 无法转为 `f32` 的元素按 0 处理.
/// 源数组为空时返回全零数组.
pub fn resize_bilinear<T>(src: ArrayView2<T>, (dh, dw): Idx2d) -> Array2<f32>
where
    T: Copy + ToPrimitive,
{
    let (sh, sw) = src.dim();
    if sh == 0 || sw == 0 {
        return Array2::zeros((dh, dw));
    }
    let rows = axis_coeffs(sh, dh);
    let cols = axis_coeffs(sw, dw);
    let at = |h: usize, w: usize| src[(h, w)].to_f32().unwrap_or(0.0);

    Array2::from_shape_fn((dh, dw), |(y, x)| {
        let (y0, y1, fy) = rows[y];
        let (x0, x1, fx) = cols[x];
        let top = at(y0, x0) * (1.0 - fx) + at(y0, x1) * fx;
        let bottom = at(y1, x0) * (1.0 - fx) + at(y1, x1) * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

#[cfg(test)]
mod tests {
    use super::resize_bilinear;
    use ndarray::{array, Array2};

    fn f32_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_identity() {
        let a = array![[1u8, 2, 3], [4, 5, 6]];
        let r = resize_bilinear(a.view(), (2, 3));
        assert_eq!(r, a.mapv(f32::from));
    }

    #[test]
    fn test_upscale_half_pixel() {
        let a = array![[0.0f32, 10.0], [20.0, 30.0]];
        let r = resize_bilinear(a.view(), (4, 4));
        let row0 = [0.0, 2.5, 7.5, 10.0];
        let row1 = [5.0, 7.5, 12.5, 15.0];
        for x in 0..4 {
            assert!(f32_eq(r[(0, x)], row0[x]), "row 0, col {x}: {}", r[(0, x)]);
            assert!(f32_eq(r[(1, x)], row1[x]), "row 1, col {x}: {}", r[(1, x)]);
        }
        assert!(f32_eq(r[(3, 3)], 30.0));
    }

    #[test]
    fn test_downscale_average() {
        // 4 -> 2: 采样点恰好落在两像素中间.
        let a = array![[0.0f32, 2.0, 4.0, 6.0]];
        let r = resize_bilinear(a.view(), (1, 2));
        assert!(f32_eq(r[(0, 0)], 1.0));
        assert!(f32_eq(r[(0, 1)], 5.0));
    }

    #[test]
    fn test_constant_stays_constant() {
        let a = Array2::from_elem((7, 5), 3.5f32);
        let r = resize_bilinear(a.view(), (13, 2));
        assert!(r.iter().all(|v| f32_eq(*v, 3.5)));
    }

    #[test]
    fn test_empty_source() {
        let a = Array2::<f32>::zeros((0, 4));
        let r = resize_bilinear(a.view(), (3, 3));
        assert_eq!(r.dim(), (3, 3));
        assert!(r.iter().all(|v| *v == 0.0));
    }
}
