use super::{resize_bilinear, PreprocessError, SliceWindow};
use crate::consts::SEG_CHANNELS;
use crate::{MriVolume, NiftiHeaderAttr};
use ndarray::{Array4, ArrayViewMut3, Axis};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 检查体数据 z 方向是否足以容纳切片窗口.
fn check_depth(
    modality: &'static str,
    volume: &MriVolume,
    window: &SliceWindow,
) -> Result<(), PreprocessError> {
    let depth = volume.len_z();
    if depth < window.end() {
        return Err(PreprocessError::WindowOutOfRange {
            modality,
            needed: window.end(),
            depth,
        });
    }
    Ok(())
}

/// 填充窗口内第 `i` 张切片的两个通道.
fn fill_slot(
    mut slot: ArrayViewMut3<f32>,
    i: usize,
    flair: &MriVolume,
    t1ce: &MriVolume,
    window: &SliceWindow,
) {
    let z = window.start + i;
    let shape = window.slice_shape();
    for (c, volume) in [flair, t1ce].into_iter().enumerate() {
        let resized = resize_bilinear(volume.slice_at(z).data(), shape);
        slot.index_axis_mut(Axis(2), c).assign(&resized);
    }
}

/// 将 FLAIR 和 T1CE 体数据重采样为分割网络的输入张量.
///
/// 对窗口内第 `i` 张切片, 分别将两个序列在原始位置 `window.start + i`
/// 的切片缩放到 `size * size`, 作为第 0 / 1 通道. 结果形状为
/// `(count, size, size, 2)`, 最后整体除以全局最大值.
///
/// # 错误
///
/// 1. 窗口参数非法时返回 [`PreprocessError::InvalidWindow`].
/// 2. 任一体数据切片数少于 `window.end()` 时返回
///   [`PreprocessError::WindowOutOfRange`].
///
/// # 注意
///
/// 全局最大值不为正 (例如全零输入) 时不做归一化, 原样返回.
pub fn resample_stack(
    flair: &MriVolume,
    t1ce: &MriVolume,
    window: &SliceWindow,
) -> Result<Array4<f32>, PreprocessError> {
    window.validate()?;
    check_depth("FLAIR", flair, window)?;
    check_depth("T1CE", t1ce, window)?;

    let SliceWindow { count, size, .. } = *window;
    let mut x = Array4::<f32>::zeros((count, size, size, SEG_CHANNELS));

    log::debug!(
        "resampling slices {}..{} of {:?} / {:?} to {size}x{size}",
        window.start,
        window.end(),
        flair.slice_shape(),
        t1ce.slice_shape(),
    );

    #[cfg(feature = "rayon")]
    x.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, slot)| fill_slot(slot, i, flair, t1ce, window));

    #[cfg(not(feature = "rayon"))]
    x.axis_iter_mut(Axis(0))
        .enumerate()
        .for_each(|(i, slot)| fill_slot(slot, i, flair, t1ce, window));

    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 && max.is_finite() {
        x.mapv_inplace(|v| v / max);
    } else {
        log::warn!("input stack maximum is {max}, skipping normalization");
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::resample_stack;
    use crate::preprocess::{PreprocessError, SliceWindow};
    use crate::{MriVolume, VoxelSpacing};
    use ndarray::{Array3, Axis};

    /// `[x, y, z]` 体数据, 每张切片为常数 `scale * (z + 1)`.
    fn layered(x: usize, y: usize, z: usize, scale: f32) -> MriVolume {
        let data = Array3::from_shape_fn((x, y, z), |(_, _, k)| scale * (k as f32 + 1.0));
        MriVolume::from_array(data, VoxelSpacing::default())
    }

    #[test]
    fn test_stack_shape_and_channels() {
        let flair = layered(6, 6, 10, 1.0);
        let t1ce = layered(8, 4, 10, 2.0);
        let w = SliceWindow::new(2, 5, 4).unwrap();
        let x = resample_stack(&flair, &t1ce, &w).unwrap();
        assert_eq!(x.dim(), (5, 4, 4, 2));

        // 全局最大值来自 T1CE 第 6 张切片: 2 * 7 = 14.
        let max = x.iter().copied().fold(f32::MIN, f32::max);
        assert!((max - 1.0).abs() < 1e-6);

        // 窗口第 0 张 = 原始第 2 张.
        assert!((x[(0, 1, 1, 0)] - 3.0 / 14.0).abs() < 1e-6);
        assert!((x[(0, 1, 1, 1)] - 6.0 / 14.0).abs() < 1e-6);
        assert!((x[(4, 3, 3, 1)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stack_window_out_of_range() {
        let flair = layered(4, 4, 10, 1.0);
        let t1ce = layered(4, 4, 6, 1.0);
        let w = SliceWindow::new(2, 5, 4).unwrap();
        match resample_stack(&flair, &t1ce, &w) {
            Err(PreprocessError::WindowOutOfRange {
                modality,
                needed,
                depth,
            }) => {
                assert_eq!(modality, "T1CE");
                assert_eq!(needed, 7);
                assert_eq!(depth, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stack_window_end_overflow() {
        let v = layered(4, 4, 6, 1.0);
        let w = SliceWindow {
            start: usize::MAX,
            count: 1,
            size: 2,
        };
        assert!(matches!(
            resample_stack(&v, &v, &w),
            Err(PreprocessError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_stack_zero_input_not_normalized() {
        let zero = MriVolume::from_array(Array3::zeros((4, 4, 3)), VoxelSpacing::default());
        let w = SliceWindow::new(0, 3, 2).unwrap();
        let x = resample_stack(&zero, &zero, &w).unwrap();
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_stack_slices_in_order() {
        let v = layered(3, 3, 8, 1.0);
        let w = SliceWindow::new(1, 6, 3).unwrap();
        let x = resample_stack(&v, &v, &w).unwrap();
        let firsts: Vec<f32> = x
            .axis_iter(Axis(0))
            .map(|s| s[(0, 0, 0)] * 7.0)
            .collect();
        for (i, v) in firsts.iter().enumerate() {
            assert!((v - (i as f32 + 2.0)).abs() < 1e-5);
        }
    }
}
