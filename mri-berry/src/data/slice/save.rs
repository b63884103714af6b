//! 图像的持久化存储.

use super::{OwnedSliceImage, SliceImage};
use crate::IntensityWindow;
use image::{GrayImage, ImageResult};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// MRI 切片以浮点强度存储, 保存时会用切片自身的强度范围拉伸到 8-bit 灰度,
/// 与常见的 "gray" 色图显示方式一致.
pub trait ImgWriteVis {
    /// 按照可视化规则转换为 8-bit 灰度图.
    fn to_gray(&self) -> GrayImage;

    /// 按照可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_gray().save(path)
    }
}

impl ImgWriteVis for SliceImage<'_> {
    fn to_gray(&self) -> GrayImage {
        let (height, width) = self.shape();
        let mut buf = GrayImage::new(width as u32, height as u32);
        let Some(window) = IntensityWindow::from_min_max(self.iter().copied()) else {
            // 没有有限值, 保持全黑.
            return buf;
        };
        for ((h, w), &v) in self.indexed_iter() {
            let gray = window.eval(v).unwrap_or(u8::MIN);
            buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
        }
        buf
    }
}

impl ImgWriteVis for OwnedSliceImage {
    #[inline]
    fn to_gray(&self) -> GrayImage {
        self.as_view().to_gray()
    }
}

#[cfg(test)]
mod tests {
    use super::ImgWriteVis;
    use crate::OwnedSliceImage;
    use ndarray::array;

    #[test]
    fn test_to_gray_stretch() {
        let s = OwnedSliceImage::from(array![[0.0f32, 50.0], [100.0, f32::NAN]]);
        let g = s.to_gray();
        assert_eq!(g.dimensions(), (2, 2));
        assert_eq!(g.get_pixel(0, 0)[0], 0);
        assert_eq!(g.get_pixel(1, 0)[0], 127);
        assert_eq!(g.get_pixel(0, 1)[0], 255);
        assert_eq!(g.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slice.png");
        OwnedSliceImage::from(array![[1.0f32, 2.0], [3.0, 4.0]])
            .save(&path)
            .unwrap();
        assert!(path.is_file());
    }
}
