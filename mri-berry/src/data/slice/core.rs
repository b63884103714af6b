use crate::preprocess::resize_bilinear;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{Array2, ArrayView2, Ix2};
use std::ops::Index;

/// 不可变、借用的二维水平 MRI 切片.
pub struct SliceImage<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MriVolume`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for SliceImage<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> SliceImage<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'a, f32> {
        self.data.clone()
    }

    /// 获取可以迭代图像像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 获取给定位置 (行, 列) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 图像的分辨率 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像的像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        let (h, w) = self.shape();
        h * w
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 强度)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 克隆自己, 获得一个拥有所有权的切片对象.
    pub fn to_owned(&self) -> OwnedSliceImage {
        OwnedSliceImage {
            data: self.data.to_owned(),
        }
    }

    /// 双线性缩放到 `(h, w)`, 获得拥有所有权的新切片.
    pub fn resized(&self, shape: Idx2d) -> OwnedSliceImage {
        OwnedSliceImage {
            data: resize_bilinear(self.data.view(), shape),
        }
    }
}

/// 拥有所有权的二维水平 MRI 切片.
///
/// `OwnedSliceImage` 仅提供到 `SliceImage` 的轻量转换和底层数据移动,
/// 不提供任何其它方法.
#[derive(Clone, Debug)]
pub struct OwnedSliceImage {
    data: Array2<f32>,
}

impl From<Array2<f32>> for OwnedSliceImage {
    #[inline]
    fn from(data: Array2<f32>) -> Self {
        Self { data }
    }
}

impl OwnedSliceImage {
    /// 获得不可变切片引用.
    #[inline]
    pub fn as_view(&self) -> SliceImage<'_> {
        SliceImage::new(self.data.view())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<f32> {
        self.data
    }
}
