use std::fmt;
use std::io::Write;
use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use serde::{Deserialize, Serialize};

use crate::{Idx2d, Idx3d};

pub mod slice;
pub mod window;

pub use slice::{ImgWriteVis, OwnedSliceImage, SliceImage};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// gzip 文件头魔数.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 打开 MRI 体数据错误.
#[derive(Debug)]
pub enum OpenVolumeError {
    /// 底层 I/O 错误 (包括临时文件).
    Io(std::io::Error),

    /// nifti 解码错误.
    Nifti(nifti::NiftiError),

    /// 体数据不是三维的 (或第四维长度不为 1). 参数为实际维度.
    UnsupportedDim(Vec<usize>),
}

impl fmt::Display for OpenVolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error while reading volume: {e}"),
            Self::Nifti(e) => write!(f, "invalid NIfTI volume: {e}"),
            Self::UnsupportedDim(d) => write!(f, "expected a 3D volume, found shape {d:?}"),
        }
    }
}

impl std::error::Error for OpenVolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Nifti(e) => Some(e),
            Self::UnsupportedDim(_) => None,
        }
    }
}

impl From<std::io::Error> for OpenVolumeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<nifti::NiftiError> for OpenVolumeError {
    fn from(value: nifti::NiftiError) -> Self {
        Self::Nifti(value)
    }
}

/// 水平切片内的体素物理尺寸, 以毫米为单位.
///
/// `dx` 对应切片的行方向 (nifti 第一维), `dy` 对应列方向 (nifti 第二维).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelSpacing {
    /// 行方向, mm/像素.
    pub dx: f64,

    /// 列方向, mm/像素.
    pub dy: f64,
}

impl Default for VoxelSpacing {
    /// 未知分辨率时按 1mm 各向同性处理.
    #[inline]
    fn default() -> Self {
        Self { dx: 1.0, dy: 1.0 }
    }
}

impl VoxelSpacing {
    /// 构建分辨率. 两个值必须有限且非负, 否则返回 `None`.
    pub fn new(dx: f64, dy: f64) -> Option<Self> {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        (ok(dx) && ok(dy)).then_some(Self { dx, dy })
    }

    /// 单个像素的实际面积, 以平方毫米为单位.
    #[inline]
    pub fn pixel_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// 将 `from` 形状 (行, 列) 的切片缩放到 `to` 形状后, 每个像素对应的新分辨率.
    ///
    /// `to` 的任一维为 0 时返回原值.
    pub fn rescaled(&self, (from_h, from_w): Idx2d, (to_h, to_w): Idx2d) -> Self {
        if to_h == 0 || to_w == 0 {
            return *self;
        }
        Self {
            dx: self.dx * from_h as f64 / to_h as f64,
            dy: self.dy * from_w as f64 / to_w as f64,
        }
    }
}

/// 将 (x, y, z) 转换成 (z, x, y). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [x, y, z]. 体素个数数组.
    let [_, x, y, z, ..] = h.dim;
    (z as usize, x as usize, y as usize)
}

/// 3D MRI nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小 `(z, x, y)`.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小 (行, 列).
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, x, y) = self.shape();
        (x, y)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, x, y) = self.shape();
        z * x * y
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, x0, y0): &Idx3d) -> bool {
        let (z, x, y) = self.shape();
        *z0 < z && *x0 < x && *y0 < y
    }

    /// 获取切片内分辨率. 若 header 中的值无意义 (非有限), 则退化为 1mm 并记录警告.
    fn spacing(&self) -> VoxelSpacing {
        let [_, dx, dy, ..] = self.header().pixdim;
        VoxelSpacing::new((dx as f64).abs(), (dy as f64).abs()).unwrap_or_else(|| {
            log::warn!("invalid pixdim ({dx}, {dy}) in header, falling back to 1mm");
            VoxelSpacing::default()
        })
    }

    /// 获取相邻切片方向的体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.header().pixdim[3] as f64
    }

    /// 获取水平切片方向的像素实际面积值, 以平方毫米为单位.
    #[inline]
    fn slice_pixel(&self) -> f64 {
        self.spacing().pixel_area()
    }
}

/// nii 格式 3D MRI 扫描 (单个序列), 包括 header 和体素强度. 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MriVolume {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for MriVolume {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MriVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl MriVolume {
    /// 打开 nii (或 nii.gz) 文件格式的 3D MRI 扫描. `path` 为本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenVolumeError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        let mut data = obj.into_volume().into_ndarray::<f32>()?;

        // 部分数据集以 [x, y, z, 1] 存储.
        if data.ndim() == 4 && data.shape()[3] == 1 {
            data = data.index_axis_move(Axis(3), 0);
        }
        let shape = data.shape().to_vec();
        let data = data
            .into_dimensionality::<Ix3>()
            .map_err(|_| OpenVolumeError::UnsupportedDim(shape))?;

        Ok(Self::from_xyz(header, data))
    }

    /// 从内存中的 nii (或 nii.gz) 字节流加载.
    ///
    /// 字节流会先落地为临时文件 (后缀按 gzip 魔数决定), 读取完毕后立即删除.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpenVolumeError> {
        let suffix = if bytes.starts_with(&GZIP_MAGIC) {
            ".nii.gz"
        } else {
            ".nii"
        };
        let mut file = tempfile::Builder::new()
            .prefix("mri-upload-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        log::debug!("materialized {} bytes at {:?}", bytes.len(), file.path());
        Self::open(file.path())
    }

    /// 根据裸数据和切片内分辨率直接创建体数据.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 nifti 惯用标准以 \[x, y, z\] 格式存储.
    /// 2. `spacing` 为切片内分辨率, 切片间分辨率记为 1mm.
    ///
    /// 任一维度超过 `u16::MAX` 时 panic.
    pub fn from_array(data: Array3<f32>, spacing: VoxelSpacing) -> Self {
        let (x, y, z) = data.dim();
        let dim = |v: usize| u16::try_from(v).expect("维度超出 nifti 上限");
        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, dim(x), dim(y), dim(z), 1, 1, 1, 1];
        let [_, px, py, pz, ..] = &mut header.pixdim;
        (*px, *py, *pz) = (spacing.dx as f32, spacing.dy as f32, 1.0);
        Self::from_xyz(header, data)
    }

    /// [x, y, z] -> [z, x, y], 并保证行优先布局.
    fn from_xyz(mut header: BoxedHeader, data: Array3<f32>) -> Self {
        let (x, y, z) = data.dim();
        header.dim[1..4].copy_from_slice(&[x as u16, y as u16, z as u16]);
        let data = data.permuted_axes([2, 0, 1]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());
        Self { header, data }
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> SliceImage<'_> {
        SliceImage::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图. 越界时返回 `None`.
    #[inline]
    pub fn get_slice(&self, z_index: usize) -> Option<SliceImage<'_>> {
        (z_index < self.len_z()).then(|| self.slice_at(z_index))
    }

    /// 获取能按升序迭代 3D 扫描水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = SliceImage> {
        self.data.axis_iter(Axis(0)).map(SliceImage::new)
    }

    /// 获得数据的一份不可变 shallow copy, 形状为 `(z, x, y)`.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 全体素最大强度. 体数据为空或全为 NaN 时返回 `None`.
    pub fn max_intensity(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::{MriVolume, NiftiHeaderAttr, VoxelSpacing};
    use ndarray::Array3;
    use nifti::writer::WriterOptions;
    use nifti::NiftiHeader;
    use std::path::Path;

    fn ramp(x: usize, y: usize, z: usize) -> Array3<f32> {
        Array3::from_shape_fn((x, y, z), |(i, j, k)| (i * 100 + j * 10 + k) as f32)
    }

    #[test]
    fn test_layout_is_slice_major() {
        let v = MriVolume::from_array(ramp(4, 3, 2), VoxelSpacing::new(0.5, 2.0).unwrap());
        assert_eq!(v.shape(), (2, 4, 3));
        assert_eq!(v.slice_shape(), (4, 3));
        assert_eq!(v.len_z(), 2);

        // 切片 k 的 (i, j) 与原数组 [i, j, k] 一致.
        assert_eq!(v[(1, 3, 2)], 321.0);
        let s = v.slice_at(1);
        assert_eq!(s[(2, 1)], 211.0);
        assert!(v.get_slice(2).is_none());
    }

    #[test]
    fn test_spacing_from_header() {
        let v = MriVolume::from_array(ramp(2, 2, 2), VoxelSpacing::new(0.5, 2.0).unwrap());
        assert_eq!(v.spacing(), VoxelSpacing { dx: 0.5, dy: 2.0 });
        assert_eq!(v.slice_pixel(), 1.0);
        assert_eq!(v.z_mm(), 1.0);
    }

    #[test]
    fn test_spacing_rescaled() {
        let s = VoxelSpacing::new(1.0, 2.0).unwrap();
        let r = s.rescaled((240, 240), (120, 60));
        assert_eq!(r, VoxelSpacing { dx: 2.0, dy: 8.0 });
        assert_eq!(s.rescaled((240, 240), (0, 10)), s);
    }

    #[test]
    fn test_spacing_invalid() {
        assert!(VoxelSpacing::new(-1.0, 1.0).is_none());
        assert!(VoxelSpacing::new(1.0, f64::NAN).is_none());
        assert!(VoxelSpacing::new(0.0, 0.0).is_some());
    }

    #[test]
    fn test_max_intensity() {
        let mut a = ramp(2, 2, 2);
        a[(0, 0, 0)] = f32::NAN;
        let v = MriVolume::from_array(a, VoxelSpacing::default());
        assert_eq!(v.max_intensity(), Some(111.0));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(MriVolume::open("/definitely/not/here.nii").is_err());
    }

    /// 以 0.5 x 2.0 mm 的切片内分辨率写出 nifti 文件. 后缀为 `.gz` 时压缩.
    fn write_nifti(path: &Path, data: &Array3<f32>) {
        let mut header = NiftiHeader::default();
        header.pixdim[1] = 0.5;
        header.pixdim[2] = 2.0;
        header.pixdim[3] = 1.0;
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(data)
            .unwrap();
    }

    fn check_loaded(v: &MriVolume) {
        assert_eq!(v.shape(), (2, 4, 3));
        assert_eq!(v[(1, 3, 2)], 321.0);
        assert_eq!(v[(0, 2, 1)], 210.0);
        assert_eq!(v.spacing(), VoxelSpacing { dx: 0.5, dy: 2.0 });
    }

    #[test]
    fn test_nifti_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["vol.nii", "vol.nii.gz"] {
            let path = dir.path().join(name);
            write_nifti(&path, &ramp(4, 3, 2));

            check_loaded(&MriVolume::open(&path).unwrap());

            let bytes = std::fs::read(&path).unwrap();
            assert_eq!(bytes.starts_with(&super::GZIP_MAGIC), name.ends_with(".gz"));
            check_loaded(&MriVolume::from_bytes(&bytes).unwrap());
        }
    }

    #[test]
    fn test_from_bytes_garbage() {
        assert!(MriVolume::from_bytes(b"not a nifti file").is_err());
    }
}
