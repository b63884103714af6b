#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供脑肿瘤 MRI (FLAIR / T1CE) nifti 体数据的结构化信息、
//! 网络输入预处理、预训练网络推理封装, 以及分割结果的切片物理测量.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 网络本身 (分割 / 分类) 是不透明的预训练文件, 该 crate 只负责调用,
//!   不定义任何网络结构, 也不包含训练代码.
//! 2. 在非期望情况下, 库函数返回 `Err`, 而不是 panic. 只有明确写在文档中的
//!   前置条件被违反时才会 panic.
//!
//! # 功能清单
//!
//! ### nifti 体数据加载 ✅
//!
//! 以 `[z, x, y]` 组织体素, 每个水平切片与训练时的数组布局一致.
//! 支持从内存字节流 ("上传") 加载.
//!
//! 实现位于 `mri-berry/src/data`.
//!
//! ### 体数据重采样 ✅
//!
//! 固定起点、固定张数的切片窗口, 双线性缩放到正方形分辨率, 两个模态叠为通道,
//! 最后按全局最大值归一化.
//!
//! 实现位于 `mri-berry/src/preprocess`.
//!
//! ### 切片物理测量 ✅
//!
//! 面积 (mm²)、外轮廓周长 (mm)、肿瘤密度.
//!
//! 实现位于 `mri-berry/src/measure.rs`.
//!
//! ### 推理接缝 ✅
//!
//! [`inference::SegmentationModel`] 和 [`inference::ClassificationModel`]
//! 两个 trait, 以及基于 `rten` 的实现 (feature `rten`).
//!
//! ### 分割 / 分类流程 ✅
//!
//! 实现位于 `mri-berry/src/segment.rs` 和 `mri-berry/src/classify.rs`.
//!
//! ### 患者登记 ✅
//!
//! 表单校验, 每次提交写一个 JSON 文件.
//!
//! ### 报告与可视化 ✅
//!
//! 文本报告, 三联切片图, 分类标注图.
//!
//! ### 会话缓存 ✅
//!
//! 保存最近一次预测, 供后续重复测量使用.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// MRI nii 文件基础数据结构.
mod data;

pub use data::{
    ImgWriteVis, MriVolume, NiftiHeaderAttr, OpenVolumeError, OwnedSliceImage, SliceImage,
    VoxelSpacing,
};

pub use data::window::IntensityWindow;

pub mod consts;

pub mod preprocess;

pub mod measure;

pub mod inference;

pub mod segment;

pub mod classify;

pub mod patient;

pub mod report;

pub mod session;

pub mod prelude;
