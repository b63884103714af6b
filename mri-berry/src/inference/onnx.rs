use super::{ClassificationModel, InferenceError, SegmentationModel};
use ndarray::{Array2, Array4, ArrayView4};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};
use std::fmt;
use std::path::{Path, PathBuf};

/// 基于 `rten` 的网络. 网络文件需先由 ONNX 转换为 `.rten` 格式.
///
/// 输入输出均为 channels-last 布局.
pub struct OnnxModel {
    model: Model,
    path: PathBuf,
}

impl fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxModel").field("path", &self.path).finish()
    }
}

impl OnnxModel {
    /// 从硬盘加载网络.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let model = Model::load_file(path).map_err(|e| InferenceError::Load {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            model,
            path: path.to_owned(),
        })
    }

    /// 网络文件路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 单输入单输出运行, 返回输出的形状与数据.
    fn run(&self, input: ArrayView4<f32>) -> Result<(Vec<usize>, Vec<f32>), InferenceError> {
        let (n, h, w, c) = input.dim();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = NdTensor::from_data([n, h, w, c], data);

        let output = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(|e| InferenceError::Run(e.to_string()))?;
        let output: Tensor<f32> = output
            .try_into()
            .map_err(|e| InferenceError::Run(format!("{e:?}")))?;
        Ok((output.shape().to_vec(), output.to_vec()))
    }
}

impl SegmentationModel for OnnxModel {
    fn predict_probs(&self, input: ArrayView4<f32>) -> Result<Array4<f32>, InferenceError> {
        let (shape, data) = self.run(input)?;
        match shape[..] {
            [n, h, w, c] => Array4::from_shape_vec((n, h, w, c), data)
                .map_err(|e| InferenceError::Run(e.to_string())),
            _ => Err(InferenceError::OutputShape {
                expected: "(n, h, w, classes)",
                found: shape,
            }),
        }
    }
}

impl ClassificationModel for OnnxModel {
    fn predict_scores(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, InferenceError> {
        let (shape, data) = self.run(input)?;
        match shape[..] {
            [n, c] => Array2::from_shape_vec((n, c), data)
                .map_err(|e| InferenceError::Run(e.to_string())),
            _ => Err(InferenceError::OutputShape {
                expected: "(1, classes)",
                found: shape,
            }),
        }
    }
}
