//! 二维图像分类流程.

use crate::consts::{ALERT_CONFIDENCE, CLASSIFY_SIZE};
use crate::inference::{argmax, ClassificationModel, InferenceError};
use crate::preprocess::{prepare_image, Normalization, PreprocessError};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 分类流程错误.
#[derive(Debug)]
pub enum ClassifyError {
    /// 预处理失败.
    Preprocess(PreprocessError),

    /// 推理失败.
    Inference(InferenceError),

    /// 网络输出的类别数不是 4. 参数为实际个数.
    OutputLength(usize),
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preprocess(e) => write!(f, "preprocessing failed: {e}"),
            Self::Inference(e) => write!(f, "{e}"),
            Self::OutputLength(n) => write!(
                f,
                "model returned {n} scores, expected {}",
                TumorClass::ALL.len()
            ),
        }
    }
}

impl std::error::Error for ClassifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Preprocess(e) => Some(e),
            Self::Inference(e) => Some(e),
            Self::OutputLength(_) => None,
        }
    }
}

impl From<PreprocessError> for ClassifyError {
    fn from(value: PreprocessError) -> Self {
        Self::Preprocess(value)
    }
}

impl From<InferenceError> for ClassifyError {
    fn from(value: InferenceError) -> Self {
        Self::Inference(value)
    }
}

/// 分类网络的输出类别, 顺序与网络输出一致.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TumorClass {
    /// 胶质瘤.
    Glioma,

    /// 无肿瘤.
    NoTumor,

    /// 脑膜瘤.
    Meningioma,

    /// 垂体瘤.
    Pituitary,
}

impl fmt::Display for TumorClass {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl TumorClass {
    /// 按网络输出顺序排列的全部类别.
    pub const ALL: [TumorClass; 4] = [
        Self::Glioma,
        Self::NoTumor,
        Self::Meningioma,
        Self::Pituitary,
    ];

    /// 网络输出中的位置.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 由网络输出位置得到类别.
    #[inline]
    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// 训练数据集中的标签名.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Glioma => "glioma_tumor",
            Self::NoTumor => "no_tumor",
            Self::Meningioma => "meningioma_tumor",
            Self::Pituitary => "pituitary_tumor",
        }
    }

    /// 法语显示名.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Glioma => "Gliome",
            Self::NoTumor => "Aucune tumeur",
            Self::Meningioma => "Méningiome",
            Self::Pituitary => "Tumeur pituitaire",
        }
    }

    /// 是否为肿瘤类别?
    #[inline]
    pub const fn is_tumor(self) -> bool {
        !matches!(self, Self::NoTumor)
    }
}

/// 结果的严重程度.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// 未发现肿瘤.
    Clear,

    /// 发现肿瘤, 但置信度低于 [`ALERT_CONFIDENCE`].
    Warning,

    /// 高置信度发现肿瘤.
    Alert,
}

impl Severity {
    /// 显示用的 RGB 颜色 (绿 / 橙 / 红).
    pub const fn color(self) -> [u8; 3] {
        match self {
            Self::Clear => [0, 128, 0],
            Self::Warning => [255, 165, 0],
            Self::Alert => [255, 0, 0],
        }
    }
}

/// 一次分类的结果.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// 各类别概率, 顺序同 [`TumorClass::ALL`].
    pub probabilities: [f32; 4],

    /// argmax 类别.
    pub class: TumorClass,
}

impl ClassificationResult {
    /// 由网络输出向量构建. 长度不为 4 时返回错误.
    pub fn from_scores(scores: &[f32]) -> Result<Self, ClassifyError> {
        let probabilities: [f32; 4] = scores
            .try_into()
            .map_err(|_| ClassifyError::OutputLength(scores.len()))?;
        let class = argmax(&probabilities)
            .and_then(TumorClass::from_index)
            .unwrap_or(TumorClass::Glioma);
        Ok(Self {
            probabilities,
            class,
        })
    }

    /// 预测类别的置信度, 百分比.
    #[inline]
    pub fn confidence_percent(&self) -> f32 {
        self.probabilities[self.class.index()] * 100.0
    }

    /// 各类别的百分比.
    pub fn percentages(&self) -> [(TumorClass, f32); 4] {
        TumorClass::ALL.map(|c| (c, self.probabilities[c.index()] * 100.0))
    }

    /// 严重程度.
    pub fn severity(&self) -> Severity {
        if !self.class.is_tumor() {
            Severity::Clear
        } else if self.confidence_percent() < ALERT_CONFIDENCE {
            Severity::Warning
        } else {
            Severity::Alert
        }
    }

    /// 给用户看的一句话结论.
    pub fn headline(&self) -> String {
        if self.class.is_tumor() {
            format!("{} détecté", self.class.display_name())
        } else {
            "Aucune tumeur détectée".to_string()
        }
    }
}

/// 分类流程.
#[derive(Debug, Clone)]
pub struct Classifier<M> {
    model: M,
    size: usize,
    norm: Normalization,
}

impl<M: ClassificationModel> Classifier<M> {
    /// 使用默认输入尺寸和 EfficientNet 归一化创建.
    pub fn new(model: M) -> Self {
        Self {
            model,
            size: CLASSIFY_SIZE,
            norm: Normalization::default(),
        }
    }

    /// 修改输入尺寸.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// 修改归一化方式.
    pub fn with_normalization(mut self, norm: Normalization) -> Self {
        self.norm = norm;
        self
    }

    /// 对一张图像分类.
    pub fn run(&self, image: &DynamicImage) -> Result<ClassificationResult, ClassifyError> {
        let x = prepare_image(image, self.size, self.norm)?;
        let scores = self.model.predict_scores(x.view())?;
        let row = scores.rows().into_iter().next();
        let result = match row {
            Some(r) => ClassificationResult::from_scores(&r.to_vec())?,
            None => return Err(ClassifyError::OutputLength(0)),
        };
        log::info!(
            "classified as {} ({:.1}%)",
            result.class.label(),
            result.confidence_percent()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use ndarray::{Array2, ArrayView4};

    struct Fixed(Vec<f32>);

    impl ClassificationModel for Fixed {
        fn predict_scores(&self, input: ArrayView4<f32>) -> Result<Array2<f32>, InferenceError> {
            assert_eq!(input.dim(), (1, CLASSIFY_SIZE, CLASSIFY_SIZE, 3));
            Ok(Array2::from_shape_vec((1, self.0.len()), self.0.clone()).unwrap())
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([5, 6, 7])))
    }

    #[test]
    fn test_run() {
        let r = Classifier::new(Fixed(vec![0.05, 0.05, 0.85, 0.05]))
            .run(&image())
            .unwrap();
        assert_eq!(r.class, TumorClass::Meningioma);
        assert!((r.confidence_percent() - 85.0).abs() < 1e-4);
        assert_eq!(r.severity(), Severity::Alert);
        assert_eq!(r.headline(), "Méningiome détecté");
    }

    #[test]
    fn test_wrong_length() {
        let r = Classifier::new(Fixed(vec![0.5, 0.5])).run(&image());
        assert!(matches!(r, Err(ClassifyError::OutputLength(2))));
    }

    #[test]
    fn test_severity() {
        let clear = ClassificationResult::from_scores(&[0.1, 0.6, 0.2, 0.1]).unwrap();
        assert_eq!(clear.severity(), Severity::Clear);
        assert_eq!(clear.headline(), "Aucune tumeur détectée");

        let warn = ClassificationResult::from_scores(&[0.7, 0.1, 0.1, 0.1]).unwrap();
        assert_eq!(warn.severity(), Severity::Warning);

        let edge = ClassificationResult::from_scores(&[0.0, 0.0, 0.0, 0.8]).unwrap();
        assert_eq!(edge.class, TumorClass::Pituitary);
        assert_eq!(edge.severity(), Severity::Alert);
    }

    #[test]
    fn test_percentages_order() {
        let r = ClassificationResult::from_scores(&[0.25, 0.5, 0.125, 0.125]).unwrap();
        let p = r.percentages();
        assert_eq!(p[0], (TumorClass::Glioma, 25.0));
        assert_eq!(p[1], (TumorClass::NoTumor, 50.0));
        assert_eq!(p[3].0, TumorClass::Pituitary);
    }

    #[test]
    fn test_class_names() {
        assert_eq!(TumorClass::from_index(2), Some(TumorClass::Meningioma));
        assert_eq!(TumorClass::from_index(4), None);
        assert_eq!(TumorClass::Glioma.label(), "glioma_tumor");
        assert_eq!(TumorClass::Pituitary.to_string(), "Tumeur pituitaire");
    }
}
