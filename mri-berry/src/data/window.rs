use num::ToPrimitive;

/// 强度窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// MRI 强度没有 CT HU 那样的绝对标定, 因此通常由切片自身的强度范围构建
/// (见 [`IntensityWindow::from_min_max`]).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    level: f32,
    width: f32,
}

impl IntensityWindow {
    /// 构建强度窗.
    ///
    /// `level` 和 `width` 必须有限且 `width` 为正, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<IntensityWindow> {
        if level.is_finite() && width.is_finite() && 0.0 < width {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 由最小值和最大值构建窗口, 等价于图像显示时的自动拉伸.
    ///
    /// 若 `min >= max` (例如全零切片), 则窗宽退化为 1.
    pub fn from_range(min: f32, max: f32) -> IntensityWindow {
        let width = max - min;
        if width > 0.0 && width.is_finite() {
            Self {
                level: (min + max) / 2.0,
                width,
            }
        } else {
            Self {
                level: min + 0.5,
                width: 1.0,
            }
        }
    }

    /// 由 `it` 中全部有限值的范围构建窗口. 没有有限值时返回 `None`.
    pub fn from_min_max<T, I>(it: I) -> Option<IntensityWindow>
    where
        T: ToPrimitive,
        I: IntoIterator<Item = T>,
    {
        let (min, max) = it
            .into_iter()
            .filter_map(|v| v.to_f32())
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some(Self::from_range(min, max))
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗设置下, 强度 `v` 对应的灰度图像素整数值 (0 <= value <= 255)
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if v <= lb {
            Some(u8::MIN)
        } else if v >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - lb) / self.width()) * 255.0) as u8)
        }
    }
}
