//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ImageOptimizationSettings`，保证运行时行为可观测、可测试。
//! 对外可识别的选项只有三个：最大宽度、最大高度、JPEG 质量；
//! 另附一个解码像素上限，用于在完整解码前拒绝超大图片。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置（1920 x 1920，质量 85）。
//! - `validate` 在进程启动读取配置后调用一次，单次优化过程中配置不再变化。

use serde::{Deserialize, Serialize};

use super::ImageError;

/// JPEG 单边尺寸上限（SOF 段使用 16 位存储宽高）。
pub const MAX_JPEG_DIMENSION: u32 = 65_535;

/// 默认解码像素上限，约 1.79 亿像素（`2 * 0x4000_0000 / 4 / 3`）。
///
/// 4800 万、5000 万像素的手机原图都在范围内。
pub const DEFAULT_MAX_DECODED_PIXELS: u64 = 178_956_970;

/// 图片优化配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptimizationSettings {
    /// 输出宽度上限（像素）。
    pub max_width: u32,
    /// 输出高度上限（像素）。
    pub max_height: u32,
    /// JPEG 质量（1~100）。
    pub jpeg_quality: u8,
    /// 解码前允许的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
}

impl Default for ImageOptimizationSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            jpeg_quality: 85,
            max_decoded_pixels: DEFAULT_MAX_DECODED_PIXELS,
        }
    }
}

impl ImageOptimizationSettings {
    /// 以三个可识别选项构建配置，其余字段取默认值。
    pub fn new(max_width: u32, max_height: u32, jpeg_quality: u8) -> Self {
        Self {
            max_width,
            max_height,
            jpeg_quality,
            ..Self::default()
        }
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), ImageError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ImageError::InvalidSettings(format!(
                "jpeg_quality 必须在 1~100 之间（当前：{}）",
                self.jpeg_quality
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ImageError::InvalidSettings(
                "max_width / max_height 必须大于 0".to_string(),
            ));
        }
        if self.max_width > MAX_JPEG_DIMENSION || self.max_height > MAX_JPEG_DIMENSION {
            return Err(ImageError::InvalidSettings(format!(
                "max_width / max_height 不能超过 {}",
                MAX_JPEG_DIMENSION
            )));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ImageError::InvalidSettings(
                "max_decoded_pixels 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 给定尺寸是否已在上限内。
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.max_width && height <= self.max_height
    }
}
