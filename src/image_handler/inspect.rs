//! # Header 探测
//!
//! 只读取图片头信息（格式、尺寸、颜色类型、方向），不做完整解码。
//! 批处理用它在重新编码前判断图片是否已经优化过。

use image::metadata::Orientation;
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;

use super::{ImageError, ImageOptimizationSettings, ImageOptimizer};

/// 图片头信息。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInspection {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub orientation: Orientation,
}

impl ImageInspection {
    /// 是否已满足优化输出的全部约束：JPEG、3 通道 RGB、尺寸在上限内、无需方向校正。
    ///
    /// 不区分基线与渐进式 JPEG。
    pub fn is_optimized(&self, settings: &ImageOptimizationSettings) -> bool {
        self.format == ImageFormat::Jpeg
            && self.color_type == ColorType::Rgb8
            && self.orientation == Orientation::NoTransforms
            && settings.fits(self.width, self.height)
    }
}

impl ImageOptimizer {
    /// 读取图片头信息。
    pub fn inspect(&self, bytes: &[u8]) -> Result<ImageInspection, ImageError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(format!("无法读取图片数据：{}", e)))?;

        let format = reader
            .format()
            .ok_or_else(|| ImageError::Decode("无法识别图片格式".to_string()))?;

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ImageError::Decode(format!("无法读取图片头：{}", e)))?;

        let (width, height) = decoder.dimensions();
        let color_type = decoder.color_type();
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);

        Ok(ImageInspection {
            format,
            width,
            height,
            color_type,
            orientation,
        })
    }
}
