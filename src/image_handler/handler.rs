//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageOptimizer` 只负责流程编排，不接触文件系统或网络。
//! 处理链路固定为：
//! 1. 解码 + EXIF 方向校正
//! 2. 统一为不透明 RGB
//! 3. 约束尺寸
//! 4. JPEG 重编码
//!
//! ## 实现思路
//!
//! - 配置在构造时校验一次，之后只读，单次调用内不会漂移。
//! - 要么返回完整有效的 JPEG 缓冲，要么返回错误，不存在部分输出。
//! - 记录 `decode/normalize/resize/encode/total` 阶段耗时，便于性能诊断。

use std::time::Instant;

use super::pipeline::flatten_to_rgb;
use super::source::{OptimizedImage, RawImage};
use super::{ImageError, ImageOptimizationSettings};

/// 图片优化器。
#[derive(Debug, Clone)]
pub struct ImageOptimizer {
    pub(super) settings: ImageOptimizationSettings,
}

impl ImageOptimizer {
    /// 根据配置创建优化器，配置非法时返回 `ImageError::InvalidSettings`。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use timeline_media::image_handler::{ImageOptimizationSettings, ImageOptimizer};
    ///
    /// let optimizer = ImageOptimizer::new(ImageOptimizationSettings::default())?;
    /// # Ok::<(), timeline_media::image_handler::ImageError>(())
    /// ```
    pub fn new(settings: ImageOptimizationSettings) -> Result<Self, ImageError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &ImageOptimizationSettings {
        &self.settings
    }

    /// 处理主入口：将任意可解码图片转换为尺寸受限的 RGB JPEG。
    pub fn optimize(&self, bytes: &[u8]) -> Result<OptimizedImage, ImageError> {
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let decoded = self.decode_oriented(bytes)?;
        let decode_elapsed = decode_start.elapsed();

        let normalize_start = Instant::now();
        let rgb = flatten_to_rgb(decoded);
        let normalize_elapsed = normalize_start.elapsed();

        let resize_start = Instant::now();
        let (source_width, source_height) = rgb.dimensions();
        let bounded = self.bound_dimensions(rgb)?;
        let resize_elapsed = resize_start.elapsed();

        let encode_start = Instant::now();
        let encoded = self.encode_jpeg(&bounded)?;
        let encode_elapsed = encode_start.elapsed();

        let (width, height) = bounded.dimensions();
        log::debug!(
            "✅ 图片优化完成 - {}x{} -> {}x{} {}KB -> {}KB decode={}ms normalize={}ms resize={}ms encode={}ms total={}ms",
            source_width,
            source_height,
            width,
            height,
            bytes.len() / 1024,
            encoded.len() / 1024,
            decode_elapsed.as_millis(),
            normalize_elapsed.as_millis(),
            resize_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(OptimizedImage {
            bytes: encoded,
            width,
            height,
        })
    }

    /// 优化一次上传。声明的扩展名与 MIME 不参与解码，仅用于日志。
    pub fn optimize_raw(&self, raw: &RawImage) -> Result<OptimizedImage, ImageError> {
        log::info!(
            "📷 开始优化上传图片 - 文件: {} 类型: {} 大小: {}KB",
            raw.filename,
            raw.mime_type.as_deref().unwrap_or("unknown"),
            raw.bytes.len() / 1024
        );
        self.optimize(&raw.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 200])
        });

        let dyn_img = DynamicImage::ImageRgba8(img);
        let mut cursor = Cursor::new(Vec::new());
        dyn_img
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn rejects_invalid_settings() {
        let err = ImageOptimizer::new(ImageOptimizationSettings::new(100, 100, 0))
            .expect_err("quality 0 must be rejected");
        assert_eq!(err.reason(), "invalid settings");
    }

    #[test]
    fn garbage_bytes_are_undecodable() {
        let optimizer = ImageOptimizer::new(ImageOptimizationSettings::default())
            .expect("optimizer init failed");
        let err = optimizer
            .optimize(b"definitely not an image")
            .expect_err("garbage must fail");
        assert_eq!(err.reason(), "undecodable");
    }

    #[test]
    fn truncated_png_is_undecodable() {
        let optimizer = ImageOptimizer::new(ImageOptimizationSettings::default())
            .expect("optimizer init failed");
        let png = create_png_bytes(64, 64);
        let err = optimizer
            .optimize(&png[..png.len() / 2])
            .expect_err("truncated png must fail");
        assert_eq!(err.reason(), "undecodable");
    }

    #[test]
    fn rejects_images_over_pixel_limit_before_decoding() {
        let settings = ImageOptimizationSettings {
            max_decoded_pixels: 100,
            ..ImageOptimizationSettings::default()
        };
        let optimizer = ImageOptimizer::new(settings).expect("optimizer init failed");
        let err = optimizer
            .optimize(&create_png_bytes(20, 20))
            .expect_err("400 pixels exceeds limit");
        assert!(matches!(err, ImageError::ResourceLimit(_)));
    }

    #[test]
    fn output_is_rgb_jpeg_within_bounds() {
        let optimizer = ImageOptimizer::new(ImageOptimizationSettings::new(64, 64, 80))
            .expect("optimizer init failed");
        let optimized = optimizer
            .optimize(&create_png_bytes(200, 100))
            .expect("optimize should succeed");

        assert_eq!((optimized.width, optimized.height), (64, 32));
        assert_eq!(
            image::guess_format(&optimized.bytes).expect("guess format"),
            ImageFormat::Jpeg
        );

        let decoded = image::load_from_memory(&optimized.bytes).expect("decode output");
        assert_eq!(decoded.dimensions(), (64, 32));
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn perf_optimize_multiple_sizes() {
        let optimizer = ImageOptimizer::new(ImageOptimizationSettings::default())
            .expect("optimizer init failed");
        let cases = [(640, 480), (2048, 1536)];

        for (width, height) in cases {
            let png = create_png_bytes(width, height);
            let start = std::time::Instant::now();
            let optimized = optimizer.optimize(&png).expect("optimize should succeed");

            println!(
                "[perf] optimize {}x{} input={}KB output={}KB elapsed={}ms",
                width,
                height,
                png.len() / 1024,
                optimized.len() / 1024,
                start.elapsed().as_millis()
            );

            assert!(optimized.width <= 1920);
            assert!(optimized.height <= 1920);
        }
    }
}
