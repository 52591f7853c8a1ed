//! # 解码与变换流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGB → JPEG”的过程集中管理，每一步都是输入的纯函数。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸，按像素上限快速拒绝
//! 2. 完整解码，按 EXIF 方向旋转/翻转（尽力而为，失败不影响整体）
//! 3. 透明通道合成到白色背景，统一为 3 通道 RGB
//! 4. 超出上限时按比例缩小（Lanczos3），从不放大
//! 5. 渐进式 JPEG 编码，开启霍夫曼表优化；元数据全部丢弃

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageBuffer, ImageDecoder, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

use super::{ImageError, ImageOptimizer};

impl ImageOptimizer {
    /// 解码并按 EXIF 方向校正。
    ///
    /// 这是唯一的“硬失败”来源：无法识别或无法解码的字节直接返回 `ImageError::Decode`。
    pub(super) fn decode_oriented(&self, bytes: &[u8]) -> Result<DynamicImage, ImageError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(format!("无法读取图片数据：{}", e)))?;

        if reader.format().is_none() {
            return Err(ImageError::Decode("无法识别图片格式".to_string()));
        }

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoder.dimensions();
        self.validate_pixel_limits(width, height)?;

        let orientation = read_orientation(&mut decoder);

        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| ImageError::Decode(format!("图片解码失败：{}", e)))?;

        if orientation != Orientation::NoTransforms {
            log::debug!("🔄 按 EXIF 方向校正：{:?}", orientation);
            image.apply_orientation(orientation);
        }

        Ok(image)
    }

    /// 校验像素数量是否超过配置上限。
    pub(super) fn validate_pixel_limits(&self, width: u32, height: u32) -> Result<(), ImageError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > self.settings.max_decoded_pixels {
            return Err(ImageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.settings.max_decoded_pixels
            )));
        }

        Ok(())
    }

    /// 超出上限时按比例缩小；已在上限内则原样返回。
    pub(super) fn bound_dimensions(&self, image: RgbImage) -> Result<RgbImage, ImageError> {
        let (width, height) = image.dimensions();
        let Some((target_width, target_height)) = bounded_dimensions(
            width,
            height,
            self.settings.max_width,
            self.settings.max_height,
        ) else {
            return Ok(image);
        };

        log::debug!(
            "🧩 缩放：{}x{} -> {}x{}",
            width,
            height,
            target_width,
            target_height
        );

        match resize_with_fast_image_resize(&image, target_width, target_height) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!(
                    "⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}",
                    err
                );
                Ok(image::imageops::resize(
                    &image,
                    target_width,
                    target_height,
                    FilterType::Lanczos3,
                ))
            }
        }
    }

    /// 以配置的质量编码为渐进式 JPEG。
    pub(super) fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, ImageError> {
        let (width, height) = image.dimensions();
        let width = u16::try_from(width)
            .map_err(|_| ImageError::Encode(format!("宽度超出 JPEG 上限：{}", width)))?;
        let height = u16::try_from(height)
            .map_err(|_| ImageError::Encode(format!("高度超出 JPEG 上限：{}", height)))?;

        let mut buffer = Vec::with_capacity(image.as_raw().len() / 8);
        let mut encoder = jpeg_encoder::Encoder::new(&mut buffer, self.settings.jpeg_quality);
        encoder.set_progressive(true);
        encoder.set_optimized_huffman_tables(true);
        encoder
            .encode(image.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
            .map_err(|e| ImageError::Encode(format!("JPEG 编码失败：{}", e)))?;

        Ok(buffer)
    }
}

/// 读取方向标记；缺失或损坏时视为无需变换。
fn read_orientation(decoder: &mut impl ImageDecoder) -> Orientation {
    match decoder.orientation() {
        Ok(orientation) => orientation,
        Err(err) => {
            log::debug!("EXIF 方向读取失败，忽略：{}", err);
            Orientation::NoTransforms
        }
    }
}

/// 统一为不透明 3 通道 RGB。
///
/// 带透明通道（含调色板透明）的图像合成到白色背景，其余直接转换。
pub(crate) fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([
            blend_on_white(r, a),
            blend_on_white(g, a),
            blend_on_white(b, a),
        ]);
    }

    rgb
}

fn blend_on_white(channel: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    let value = channel as u32 * alpha + 255 * (255 - alpha);
    ((value + 127) / 255) as u8
}

/// 计算等比缩放后的尺寸；无需缩放时返回 `None`。
///
/// 受限的一边精确等于上限，另一边四舍五入，且至少为 1。
pub(crate) fn bounded_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }

    let (w, h) = (width as u64, height as u64);
    let (max_w, max_h) = (max_width as u64, max_height as u64);

    // w / h >= max_w / max_h 时宽度是受限边
    let (target_w, target_h) = if w * max_h >= h * max_w {
        (max_w, ((h * max_w + w / 2) / w).clamp(1, max_h))
    } else {
        (((w * max_h + h / 2) / h).clamp(1, max_w), max_h)
    };

    Some((target_w as u32, target_h as u32))
}

fn resize_with_fast_image_resize(
    image: &RgbImage,
    target_width: u32,
    target_height: u32,
) -> Result<RgbImage, ImageError> {
    let (src_width, src_height) = image.dimensions();

    let src_image = fr::images::ImageRef::new(
        src_width,
        src_height,
        image.as_raw(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| ImageError::Resize(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Resize(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ImageError::Resize("fast_image_resize 输出缓冲长度异常".to_string()))
}
