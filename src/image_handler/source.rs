//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线输出”解耦：
//! - `RawImage` 表示上传时提交的原始字节与声明信息，仅存活于一次优化调用
//! - `OptimizedImage` 表示可直接持久化的 JPEG 字节，产出后不可变

use std::path::Path;

use super::ImageError;

/// 优化输出的固定扩展名。
pub const OPTIMIZED_EXTENSION: &str = "jpg";
/// 优化输出的固定 MIME 类型。
pub const OPTIMIZED_MIME_TYPE: &str = "image/jpeg";
/// 上传允许的扩展名。
pub const ALLOWED_UPLOAD_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// 照护者提交的原始图片。
#[derive(Debug, Clone)]
pub struct RawImage {
    /// 原始图片字节。
    pub bytes: Vec<u8>,
    /// 声明的文件名（含扩展名）。
    pub filename: String,
    /// 声明的 MIME 类型（仅用于日志，解码以内容为准）。
    pub mime_type: Option<String>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// 声明文件名的小写扩展名。
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// 上传入口校验：体积、扩展名、文件签名。
    ///
    /// 尽早失败，避免对明显无效的输入进行解码。
    pub fn validate_upload(&self, max_upload_bytes: u64) -> Result<(), ImageError> {
        if self.bytes.is_empty() {
            return Err(ImageError::InvalidFormat("图片内容为空".to_string()));
        }

        if self.bytes.len() as u64 > max_upload_bytes {
            return Err(ImageError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                self.bytes.len() as f64 / 1024.0 / 1024.0,
                max_upload_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        let extension = self.extension().unwrap_or_default();
        if !ALLOWED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ImageError::InvalidFormat(format!(
                "不支持的文件类型：{}（可选：{}）",
                self.filename,
                ALLOWED_UPLOAD_EXTENSIONS.join(", ")
            )));
        }

        let kind = infer::get(&self.bytes)
            .ok_or_else(|| ImageError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ImageError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}

/// 优化结果：已完成方向校正、RGB 转换、尺寸约束与 JPEG 重编码。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    /// JPEG 字节。
    pub bytes: Vec<u8>,
    /// 输出宽度（像素）。
    pub width: u32,
    /// 输出高度（像素）。
    pub height: u32,
}

impl OptimizedImage {
    pub fn extension(&self) -> &'static str {
        OPTIMIZED_EXTENSION
    }

    pub fn mime_type(&self) -> &'static str {
        OPTIMIZED_MIME_TYPE
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn extension_is_lowercased() {
        let raw = RawImage::new(vec![1], "IMG_0001.JPEG");
        assert_eq!(raw.extension().as_deref(), Some("jpeg"));
        assert_eq!(RawImage::new(vec![1], "noext").extension(), None);
    }

    #[test]
    fn validate_upload_rejects_empty_and_oversized() {
        let empty = RawImage::new(Vec::new(), "a.png");
        assert!(matches!(empty.validate_upload(1024), Err(ImageError::InvalidFormat(_))));

        let big = RawImage::new(vec![0u8; 2048], "a.png");
        assert!(matches!(big.validate_upload(1024), Err(ImageError::ResourceLimit(_))));
    }

    #[test]
    fn validate_upload_checks_extension_and_signature() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);

        let wrong_ext = RawImage::new(bytes.clone(), "photo.bmp");
        assert!(wrong_ext.validate_upload(1024).is_err());

        let not_image = RawImage::new(b"%PDF-1.7 hello".to_vec(), "photo.png");
        assert!(not_image.validate_upload(1024).is_err());

        let ok = RawImage::new(bytes, "photo.PNG");
        assert!(ok.validate_upload(1024).is_ok());
    }
}
