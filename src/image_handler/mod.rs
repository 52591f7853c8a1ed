//! # 图片优化模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“解码 → 方向校正 → 颜色统一 → 尺寸约束 → JPEG 重编码”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。整个模块不做任何 I/O，
//! 输入与输出都是内存中的字节。
//!
//! - `handler`：编排整条处理流水线
//! - `pipeline`：解码、方向校正、RGB 转换、缩放、编码
//! - `inspect`：只读 header 的快速探测（批处理预检）
//! - `config/error/source`：配置、错误、输入输出模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 上传流程 / 批处理
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ pipeline.rs  decode_oriented（解码 + 像素限制 + EXIF 方向）
//!    ├─ pipeline.rs  flatten_to_rgb（透明合成到白底）
//!    ├─ pipeline.rs  bound_dimensions（等比缩小，从不放大）
//!    └─ pipeline.rs  encode_jpeg（渐进式 JPEG）
//!    ↓
//! OptimizedImage / ImageError
//! ```

mod config;
mod error;
mod handler;
mod inspect;
mod pipeline;
mod source;

pub use config::{ImageOptimizationSettings, DEFAULT_MAX_DECODED_PIXELS, MAX_JPEG_DIMENSION};
pub use error::ImageError;
pub use handler::ImageOptimizer;
pub use inspect::ImageInspection;
pub use source::{
    OptimizedImage, RawImage, ALLOWED_UPLOAD_EXTENSIONS, OPTIMIZED_EXTENSION, OPTIMIZED_MIME_TYPE,
};
