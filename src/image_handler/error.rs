//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载图片优化链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 批处理统计只需要一个简短、稳定的原因字符串，由 `reason()` 提供；
//! 完整的错误消息仅用于日志。

/// 图片优化统一错误类型。
///
/// 该类型会在应用边界被上转为 `AppError`。
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("缩放错误：{0}")]
    Resize(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("配置错误：{0}")]
    InvalidSettings(String),
}

impl ImageError {
    /// 稳定的失败原因，用于 `OptimizationOutcome::Failed`。
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(_) => "undecodable",
            Self::InvalidFormat(_) => "unsupported format",
            Self::ResourceLimit(_) => "too large",
            Self::Resize(_) => "resize failed",
            Self::Encode(_) => "encode failed",
            Self::InvalidSettings(_) => "invalid settings",
        }
    }
}
