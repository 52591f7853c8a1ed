//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举。
//!
//! 命令层与存储、数据库层统一返回 `Result<T, AppError>`，
//! 图片优化层使用更细粒度的 `ImageError`，在边界处自动上转。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageError` / `std::io::Error` 提供 `From` 转换，无需手动 map。

use crate::image_handler::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 图片优化流水线错误（解码 / 缩放 / 编码）
    #[error("{0}")]
    Image(#[from] ImageError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 对象存储不可用或路径非法
    #[error("存储错误: {0}")]
    Storage(String),

    /// 数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),

    /// 配置文件或环境变量非法
    #[error("配置错误: {0}")]
    Config(String),
}
