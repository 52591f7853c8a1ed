//! 数据库模块
//!
//! # 设计思路
//!
//! 时间线条目的最小 SQLite 目录：批处理需要遍历“带图片的条目”，
//! 上传流程需要插入新的照片条目。使用 `rusqlite` 直接操作 SQLite。
//!
//! # 优势
//!
//! - **类型安全**：`EntryKind` 是封闭枚举，新增条目类型时编译器会提示所有分支
//! - **一致性**：图片路径只在本模块读写
//! - **可测试**：所有函数接收 `&Connection`，测试使用内存数据库

use std::fs;
use std::path::Path;
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

mod entries;
mod schema;

pub use entries::*;

// ============================================================================
// 数据模型
// ============================================================================

/// 条目类型（封闭集合）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    Photo,
    Overnight,
    SchoolDay,
    Weekend,
}

impl EntryKind {
    pub const ALL: [EntryKind; 5] = [
        EntryKind::Text,
        EntryKind::Photo,
        EntryKind::Overnight,
        EntryKind::SchoolDay,
        EntryKind::Weekend,
    ];

    /// 稳定的存储字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Overnight => "overnight",
            Self::SchoolDay => "schoolday",
            Self::Weekend => "weekend",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Text => "Text Post",
            Self::Photo => "Photo",
            Self::Overnight => "Overnight",
            Self::SchoolDay => "School Day",
            Self::Weekend => "My Weekend",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Text => "📝",
            Self::Photo => "📸",
            Self::Overnight => "🌙",
            Self::SchoolDay => "🎒",
            Self::Weekend => "🎉",
        }
    }
}

impl FromStr for EntryKind {
    type Err = AppError;

    /// 从存储字符串解析条目类型。
    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "photo" => Ok(Self::Photo),
            "overnight" => Ok(Self::Overnight),
            "schoolday" => Ok(Self::SchoolDay),
            "weekend" => Ok(Self::Weekend),
            other => Err(AppError::Database(format!("未知条目类型: {}", other))),
        }
    }
}

/// 时间线条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub kind: EntryKind,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub data: serde_json::Value,
    /// 图片在对象存储中的路径
    pub image: Option<String>,
}

/// 待插入的条目
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub timestamp: i64,
    pub data: serde_json::Value,
    pub image: Option<String>,
}

// ============================================================================
// 数据库初始化
// ============================================================================

/// 打开数据库并初始化 Schema，父目录不存在时自动创建。
pub fn open_db(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Database(format!("创建数据库目录失败: {}", e))
            })?;
        }
    }
    log::info!("数据库路径: {}", db_path.display());

    let conn = Connection::open(db_path).map_err(|e| {
        AppError::Database(format!("打开数据库失败: {}", e))
    })?;

    schema::initialize_schema(&conn)?;

    Ok(conn)
}

/// 内存数据库（测试与一次性任务）。
pub fn open_in_memory() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory().map_err(|e| {
        AppError::Database(format!("打开内存数据库失败: {}", e))
    })?;
    schema::initialize_schema(&conn)?;
    Ok(conn)
}
