//! 条目读写子模块
//!
//! ## 职责
//! - 插入 / 读取时间线条目
//! - 列出带图片的条目供批处理遍历
//! - 批处理替换图片后回写新路径

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::batch::ImageRecord;
use crate::error::AppError;

use super::{Entry, EntryKind, NewEntry};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(i64, String, i64, String, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn build_entry(raw: (i64, String, i64, String, Option<String>)) -> Result<Entry, AppError> {
    let (id, kind, timestamp, data, image) = raw;
    let data = serde_json::from_str(&data)
        .map_err(|e| AppError::Database(format!("解析条目 {} 数据失败: {}", id, e)))?;

    Ok(Entry {
        id,
        kind: kind.parse::<EntryKind>()?,
        timestamp,
        data,
        image: image.filter(|path| !path.is_empty()),
    })
}

/// 插入条目，返回新 ID。
pub fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<i64, AppError> {
    let data = serde_json::to_string(&entry.data)
        .map_err(|e| AppError::Database(format!("序列化条目数据失败: {}", e)))?;

    conn.execute(
        "INSERT INTO entries (kind, timestamp, data, image) VALUES (?1, ?2, ?3, ?4)",
        params![entry.kind.as_str(), entry.timestamp, data, entry.image],
    )
    .map_err(|e| AppError::Database(format!("插入条目失败: {}", e)))?;

    Ok(conn.last_insert_rowid())
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<Entry>, AppError> {
    let raw = conn
        .query_row(
            "SELECT id, kind, timestamp, data, image FROM entries WHERE id = ?1",
            params![id],
            row_to_entry,
        )
        .optional()
        .map_err(|e| AppError::Database(format!("查询条目失败: {}", e)))?;

    raw.map(build_entry).transpose()
}

/// 列出带图片的条目（按 ID 升序），可限定为单个条目。
pub fn list_image_records(conn: &Connection, entry_id: Option<i64>) -> Result<Vec<ImageRecord>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, image FROM entries
             WHERE image IS NOT NULL AND image != ''
               AND (?1 IS NULL OR id = ?1)
             ORDER BY id ASC",
        )
        .map_err(|e| AppError::Database(format!("准备图片条目查询失败: {}", e)))?;

    let rows = stmt
        .query_map(params![entry_id], |row| {
            Ok(ImageRecord {
                id: row.get(0)?,
                path: row.get(1)?,
            })
        })
        .map_err(|e| AppError::Database(format!("查询图片条目失败: {}", e)))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(|e| AppError::Database(format!("读取图片条目失败: {}", e)))?);
    }
    Ok(records)
}

/// 回写条目的图片路径。
pub fn update_image_path(conn: &Connection, id: i64, path: &str) -> Result<(), AppError> {
    let updated = conn
        .execute("UPDATE entries SET image = ?1 WHERE id = ?2", params![path, id])
        .map_err(|e| AppError::Database(format!("更新条目 {} 图片路径失败: {}", id, e)))?;

    if updated == 0 {
        return Err(AppError::Database(format!("条目 {} 不存在", id)));
    }
    Ok(())
}
