//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建数据库表结构与索引
//! - 设置 SQLite 运行参数（WAL）
//!
//! ## 输入/输出
//! - 输入：`&Connection`
//! - 输出：`Result<(), AppError>`
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Database`

use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Database(format!("写入数据库版本失败: {}", e)))
}

fn create_base_tables(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            image TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries(timestamp DESC);"
    ).map_err(|e| AppError::Database(format!("创建条目表失败: {}", e)))
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .ok();

    create_base_tables(conn)?;

    let version = get_user_version(conn)?;
    if version < 1 {
        set_user_version(conn, 1)?;
    } else if version != SCHEMA_VERSION {
        return Err(AppError::Database(format!(
            "数据库版本不匹配: current={}, expected={}",
            version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize_schema;

    #[test]
    fn initialize_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("create memory db");

        initialize_schema(&conn).expect("first init should succeed");
        initialize_schema(&conn).expect("second init should succeed");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='entries'", [], |row| row.get(0))
            .expect("query table count");
        assert_eq!(count, 1);

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("query user_version");
        assert_eq!(version, 1);
    }

    #[test]
    fn rejects_newer_schema_versions() {
        let conn = Connection::open_in_memory().expect("create memory db");
        conn.execute_batch("PRAGMA user_version = 9;").expect("set version");
        assert!(initialize_schema(&conn).is_err());
    }
}
