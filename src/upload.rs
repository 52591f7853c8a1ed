//! 上传图片保存模块
//!
//! # 设计思路
//!
//! 单次上传在落库前同步调用图片优化器，成功则保存优化后的 JPEG，
//! 失败则回退保存原始字节（体积更大、保留原始方向与元数据），上传本身不因优化失败而失败。
//!
//! # 实现思路
//!
//! - 路径统一由 `storage::upload_path` 生成：`uploads/YYYY/MM/DD/<stem>.<ext>`。
//! - 优化成功时扩展名固定为 `jpg`，与原始扩展名无关。
//! - 只有存储写入失败才返回错误。

use chrono::NaiveDate;

use crate::error::AppError;
use crate::image_handler::{ImageOptimizer, RawImage};
use crate::storage::{upload_path, ObjectStore};

/// 上传保存结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// 实际写入的存储路径。
    pub path: String,
    /// 写入的字节数。
    pub size: u64,
    /// 是否保存的是优化后的版本。
    pub optimized: bool,
}

/// 优化并保存一次上传。
pub fn store_upload<S: ObjectStore>(
    raw: &RawImage,
    optimizer: &ImageOptimizer,
    store: &mut S,
    date: NaiveDate,
) -> Result<StoredUpload, AppError> {
    match optimizer.optimize_raw(raw) {
        Ok(optimized) => {
            let path = upload_path(&raw.filename, date, optimized.extension());
            let stored_path = store.put(&path, &optimized.bytes)?;
            log::info!(
                "✅ 上传图片已优化保存 - {} {}KB -> {}KB",
                stored_path,
                raw.bytes.len() / 1024,
                optimized.len() / 1024
            );
            Ok(StoredUpload {
                path: stored_path,
                size: optimized.len() as u64,
                optimized: true,
            })
        }
        Err(err) => {
            log::warn!("⚠️ 图片优化失败，保存原始文件：{} ({})", raw.filename, err);
            let extension = raw.extension().unwrap_or_else(|| "bin".to_string());
            let path = upload_path(&raw.filename, date, &extension);
            let stored_path = store.put(&path, &raw.bytes)?;
            Ok(StoredUpload {
                path: stored_path,
                size: raw.bytes.len() as u64,
                optimized: false,
            })
        }
    }
}
