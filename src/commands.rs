//! 命令层
//!
//! # 设计思路
//!
//! 命令层只做参数适配与输出，不承载业务逻辑：
//! 图片优化交给 `image_handler`，上传保存交给 `upload`，批处理交给 `batch`。
//! 每个命令都有一个接收已打开资源（连接、存储、输出流）的 `*_with` 版本，便于测试。

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use rusqlite::Connection;
use serde_json::json;

use crate::batch::{self, report, BatchPolicy, BatchReport};
use crate::db::{self, EntryKind, NewEntry};
use crate::error::AppError;
use crate::image_handler::{ImageOptimizer, OptimizedImage, RawImage};
use crate::settings::AppSettings;
use crate::storage::{FsObjectStore, ObjectStore};
use crate::upload::{self, StoredUpload};

// ============================================================================
// optimize-images
// ============================================================================

/// 对数据库中所有带图片的条目执行批量重新优化。
pub fn optimize_images(
    settings: &AppSettings,
    policy: &BatchPolicy,
    out: &mut impl Write,
) -> Result<BatchReport, AppError> {
    let optimizer = ImageOptimizer::new(settings.image)?;
    let conn = db::open_db(&settings.database_path)?;
    let mut store = FsObjectStore::open(&settings.media_root)?;
    optimize_images_with(&conn, &mut store, &optimizer, policy, out)
}

pub fn optimize_images_with<S: ObjectStore>(
    conn: &Connection,
    store: &mut S,
    optimizer: &ImageOptimizer,
    policy: &BatchPolicy,
    out: &mut impl Write,
) -> Result<BatchReport, AppError> {
    if policy.dry_run {
        writeln!(out, "DRY RUN - No changes will be made\n")?;
    }
    writeln!(out, "{}\n", report::settings_line(optimizer.settings()))?;

    let records = db::list_image_records(conn, policy.target_record_id)?;
    if records.is_empty() {
        writeln!(out, "No entries with images found.")?;
        return Ok(BatchReport {
            dry_run: policy.dry_run,
            ..BatchReport::default()
        });
    }
    writeln!(out, "Found {} entries with images\n", records.len())?;

    let batch_report = batch::run_batch(
        &records,
        store,
        optimizer,
        policy,
        |record, new_path| db::update_image_path(conn, record.id, new_path),
        |result| {
            if let Some(line) = report::record_line(result, policy.dry_run) {
                if let Err(err) = writeln!(out, "{}", line) {
                    log::warn!("写入进度失败: {}", err);
                }
            }
        },
    );

    writeln!(out, "{}", report::summary(&batch_report))?;
    Ok(batch_report)
}

// ============================================================================
// add-photo
// ============================================================================

/// 上传一张照片：校验 → 优化（失败回退原图）→ 保存 → 新建照片条目。
pub fn add_photo(
    settings: &AppSettings,
    file: &Path,
    caption: Option<String>,
    out: &mut impl Write,
) -> Result<i64, AppError> {
    let optimizer = ImageOptimizer::new(settings.image)?;
    let conn = db::open_db(&settings.database_path)?;
    let mut store = FsObjectStore::open(&settings.media_root)?;

    let bytes = fs::read(file)?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    let mut raw = RawImage::new(bytes, filename);
    if let Some(kind) = infer::get(&raw.bytes) {
        raw = raw.with_mime_type(kind.mime_type());
    }

    add_photo_with(
        &conn,
        &mut store,
        &optimizer,
        &raw,
        caption,
        settings.max_upload_bytes,
        Local::now(),
        out,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn add_photo_with<S: ObjectStore>(
    conn: &Connection,
    store: &mut S,
    optimizer: &ImageOptimizer,
    raw: &RawImage,
    caption: Option<String>,
    max_upload_bytes: u64,
    now: DateTime<Local>,
    out: &mut impl Write,
) -> Result<i64, AppError> {
    raw.validate_upload(max_upload_bytes)?;

    let StoredUpload {
        path,
        size,
        optimized,
    } = upload::store_upload(raw, optimizer, store, now.date_naive())?;

    let entry_id = db::insert_entry(
        conn,
        &NewEntry {
            kind: EntryKind::Photo,
            timestamp: now.timestamp_millis(),
            data: json!({ "caption": caption.unwrap_or_default() }),
            image: Some(path.clone()),
        },
    )?;

    let note = if optimized { "optimized" } else { "original kept" };
    writeln!(
        out,
        "{} Created entry {}: {} ({:.1}KB, {})",
        EntryKind::Photo.icon(),
        entry_id,
        path,
        size as f64 / 1024.0,
        note
    )?;

    Ok(entry_id)
}

// ============================================================================
// optimize-file
// ============================================================================

/// 优化单个本地文件并写到输出路径。
pub fn optimize_file(
    settings: &AppSettings,
    input: &Path,
    output: &Path,
    out: &mut impl Write,
) -> Result<OptimizedImage, AppError> {
    let optimizer = ImageOptimizer::new(settings.image)?;
    let bytes = fs::read(input)?;
    let optimized = optimizer.optimize(&bytes)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output, &optimized.bytes)?;

    writeln!(
        out,
        "{} -> {}: {:.1}KB -> {:.1}KB ({}x{})",
        input.display(),
        output.display(),
        bytes.len() as f64 / 1024.0,
        optimized.len() as f64 / 1024.0,
        optimized.width,
        optimized.height
    )?;

    Ok(optimized)
}
