//! 批量重新优化模块
//!
//! # 设计思路
//!
//! 对已存储的图片逐条应用与上传相同的优化，按策略跳过小文件、已优化文件与无收益结果。
//! 每条记录的失败都被转换为结果值，绝不中断整个批次。
//!
//! # 实现思路
//!
//! - 严格顺序处理，无共享可变状态，无需加锁。
//! - 每条记录的“删除旧对象 → 写入新对象”视为一个单元；存储本身不支持事务，
//!   进程在两步之间被终止时，该记录的图片可能丢失或成为孤儿对象。
//! - 新路径由调用方提供的 `persist` 回写数据库；回写失败时尝试恢复原图，
//!   记录计为失败。
//! - 新对象写入失败时，原图字节仍在内存中，立即写回原路径。
//! - 进度通过回调逐条上报，统计汇总在 `BatchReport` 中。

use serde::Serialize;

use crate::error::AppError;
use crate::image_handler::{ImageOptimizer, OPTIMIZED_EXTENSION};
use crate::storage::{with_extension, ObjectStore};

pub mod report;

pub const REASON_NOT_ACCESSIBLE: &str = "not accessible";
pub const REASON_BELOW_THRESHOLD: &str = "below size threshold";
pub const REASON_ALREADY_OPTIMIZED: &str = "already optimized";
pub const REASON_NO_SIZE_REDUCTION: &str = "no size reduction";
pub const REASON_CATALOG_UPDATE_FAILED: &str = "catalog update failed";

/// 批处理策略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// 只计算、不修改存储。
    pub dry_run: bool,
    /// 忽略体积阈值、已优化预检与“无收益”判断。
    pub force: bool,
    /// 小于该体积（KB）的图片跳过。
    pub min_size_kb: u64,
    /// 只处理指定记录。
    pub target_record_id: Option<i64>,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            min_size_kb: 100,
            target_record_id: None,
        }
    }
}

/// 待处理的图片记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    /// 对象存储中的路径。
    pub path: String,
}

/// 单条记录的处理结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OptimizationOutcome {
    Optimized {
        original_bytes: u64,
        new_bytes: u64,
        /// 可能为负（`force` 时允许变大）。
        saved_bytes: i64,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl OptimizationOutcome {
    fn skipped(reason: &str) -> Self {
        Self::Skipped {
            reason: reason.to_string(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordResult {
    pub id: i64,
    pub original_path: String,
    pub outcome: OptimizationOutcome,
    /// 替换后的新路径（仅非 dry-run 且已优化时存在）。
    pub new_path: Option<String>,
}

/// 批处理汇总。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<RecordResult>,
    pub optimized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_saved_bytes: i64,
    pub dry_run: bool,
}

impl BatchReport {
    fn record(&mut self, result: RecordResult) {
        match &result.outcome {
            OptimizationOutcome::Optimized { saved_bytes, .. } => {
                self.optimized += 1;
                self.total_saved_bytes += saved_bytes;
            }
            OptimizationOutcome::Skipped { .. } => self.skipped += 1,
            OptimizationOutcome::Failed { .. } => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// 逐条处理记录，返回汇总。
///
/// `persist` 在对象替换成功后立即调用，把新路径写回目录；
/// `on_record` 在每条记录处理完后调用。
pub fn run_batch<S, P, F>(
    records: &[ImageRecord],
    store: &mut S,
    optimizer: &ImageOptimizer,
    policy: &BatchPolicy,
    mut persist: P,
    mut on_record: F,
) -> BatchReport
where
    S: ObjectStore,
    P: FnMut(&ImageRecord, &str) -> Result<(), AppError>,
    F: FnMut(&RecordResult),
{
    let mut report = BatchReport {
        dry_run: policy.dry_run,
        ..BatchReport::default()
    };

    let candidates = records
        .iter()
        .filter(|record| policy.target_record_id.is_none_or(|id| id == record.id));

    for record in candidates {
        let result = process_record(record, store, optimizer, policy, &mut persist);
        on_record(&result);
        report.record(result);
    }

    log::info!(
        "📦 批处理完成 - optimized={} skipped={} failed={} saved={}B dry_run={}",
        report.optimized,
        report.skipped,
        report.failed,
        report.total_saved_bytes,
        report.dry_run
    );

    report
}

fn process_record<S, P>(
    record: &ImageRecord,
    store: &mut S,
    optimizer: &ImageOptimizer,
    policy: &BatchPolicy,
    persist: &mut P,
) -> RecordResult
where
    S: ObjectStore,
    P: FnMut(&ImageRecord, &str) -> Result<(), AppError>,
{
    let (outcome, new_path) = evaluate_record(record, store, optimizer, policy, persist);
    RecordResult {
        id: record.id,
        original_path: record.path.clone(),
        outcome,
        new_path,
    }
}

fn evaluate_record<S, P>(
    record: &ImageRecord,
    store: &mut S,
    optimizer: &ImageOptimizer,
    policy: &BatchPolicy,
    persist: &mut P,
) -> (OptimizationOutcome, Option<String>)
where
    S: ObjectStore,
    P: FnMut(&ImageRecord, &str) -> Result<(), AppError>,
{
    let original_size = match store.size(&record.path) {
        Ok(size) => size,
        Err(err) => {
            log::warn!("⚠️ 条目 {} 图片不可访问：{}", record.id, err);
            return (OptimizationOutcome::failed(REASON_NOT_ACCESSIBLE), None);
        }
    };

    if original_size < policy.min_size_kb.saturating_mul(1024) && !policy.force {
        return (OptimizationOutcome::skipped(REASON_BELOW_THRESHOLD), None);
    }

    let original = match store.get(&record.path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("⚠️ 条目 {} 图片读取失败：{}", record.id, err);
            return (OptimizationOutcome::failed(REASON_NOT_ACCESSIBLE), None);
        }
    };

    if !policy.force && is_already_optimized(record, &original, optimizer) {
        return (OptimizationOutcome::skipped(REASON_ALREADY_OPTIMIZED), None);
    }

    let optimized = match optimizer.optimize(&original) {
        Ok(optimized) => optimized,
        Err(err) => {
            log::warn!("⚠️ 条目 {} 优化失败：{}", record.id, err);
            return (OptimizationOutcome::failed(err.reason()), None);
        }
    };

    let new_size = optimized.len() as u64;
    let saved_bytes = original_size as i64 - new_size as i64;

    if saved_bytes <= 0 && !policy.force {
        return (OptimizationOutcome::skipped(REASON_NO_SIZE_REDUCTION), None);
    }

    let outcome = OptimizationOutcome::Optimized {
        original_bytes: original_size,
        new_bytes: new_size,
        saved_bytes,
    };

    if policy.dry_run {
        return (outcome, None);
    }

    let new_path = match replace_object(store, &record.path, &original, &optimized.bytes) {
        Ok(new_path) => new_path,
        Err(err) => {
            log::error!("❌ 条目 {} 替换图片失败：{}", record.id, err);
            return (OptimizationOutcome::failed(format!("storage error: {}", err)), None);
        }
    };

    if let Err(err) = persist(record, &new_path) {
        log::error!("❌ 条目 {} 回写新路径 {} 失败：{}", record.id, new_path, err);
        if let Err(err) = store.delete(&new_path) {
            log::warn!("⚠️ 删除新对象 {} 失败：{}", new_path, err);
        }
        restore_original(store, &record.path, &original);
        return (OptimizationOutcome::failed(REASON_CATALOG_UPDATE_FAILED), None);
    }

    (outcome, Some(new_path))
}

/// 预检：JPEG 扩展名 + 内容为 3 通道 JPEG + 尺寸在上限内 + 无方向标记。
///
/// 只读 header；header 无法解析时交给完整优化流程去报告错误。
fn is_already_optimized(record: &ImageRecord, bytes: &[u8], optimizer: &ImageOptimizer) -> bool {
    let lower = record.path.to_ascii_lowercase();
    if !(lower.ends_with(".jpg") || lower.ends_with(".jpeg")) {
        return false;
    }

    match optimizer.inspect(bytes) {
        Ok(inspection) => inspection.is_optimized(optimizer.settings()),
        Err(_) => false,
    }
}

/// 删除旧对象并以输出扩展名写入新对象，返回实际路径。
///
/// 新对象写入失败时把原图写回旧路径。
fn replace_object<S: ObjectStore>(
    store: &mut S,
    old_path: &str,
    original: &[u8],
    bytes: &[u8],
) -> Result<String, AppError> {
    let new_path = with_extension(old_path, OPTIMIZED_EXTENSION);
    store.delete(old_path)?;
    match store.put(&new_path, bytes) {
        Ok(stored_path) => Ok(stored_path),
        Err(err) => {
            restore_original(store, old_path, original);
            Err(err)
        }
    }
}

fn restore_original<S: ObjectStore>(store: &mut S, path: &str, original: &[u8]) {
    match store.put(path, original) {
        Ok(restored) if restored == path => log::warn!("↩️ 已恢复原图：{}", path),
        Ok(restored) => log::error!("❌ 原图恢复到了不同路径：{} -> {}", path, restored),
        Err(err) => log::error!("❌ 原图恢复失败 {}：{}", path, err),
    }
}
