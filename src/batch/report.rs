//! 批处理文本报告
//!
//! 面向命令行的逐条进度行与最终汇总。文本格式仅供人阅读，不作为稳定接口。

use crate::image_handler::ImageOptimizationSettings;

use super::{BatchReport, OptimizationOutcome, RecordResult, REASON_NO_SIZE_REDUCTION};

const RULE_WIDTH: usize = 60;

fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

pub fn settings_line(settings: &ImageOptimizationSettings) -> String {
    format!(
        "Image settings: max {}x{}, JPEG quality {}%",
        settings.max_width, settings.max_height, settings.jpeg_quality
    )
}

/// 单条记录的进度行；安静跳过（低于阈值、已优化）返回 `None`。
pub fn record_line(result: &RecordResult, dry_run: bool) -> Option<String> {
    match &result.outcome {
        OptimizationOutcome::Optimized {
            original_bytes,
            new_bytes,
            saved_bytes,
        } => {
            let action = if dry_run { "Would optimize" } else { "Optimized" };
            let percent = if *original_bytes > 0 {
                *saved_bytes as f64 / *original_bytes as f64 * 100.0
            } else {
                0.0
            };
            Some(format!(
                "  {} Entry {}: {:.1}KB -> {:.1}KB (saved {:.1}KB, {:.0}%)",
                action,
                result.id,
                kb(*original_bytes),
                kb(*new_bytes),
                *saved_bytes as f64 / 1024.0,
                percent
            ))
        }
        OptimizationOutcome::Skipped { reason } if reason == REASON_NO_SIZE_REDUCTION => {
            Some(format!("  Entry {}: Skipped (no size reduction)", result.id))
        }
        OptimizationOutcome::Skipped { .. } => None,
        OptimizationOutcome::Failed { reason } => {
            Some(format!("  Entry {}: Error - {}", result.id, reason))
        }
    }
}

/// 最终汇总（多行）。
pub fn summary(report: &BatchReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![String::new(), rule.clone()];

    let action = if report.dry_run { "Would optimize" } else { "Optimized" };
    lines.push(format!("{}: {}", action, report.optimized));
    lines.push(format!("Skipped: {}", report.skipped));
    if report.failed > 0 {
        lines.push(format!("Errors: {}", report.failed));
    }

    if report.total_saved_bytes > 0 {
        let saved_mb = report.total_saved_bytes as f64 / (1024.0 * 1024.0);
        let label = if report.dry_run { "Would save" } else { "Saved" };
        lines.push(format!("{}: {:.2} MB", label, saved_mb));
    }

    lines.push(rule);

    if report.dry_run && report.optimized > 0 {
        lines.push(String::new());
        lines.push("Run without --dry-run to apply optimizations".to_string());
    }

    lines.join("\n")
}
