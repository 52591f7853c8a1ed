//! # 时间线媒体工具 — 命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与命令分发。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use timeline_media::batch::BatchPolicy;
use timeline_media::commands;
use timeline_media::error::AppError;
use timeline_media::settings::AppSettings;

#[derive(Parser)]
#[command(name = "timeline-media")]
#[command(about = "Optimize family timeline photos", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON settings file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-optimize images already stored for timeline entries
    OptimizeImages {
        /// Show what would be optimized without making changes
        #[arg(long)]
        dry_run: bool,

        /// Re-optimize images even if they are already JPEG
        #[arg(long)]
        force: bool,

        /// Minimum file size in KB to consider for optimization
        #[arg(long = "min-size", default_value_t = 100)]
        min_size_kb: u64,

        /// Optimize only a specific entry by ID
        #[arg(long)]
        entry_id: Option<i64>,
    },
    /// Upload a photo as a new timeline entry
    AddPhoto {
        /// Image file to upload
        file: PathBuf,

        /// Optional caption
        #[arg(long)]
        caption: Option<String>,
    },
    /// Optimize a single local image file
    OptimizeFile {
        input: PathBuf,
        output: PathBuf,
    },
}

fn run(cli: Cli) -> Result<(), AppError> {
    let settings = AppSettings::load(cli.config.as_deref())?;
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::OptimizeImages {
            dry_run,
            force,
            min_size_kb,
            entry_id,
        } => {
            let policy = BatchPolicy {
                dry_run,
                force,
                min_size_kb,
                target_record_id: entry_id,
            };
            commands::optimize_images(&settings, &policy, &mut out)?;
        }
        Commands::AddPhoto { file, caption } => {
            commands::add_photo(&settings, &file, caption, &mut out)?;
        }
        Commands::OptimizeFile { input, output } => {
            commands::optimize_file(&settings, &input, &output, &mut out)?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("命令执行失败: {err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
