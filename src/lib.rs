//! # 时间线媒体工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 命令行 (main.rs, clap)                    │
//! │   optimize-images      add-photo       optimize-file     │
//! └───────┬──────────────────┬──────────────────┬────────────┘
//!         ↓                  ↓                  ↓
//! ┌───────┼──────────────────┼──────────────────┼────────────┐
//! │  commands ── 参数适配 + 进度输出                          │
//! │       │                  │                  │            │
//! │  batch (顺序批处理)   upload (失败回退原图)  │            │
//! │       │                  │                  │            │
//! │       └──────── image_handler (纯变换) ─────┘            │
//! │                 解码 · 方向 · RGB · 缩放 · JPEG          │
//! │                                                          │
//! │  storage ── ObjectStore (get / put / delete / size)      │
//! │  db ─────── SQLite 条目目录 (rusqlite)                    │
//! │  settings ─ JSON + 环境变量                               │
//! │  error ──── AppError (统一错误类型)                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`settings`] | 进程级配置加载与校验 |
//! | [`image_handler`] | 图片优化流水线，无 I/O |
//! | [`upload`] | 单次上传：优化后保存，失败回退原图 |
//! | [`batch`] | 已存储图片的批量重新优化与报告 |
//! | [`storage`] | 对象存储抽象、本地文件实现、路径生成 |
//! | [`db`] | 时间线条目目录（SQLite） |
//! | [`commands`] | 命令行命令实现 |

pub mod error;
pub mod batch;
pub mod commands;
pub mod db;
pub mod image_handler;
pub mod settings;
pub mod storage;
pub mod upload;
