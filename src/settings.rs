//! 应用设置模块
//!
//! # 设计思路
//!
//! 进程级配置在启动时读取一次：JSON 文件（可选）→ 环境变量覆盖 → 校验。
//! 之后以只读方式传给各模块，单次操作中不会变化。
//!
//! # 实现思路
//!
//! - 所有字段都有默认值，配置文件可以只写需要修改的部分。
//! - 环境变量通过可注入的查询函数读取，测试不需要修改进程环境。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::image_handler::ImageOptimizationSettings;

pub const ENV_MEDIA_ROOT: &str = "TIMELINE_MEDIA_ROOT";
pub const ENV_DATABASE: &str = "TIMELINE_DATABASE";
pub const ENV_MAX_WIDTH: &str = "IMAGE_MAX_WIDTH";
pub const ENV_MAX_HEIGHT: &str = "IMAGE_MAX_HEIGHT";
pub const ENV_JPEG_QUALITY: &str = "IMAGE_JPEG_QUALITY";
pub const ENV_MAX_UPLOAD_BYTES: &str = "IMAGE_MAX_UPLOAD_BYTES";

/// 应用设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// 媒体文件根目录（对象存储根）
    pub media_root: PathBuf,
    /// SQLite 数据库文件
    pub database_path: PathBuf,
    /// 单次上传允许的最大字节数
    pub max_upload_bytes: u64,
    /// 图片优化参数
    pub image: ImageOptimizationSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            database_path: PathBuf::from("timeline.db"),
            max_upload_bytes: 10 * 1024 * 1024,
            image: ImageOptimizationSettings::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("环境变量 {} 的值无效: '{}'", name, value)))
}

impl AppSettings {
    /// 读取配置文件（可选）并应用进程环境变量。
    pub fn load(config_path: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env(
        config_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides(env)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("读取配置文件 '{}' 失败: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("解析配置文件 '{}' 失败: {}", path.display(), e))
        })
    }

    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), AppError> {
        if let Some(value) = env(ENV_MEDIA_ROOT) {
            self.media_root = PathBuf::from(value);
        }
        if let Some(value) = env(ENV_DATABASE) {
            self.database_path = PathBuf::from(value);
        }
        if let Some(value) = env(ENV_MAX_WIDTH) {
            self.image.max_width = parse_env(ENV_MAX_WIDTH, &value)?;
        }
        if let Some(value) = env(ENV_MAX_HEIGHT) {
            self.image.max_height = parse_env(ENV_MAX_HEIGHT, &value)?;
        }
        if let Some(value) = env(ENV_JPEG_QUALITY) {
            self.image.jpeg_quality = parse_env(ENV_JPEG_QUALITY, &value)?;
        }
        if let Some(value) = env(ENV_MAX_UPLOAD_BYTES) {
            self.max_upload_bytes = parse_env(ENV_MAX_UPLOAD_BYTES, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.image
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config("max_upload_bytes 必须大于 0".to_string()));
        }
        Ok(())
    }
}
