//! 图片对象存储模块
//!
//! # 设计思路
//!
//! 批处理与上传流程只依赖一个键值式的对象存储：`get / put / delete / size`。
//! 路径是相对于存储根的 `/` 分隔字符串，与数据库中记录的图片路径一致。
//!
//! # 实现思路
//!
//! - `FsObjectStore`：以媒体目录为根的本地文件存储，按需创建父目录。
//! - `MemoryObjectStore`：进程内存储，可标记路径为不可读以模拟存储故障。
//! - `put` 遇到同名对象时自动追加 `_N` 后缀，返回实际写入的路径。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

use crate::error::AppError;

/// 上传文件的根前缀。
pub const UPLOAD_PREFIX: &str = "uploads";

/// 键值式对象存储。
pub trait ObjectStore {
    /// 读取对象全部字节。
    fn get(&self, path: &str) -> Result<Vec<u8>, AppError>;

    /// 写入对象，返回实际使用的路径（同名时自动改名）。
    fn put(&mut self, path: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// 删除对象；对象不存在视为成功。
    fn delete(&mut self, path: &str) -> Result<(), AppError>;

    /// 对象大小（字节）。
    fn size(&self, path: &str) -> Result<u64, AppError> {
        self.get(path).map(|bytes| bytes.len() as u64)
    }

    fn exists(&self, path: &str) -> bool;
}

/// 为已占用路径寻找可用名称：`a.jpg` -> `a_1.jpg` -> `a_2.jpg` ...
fn available_path(path: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(path) {
        return path.to_string();
    }

    let (dir, file_name) = split_file_name(path);
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let mut counter: u32 = 1;
    loop {
        let candidate_name = match ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = format!("{}{}", dir, candidate_name);
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// 拆分为（含末尾 `/` 的目录部分, 文件名）。
fn split_file_name(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    }
}

/// 替换路径中文件名的扩展名；没有扩展名时追加。
pub fn with_extension(path: &str, extension: &str) -> String {
    let (dir, file_name) = split_file_name(path);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{}{}.{}", dir, stem, extension)
}

/// 清洗文件名主干：空白转下划线，仅保留字母数字、`-`、`_`、`.`。
pub fn sanitize_file_stem(filename: &str) -> String {
    let file_name = Path::new(filename.trim())
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();

    let cleaned: String = file_name
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' => Some(c),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// 生成上传路径：`uploads/YYYY/MM/DD/<stem>.<ext>`。
pub fn upload_path(filename: &str, date: NaiveDate, extension: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        UPLOAD_PREFIX,
        date.format("%Y/%m/%d"),
        sanitize_file_stem(filename),
        extension
    )
}

// ============================================================================
// 本地文件存储
// ============================================================================

/// 以媒体目录为根的本地文件存储。
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// 打开存储根目录，不存在时自动创建。
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                AppError::Storage(format!("创建媒体目录 '{}' 失败: {}", root.display(), e))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将相对路径解析到根目录下，拒绝绝对路径与 `..`。
    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if path.is_empty() || escapes {
            return Err(AppError::Storage(format!("非法存储路径: '{}'", path)));
        }

        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let full = self.resolve(path)?;
        fs::read(&full)
            .map_err(|e| AppError::Storage(format!("读取 '{}' 失败: {}", full.display(), e)))
    }

    fn put(&mut self, path: &str, bytes: &[u8]) -> Result<String, AppError> {
        self.resolve(path)?;
        let final_path = available_path(path, |candidate| {
            self.resolve(candidate).map(|p| p.exists()).unwrap_or(false)
        });
        let full = self.resolve(&final_path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("创建目录 '{}' 失败: {}", parent.display(), e))
            })?;
        }

        fs::write(&full, bytes)?;
        log::debug!("💾 已写入 {}（{} bytes）", final_path, bytes.len());
        Ok(final_path)
    }

    fn delete(&mut self, path: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "删除 '{}' 失败: {}",
                full.display(),
                e
            ))),
        }
    }

    fn size(&self, path: &str) -> Result<u64, AppError> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full)
            .map_err(|e| AppError::Storage(format!("读取 '{}' 信息失败: {}", full.display(), e)))?;
        if !metadata.is_file() {
            return Err(AppError::Storage(format!("'{}' 不是文件", full.display())));
        }
        Ok(metadata.len())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

// ============================================================================
// 内存存储
// ============================================================================

/// 进程内对象存储。
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, Vec<u8>>,
    unreadable: HashSet<String>,
    read_only: HashSet<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入对象（覆盖同名对象）。
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(path.into(), bytes);
    }

    /// 标记路径不可读：`get` / `size` 返回存储错误。
    pub fn mark_unreadable(&mut self, path: impl Into<String>) {
        self.unreadable.insert(path.into());
    }

    /// 标记路径只读：对该路径的 `put` 返回存储错误。
    pub fn mark_read_only(&mut self, path: impl Into<String>) {
        self.read_only.insert(path.into());
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, path: &str) -> Result<Vec<u8>, AppError> {
        if self.unreadable.contains(path) {
            return Err(AppError::Storage(format!("'{}' 不可读", path)));
        }
        self.objects
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("'{}' 不存在", path)))
    }

    fn put(&mut self, path: &str, bytes: &[u8]) -> Result<String, AppError> {
        if self.read_only.contains(path) {
            return Err(AppError::Storage(format!("'{}' 只读", path)));
        }
        let final_path = available_path(path, |candidate| self.objects.contains_key(candidate));
        self.objects.insert(final_path.clone(), bytes.to_vec());
        Ok(final_path)
    }

    fn delete(&mut self, path: &str) -> Result<(), AppError> {
        self.objects.remove(path);
        Ok(())
    }

    fn size(&self, path: &str) -> Result<u64, AppError> {
        if self.unreadable.contains(path) {
            return Err(AppError::Storage(format!("'{}' 不可读", path)));
        }
        self.objects
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| AppError::Storage(format!("'{}' 不存在", path)))
    }

    fn exists(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{}_{}", prefix, nanos))
    }

    #[test]
    fn with_extension_only_touches_file_name() {
        assert_eq!(with_extension("uploads/2024/01/02/a.png", "jpg"), "uploads/2024/01/02/a.jpg");
        assert_eq!(with_extension("dir.v2/photo", "jpg"), "dir.v2/photo.jpg");
        assert_eq!(with_extension("a.b.webp", "jpg"), "a.b.jpg");
        assert_eq!(with_extension(".hidden", "jpg"), ".hidden.jpg");
    }

    #[test]
    fn sanitize_file_stem_cleans_names() {
        assert_eq!(sanitize_file_stem("My Photo (1).PNG"), "My_Photo_1");
        assert_eq!(sanitize_file_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_stem("照片.jpg"), "image");
    }

    #[test]
    fn upload_path_uses_date_folders() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date");
        assert_eq!(
            upload_path("beach day.png", date, "jpg"),
            "uploads/2024/03/07/beach_day.jpg"
        );
    }

    #[test]
    fn memory_store_avoids_collisions() {
        let mut store = MemoryObjectStore::new();
        let first = store.put("uploads/a.jpg", b"one").expect("put");
        let second = store.put("uploads/a.jpg", b"two").expect("put");
        let third = store.put("uploads/a.jpg", b"three").expect("put");

        assert_eq!(first, "uploads/a.jpg");
        assert_eq!(second, "uploads/a_1.jpg");
        assert_eq!(third, "uploads/a_2.jpg");
        assert_eq!(store.get("uploads/a_1.jpg").expect("get"), b"two");
    }

    #[test]
    fn memory_store_unreadable_paths_fail() {
        let mut store = MemoryObjectStore::new();
        store.insert("a.jpg", vec![1, 2, 3]);
        store.mark_unreadable("a.jpg");
        assert!(store.get("a.jpg").is_err());
        assert!(store.size("a.jpg").is_err());
        assert!(store.exists("a.jpg"));
    }

    #[test]
    fn fs_store_round_trip_and_delete() {
        let dir = unique_temp_dir("timeline_media_fs_store");
        let mut store = FsObjectStore::open(&dir).expect("open store");

        let path = store.put("uploads/2024/01/01/x.jpg", b"hello").expect("put");
        assert_eq!(path, "uploads/2024/01/01/x.jpg");
        assert_eq!(store.size(&path).expect("size"), 5);
        assert_eq!(store.get(&path).expect("get"), b"hello");

        let renamed = store.put("uploads/2024/01/01/x.jpg", b"again").expect("put");
        assert_eq!(renamed, "uploads/2024/01/01/x_1.jpg");

        store.delete(&path).expect("delete");
        assert!(!store.exists(&path));
        store.delete(&path).expect("deleting twice is fine");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn fs_store_rejects_escaping_paths() {
        let dir = unique_temp_dir("timeline_media_fs_escape");
        let mut store = FsObjectStore::open(&dir).expect("open store");

        assert!(store.get("../secret").is_err());
        assert!(store.put("/etc/passwd", b"x").is_err());
        assert!(store.delete("a/../../b").is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
