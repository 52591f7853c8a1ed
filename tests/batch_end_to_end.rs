use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::json;

use timeline_media::batch::BatchPolicy;
use timeline_media::commands;
use timeline_media::db::{self, EntryKind, NewEntry};
use timeline_media::image_handler::{ImageOptimizationSettings, ImageOptimizer, RawImage};
use timeline_media::storage::{FsObjectStore, MemoryObjectStore, ObjectStore};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("{}_{}", prefix, nanos));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// 不可压缩的噪点 PNG，确保重新编码后体积一定下降。
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    let image = RgbaImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [a, b, c, d] = state.to_le_bytes();
        Rgba([a, b, c, d | 0x80])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

fn small_optimizer() -> ImageOptimizer {
    ImageOptimizer::new(ImageOptimizationSettings::new(64, 64, 85)).expect("valid settings")
}

fn photo_entry(conn: &rusqlite::Connection, image: &str) -> i64 {
    db::insert_entry(
        conn,
        &NewEntry {
            kind: EntryKind::Photo,
            timestamp: 1_700_000_000_000,
            data: json!({ "caption": "beach" }),
            image: Some(image.to_string()),
        },
    )
    .expect("insert entry")
}

#[test]
fn batch_replaces_png_and_updates_catalog() {
    let dir = unique_temp_dir("timeline_media_batch");
    let mut store = FsObjectStore::open(dir.join("media")).expect("open store");
    let original_path = store
        .put("uploads/2024/01/02/beach.png", &noisy_png(300, 200))
        .expect("seed image");

    let conn = db::open_in_memory().expect("open db");
    let id = photo_entry(&conn, &original_path);
    db::insert_entry(
        &conn,
        &NewEntry {
            kind: EntryKind::Text,
            timestamp: 1_700_000_000_001,
            data: json!({ "text": "no image here" }),
            image: None,
        },
    )
    .expect("insert text entry");

    let optimizer = small_optimizer();
    let policy = BatchPolicy {
        min_size_kb: 0,
        ..BatchPolicy::default()
    };
    let mut out = Vec::new();
    let report = commands::optimize_images_with(&conn, &mut store, &optimizer, &policy, &mut out)
        .expect("run batch");

    assert_eq!(report.total(), 1);
    assert_eq!(report.optimized, 1);
    assert!(report.total_saved_bytes > 0);

    let entry = db::get_entry(&conn, id).expect("query").expect("entry exists");
    let new_path = entry.image.expect("image path");
    assert_eq!(new_path, "uploads/2024/01/02/beach.jpg");
    assert!(store.exists(&new_path));
    assert!(!store.exists(&original_path));

    let stored = store.get(&new_path).expect("read optimized");
    let inspection = optimizer.inspect(&stored).expect("inspect");
    assert_eq!((inspection.width, inspection.height), (64, 43));

    let text = String::from_utf8(out).expect("utf8 output");
    assert!(text.contains("Found 1 entries with images"));
    assert!(text.contains(&format!("Optimized Entry {}", id)));

    // 第二轮：已是优化后的 JPEG，安静跳过
    let mut out = Vec::new();
    let second = commands::optimize_images_with(&conn, &mut store, &optimizer, &policy, &mut out)
        .expect("second run");
    assert_eq!(second.optimized, 0);
    assert_eq!(second.skipped, 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn dry_run_leaves_storage_and_catalog_untouched() {
    let mut store = MemoryObjectStore::new();
    store.insert("uploads/a.png", noisy_png(200, 200));

    let conn = db::open_in_memory().expect("open db");
    let id = photo_entry(&conn, "uploads/a.png");

    let policy = BatchPolicy {
        dry_run: true,
        min_size_kb: 0,
        ..BatchPolicy::default()
    };
    let mut out = Vec::new();
    let report = commands::optimize_images_with(&conn, &mut store, &small_optimizer(), &policy, &mut out)
        .expect("dry run");

    assert!(report.dry_run);
    assert_eq!(report.optimized, 1);
    assert_eq!(store.paths(), vec!["uploads/a.png".to_string()]);

    let entry = db::get_entry(&conn, id).expect("query").expect("entry exists");
    assert_eq!(entry.image.as_deref(), Some("uploads/a.png"));

    let text = String::from_utf8(out).expect("utf8 output");
    assert!(text.starts_with("DRY RUN"));
    assert!(text.contains("Run without --dry-run"));
}

#[test]
fn empty_catalog_reports_nothing_to_do() {
    let conn = db::open_in_memory().expect("open db");
    let mut store = MemoryObjectStore::new();
    let mut out = Vec::new();

    let report = commands::optimize_images_with(
        &conn,
        &mut store,
        &small_optimizer(),
        &BatchPolicy::default(),
        &mut out,
    )
    .expect("run batch");

    assert_eq!(report.total(), 0);
    let text = String::from_utf8(out).expect("utf8 output");
    assert!(text.contains("No entries with images found."));
}

#[test]
fn add_photo_stores_optimized_upload_under_dated_path() {
    let conn = db::open_in_memory().expect("open db");
    let mut store = MemoryObjectStore::new();
    let now = Local
        .with_ymd_and_hms(2024, 3, 5, 10, 30, 0)
        .single()
        .expect("valid local time");
    let raw = RawImage::new(noisy_png(120, 80), "Beach Day.png");

    let mut out = Vec::new();
    let id = commands::add_photo_with(
        &conn,
        &mut store,
        &small_optimizer(),
        &raw,
        Some("sandcastles".to_string()),
        10 * 1024 * 1024,
        now,
        &mut out,
    )
    .expect("add photo");

    let entry = db::get_entry(&conn, id).expect("query").expect("entry exists");
    assert_eq!(entry.kind, EntryKind::Photo);
    assert_eq!(entry.timestamp, now.timestamp_millis());
    assert_eq!(entry.data["caption"], "sandcastles");
    assert_eq!(entry.image.as_deref(), Some("uploads/2024/03/05/Beach_Day.jpg"));
    assert!(store.exists("uploads/2024/03/05/Beach_Day.jpg"));
}

#[test]
fn add_photo_rejects_non_image_upload() {
    let conn = db::open_in_memory().expect("open db");
    let mut store = MemoryObjectStore::new();
    let raw = RawImage::new(b"just some text".to_vec(), "notes.png");

    let result = commands::add_photo_with(
        &conn,
        &mut store,
        &small_optimizer(),
        &raw,
        None,
        10 * 1024 * 1024,
        Local::now(),
        &mut Vec::<u8>::new(),
    );

    assert!(result.is_err());
    assert!(store.is_empty());
}

#[test]
fn catalog_write_failure_keeps_entry_pointing_at_existing_image() {
    let mut store = MemoryObjectStore::new();
    let original = noisy_png(300, 200);
    store.insert("uploads/a.png", original.clone());

    let conn = db::open_in_memory().expect("open db");
    let id = photo_entry(&conn, "uploads/a.png");
    conn.execute_batch("PRAGMA query_only = ON;")
        .expect("make catalog read-only");

    let policy = BatchPolicy {
        min_size_kb: 0,
        ..BatchPolicy::default()
    };
    let mut out = Vec::new();
    let report = commands::optimize_images_with(&conn, &mut store, &small_optimizer(), &policy, &mut out)
        .expect("run batch");

    assert_eq!(report.optimized, 0);
    assert_eq!(report.failed, 1);

    let entry = db::get_entry(&conn, id).expect("query").expect("entry exists");
    assert_eq!(entry.image.as_deref(), Some("uploads/a.png"));
    assert_eq!(store.paths(), vec!["uploads/a.png".to_string()]);
    assert_eq!(store.get("uploads/a.png").expect("original restored"), original);

    let text = String::from_utf8(out).expect("utf8 output");
    assert!(text.contains(&format!("Entry {}: Error - catalog update failed", id)));
}
