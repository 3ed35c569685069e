//! 履歴ストアのテスト
//!
//! 追記・読み込み・削除と、壊れたファイルの自己修復を検証

use ewizard::history::{HistoryStore, COLUMNS};
use ewizard_common::{Label, ScanLogEntry};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn entry(timestamp: &str, label: Label, confidence: f64, bin: &str, overridden: bool) -> ScanLogEntry {
    ScanLogEntry::new(timestamp, label, confidence, bin, overridden)
}

/// 存在しないファイルはヘッダのみで作成される
#[test]
fn test_missing_file_is_created() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("data").join("scans.csv");
    let store = HistoryStore::open(&path);

    assert!(store.load_all().unwrap().is_empty());
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim(), COLUMNS.join(","));
}

/// 追記した行が最後に読める
#[test]
fn test_append_round_trip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));

    let first = entry("2026-01-01T10:00:00", Label::Cpu, 0.91, "Components (CPU/RAM)", false);
    let second = entry("2026-01-01T10:05:00", Label::RamStick, 0.123456789, "Components (CPU/RAM)", true);
    store.append(&first).unwrap();
    store.append(&second).unwrap();

    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], first);
    assert_eq!(entries.last().unwrap(), &second);
}

/// 読み込みは何度やっても同じ結果
#[test]
fn test_load_all_is_idempotent() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));
    store
        .append(&entry("2026-01-01T10:00:00", Label::FlashDrive, 0.7, "Storage Media (Flash Drives)", false))
        .unwrap();

    assert_eq!(store.load_all().unwrap(), store.load_all().unwrap());
}

/// 削除後は空
#[test]
fn test_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));
    store
        .append(&entry("2026-01-01T10:00:00", Label::Cpu, 0.9, "Components (CPU/RAM)", false))
        .unwrap();

    store.clear().unwrap();
    assert!(store.load_all().unwrap().is_empty());
}

/// 空ファイルは作り直される
#[test]
fn test_empty_file_is_healed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    std::fs::write(&path, "").unwrap();

    let store = HistoryStore::open(&path);
    assert!(store.load_all().unwrap().is_empty());
    assert!(std::fs::read_to_string(&path).unwrap().starts_with("timestamp,label"));
}

/// 関係ない内容のファイルは作り直される
#[test]
fn test_garbage_file_is_healed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    std::fs::write(&path, "this is not\na scan log\n").unwrap();

    let store = HistoryStore::open(&path);
    assert!(store.load_all().unwrap().is_empty());

    store
        .append(&entry("2026-01-01T10:00:00", Label::Cpu, 0.9, "Components (CPU/RAM)", false))
        .unwrap();
    assert_eq!(store.load_all().unwrap().len(), 1);
}

/// 旧形式（overridden列なし）は欠損値で埋め、追記時に新しいヘッダへ移行する
#[test]
fn test_old_schema_is_backfilled_and_migrated() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    std::fs::write(
        &path,
        "timestamp,label,confidence,bin\n2025-12-01T09:00:00,cpu,0.8,Components (CPU/RAM)\n",
    )
    .unwrap();

    let store = HistoryStore::open(&path);
    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].overridden, None);
    assert_eq!(entries[0].confidence, Some(0.8));

    let new_entry = entry("2026-01-01T10:00:00", Label::RamStick, 0.3, "Components (CPU/RAM)", true);
    store.append(&new_entry).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("timestamp,label,confidence,bin,overridden"));
    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].overridden, None);
    assert_eq!(entries[1], new_entry);
}

/// カンマや引用符を含む値も壊れない
#[test]
fn test_values_with_commas_are_quoted() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));
    let odd = ScanLogEntry {
        timestamp: "2026-01-01T10:00:00".into(),
        label: "unknown".into(),
        confidence: Some(0.0),
        bin: "Bin, with \"quotes\"".into(),
        overridden: Some(false),
    };

    store.append(&odd).unwrap();
    assert_eq!(store.load_all().unwrap(), vec![odd]);
}

/// 新しい順に取得
#[test]
fn test_recent_sorted_descending() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));
    for ts in ["2026-01-02T00:00:00", "2026-01-03T00:00:00", "2026-01-01T00:00:00"] {
        store
            .append(&entry(ts, Label::Cpu, 0.9, "Components (CPU/RAM)", false))
            .unwrap();
    }

    let recent = store.recent(2).unwrap();
    let stamps: Vec<&str> = recent.iter().map(|e| e.timestamp.as_str()).collect();
    assert_eq!(stamps, vec!["2026-01-03T00:00:00", "2026-01-02T00:00:00"]);

    // 挿入順は変わらない
    assert_eq!(store.load_all().unwrap()[0].timestamp, "2026-01-02T00:00:00");
}

/// 集計
#[test]
fn test_stats() {
    let dir = tempdir().expect("Failed to create temp dir");
    let store = HistoryStore::open(dir.path().join("scans.csv"));
    store.append(&entry("t1", Label::Cpu, 0.9, "Components (CPU/RAM)", false)).unwrap();
    store.append(&entry("t2", Label::Unknown, 0.1, "Unknown / Manual Review", false)).unwrap();
    store.append(&entry("t3", Label::RamStick, 0.2, "Components (CPU/RAM)", true)).unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.count("cpu"), 1);
    assert_eq!(stats.count("unknown"), 1);
    assert_eq!(stats.overridden, 1);
}

/// 複数スレッドから同時に追記しても欠落・破損しない
#[test]
fn test_concurrent_appends() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = Arc::new(dir.path().join("scans.csv"));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                // セッションごとに別インスタンス
                let store = HistoryStore::open(path.as_path());
                for i in 0..10 {
                    let ts = format!("2026-01-01T{:02}:{:02}:00", worker, i);
                    store
                        .append(&entry(&ts, Label::FlashDrive, 0.5, "Storage Media (Flash Drives)", false))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let entries = HistoryStore::open(path.as_path()).load_all().unwrap();
    assert_eq!(entries.len(), 80);
    assert!(entries.iter().all(|e| e.label == "flash_drive"
        && e.bin == "Storage Media (Flash Drives)"
        && e.confidence == Some(0.5)
        && e.overridden == Some(false)));
}

/// 知らない列と読めない行は追記後も残る
#[test]
fn test_append_preserves_extra_columns_and_undecodable_rows() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    let mut original = b"timestamp,label,confidence,bin,overridden,operator\n".to_vec();
    original.extend_from_slice(b"2026-01-01T09:00:00,cpu,0.9,Components (CPU/RAM),false,alice\n");
    original.extend_from_slice(b"2026-01-01T09:01:00,flash_drive,0.8,B\xff,false,bob\n");
    std::fs::write(&path, &original).unwrap();

    let store = HistoryStore::open(&path);
    assert_eq!(store.load_all().unwrap().len(), 2);

    let new_entry = entry("2026-01-01T10:00:00", Label::RamStick, 0.7, "Components (CPU/RAM)", false);
    store.append(&new_entry).unwrap();

    let after = std::fs::read(&path).unwrap();
    assert!(after.starts_with(&original));
    assert!(after.ends_with(b"2026-01-01T10:00:00,ram_stick,0.7,Components (CPU/RAM),false,\n"));

    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].label, "flash_drive");
    assert_eq!(entries[2], new_entry);
}

/// 解釈できないセルも書き換えない
#[test]
fn test_append_keeps_unparseable_cells() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    std::fs::write(
        &path,
        "timestamp,label,confidence,bin,overridden\n2026-01-01T09:00:00,cpu,abc,Components (CPU/RAM),maybe\n",
    )
    .unwrap();

    let store = HistoryStore::open(&path);
    let entries = store.load_all().unwrap();
    assert_eq!(entries[0].confidence, None);
    assert_eq!(entries[0].overridden, None);

    store
        .append(&entry("2026-01-01T10:00:00", Label::Cpu, 0.9, "Components (CPU/RAM)", false))
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("2026-01-01T09:00:00,cpu,abc,Components (CPU/RAM),maybe\n"));
    assert_eq!(store.load_all().unwrap().len(), 2);
}

/// 旧形式の移行でも知らない列の値は残る
#[test]
fn test_old_schema_migration_keeps_extra_columns() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scans.csv");
    std::fs::write(&path, "timestamp,label,operator\n2025-12-01T09:00:00,cpu,alice\n").unwrap();

    let store = HistoryStore::open(&path);
    store
        .append(&entry("2026-01-01T10:00:00", Label::FlashDrive, 0.6, "Storage Media (Flash Drives)", false))
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("timestamp,label,operator,confidence,bin,overridden"));
    assert_eq!(lines.next(), Some("2025-12-01T09:00:00,cpu,alice,,,"));

    let entries = store.load_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].confidence, None);
    assert_eq!(entries[1].bin, "Storage Media (Flash Drives)");
}
