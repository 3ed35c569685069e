//! スキャン履歴ストア
//!
//! `timestamp,label,confidence,bin,overridden` のCSV（ヘッダ行あり）に追記する。
//!
//! - 既存の行・列はバイト単位でそのまま残す（知らない列や読めない行も消さない）
//! - 書き込みは一時ファイルに書いてから rename で置き換え、ディレクトリまで fsync する
//! - 同じパスへの書き込みはプロセス内でロックして直列化する
//! - 旧形式（列が足りない）ファイルは追記時に不足列を末尾に足して移行する
//! - ファイルが無い・空・既知の列が1つも無い場合は空の履歴として作り直す
//! - 読み込み時に欠けている値は空文字 / `None` で埋める

mod stats;

pub use stats::HistoryStats;

use crate::error::{Result, SorterError};
use csv::{ByteRecord, Reader, ReaderBuilder, Writer};
use ewizard_common::ScanLogEntry;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// 列順
pub const COLUMNS: [&str; 5] = ["timestamp", "label", "confidence", "bin", "overridden"];

/// 既知の列ごとのファイル上の位置
type Positions = [Option<usize>; 5];

lazy_static! {
    static ref WRITE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut locks = WRITE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = lock_for(&path);
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1件追記（ディスクへの反映まで返らない）
    pub fn append(&self, entry: &ScanLogEntry) -> Result<()> {
        let _guard = self.guard();

        let existing = match fs::read(&self.path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let contents = match existing.as_deref() {
            Some(bytes) => match header_of(bytes) {
                Some(header) if has_all_columns(&header) => append_row(bytes, &header, entry)?,
                Some(header) => {
                    debug!(path = %self.path.display(), "旧形式の履歴を移行");
                    migrate(bytes, &header, entry)?
                }
                None => {
                    warn!(path = %self.path.display(), "履歴ファイルが空または不正なため再初期化します");
                    fresh(Some(entry))?
                }
            },
            None => fresh(Some(entry))?,
        };

        self.write_bytes(&contents)?;
        debug!(path = %self.path.display(), "履歴に追記");
        Ok(())
    }

    /// 全件を挿入順で取得
    pub fn load_all(&self) -> Result<Vec<ScanLogEntry>> {
        let _guard = self.guard();
        self.read_or_heal()
    }

    /// 履歴を空にする
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        self.write_bytes(&fresh(None)?)
    }

    /// 新しい順に最大 `limit` 件
    pub fn recent(&self, limit: usize) -> Result<Vec<ScanLogEntry>> {
        let mut entries = self.load_all()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn stats(&self) -> Result<HistoryStats> {
        Ok(HistoryStats::from_entries(&self.load_all()?))
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_or_heal(&self) -> Result<Vec<ScanLogEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "履歴ファイルを新規作成");
                self.write_bytes(&fresh(None)?)?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match parse_history(&bytes) {
            Some(entries) => Ok(entries),
            None => {
                warn!(path = %self.path.display(), "履歴ファイルが空または不正なため再初期化します");
                self.write_bytes(&fresh(None)?)?;
                Ok(Vec::new())
            }
        }
    }

    fn write_bytes(&self, contents: &[u8]) -> Result<()> {
        use std::io::Write;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| SorterError::History(format!("{}: {}", self.path.display(), e.error)))?;

        // rename を永続化
        #[cfg(unix)]
        fs::File::open(&dir)?.sync_all()?;
        Ok(())
    }
}

fn reader(bytes: &[u8]) -> Reader<&[u8]> {
    ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes)
}

/// 既知の列を1つ以上含むヘッダ。無ければ `None`
fn header_of(bytes: &[u8]) -> Option<ByteRecord> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let header = reader(bytes).byte_headers().ok()?.clone();
    if positions(&header).iter().all(Option::is_none) {
        return None;
    }
    Some(header)
}

fn positions(header: &ByteRecord) -> Positions {
    COLUMNS.map(|column| {
        header
            .iter()
            .position(|h| String::from_utf8_lossy(h).trim() == column)
    })
}

fn has_all_columns(header: &ByteRecord) -> bool {
    positions(header).iter().all(Option::is_some)
}

/// ヘッダの列順に合わせた1行（知らない列は空）
fn row_for(header: &ByteRecord, entry: &ScanLogEntry) -> Vec<String> {
    let values = to_record(entry);
    let positions = positions(header);
    (0..header.len())
        .map(|j| {
            positions
                .iter()
                .position(|p| *p == Some(j))
                .map(|i| values[i].clone())
                .unwrap_or_default()
        })
        .collect()
}

fn finish(writer: Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| SorterError::History(e.to_string()))
}

/// ヘッダのみ（＋任意で1行）の新しい内容
fn fresh(entry: Option<&ScanLogEntry>) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    if let Some(entry) = entry {
        writer.write_record(to_record(entry))?;
    }
    finish(writer)
}

/// 既存の内容はそのままに1行足す
fn append_row(bytes: &[u8], header: &ByteRecord, entry: &ScanLogEntry) -> Result<Vec<u8>> {
    let mut out = bytes.to_vec();
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    let mut writer = Writer::from_writer(out);
    writer.write_record(row_for(header, entry))?;
    finish(writer)
}

/// 不足列をヘッダ末尾に足して全行を書き直し、1行足す
///
/// 既存のセルはバイト列のまま移す。元のヘッダより長い行は位置がずれるのでそのまま残す。
fn migrate(bytes: &[u8], header: &ByteRecord, entry: &ScanLogEntry) -> Result<Vec<u8>> {
    let original_len = header.len();
    let mut new_header = header.clone();
    for (column, position) in COLUMNS.iter().zip(positions(header)) {
        if position.is_none() {
            new_header.push_field(column.as_bytes());
        }
    }

    let mut writer = Writer::from_writer(Vec::new());
    writer.write_byte_record(&new_header)?;

    let mut reader = reader(bytes);
    for record in reader.byte_records() {
        let mut record = record?;
        if record.len() <= original_len {
            while record.len() < new_header.len() {
                record.push_field(b"");
            }
        } else {
            warn!(fields = record.len(), "ヘッダより長い履歴行をそのまま移行");
        }
        writer.write_byte_record(&record)?;
    }

    writer.write_record(row_for(&new_header, entry))?;
    finish(writer)
}

fn to_record(entry: &ScanLogEntry) -> [String; 5] {
    [
        entry.timestamp.clone(),
        entry.label.clone(),
        entry.confidence.map(|c| c.to_string()).unwrap_or_default(),
        entry.bin.clone(),
        entry.overridden.map(|o| o.to_string()).unwrap_or_default(),
    ]
}

/// CSVを読み込む。作り直すべき状態なら `None`
///
/// UTF-8でないセルは置換文字で読む（ファイルには手を加えない）。
fn parse_history(bytes: &[u8]) -> Option<Vec<ScanLogEntry>> {
    let header = header_of(bytes)?;
    let positions = positions(&header);

    let mut entries = Vec::new();
    let mut reader = reader(bytes);
    for (row, record) in reader.byte_records().enumerate() {
        match record {
            Ok(record) => entries.push(from_record(&record, &positions)),
            Err(e) => warn!(row = row + 1, error = %e, "読み込めない履歴行をスキップ"),
        }
    }
    Some(entries)
}

fn from_record(record: &ByteRecord, positions: &Positions) -> ScanLogEntry {
    let field = |i: usize| {
        positions[i]
            .and_then(|p| record.get(p))
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default()
    };

    ScanLogEntry {
        timestamp: field(0),
        label: field(1),
        confidence: field(2).trim().parse::<f64>().ok(),
        bin: field(3),
        overridden: parse_bool(&field(4)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ScanLogEntry {
        ScanLogEntry {
            timestamp: "2026-01-03T08:00:00".into(),
            label: "cpu".into(),
            confidence: Some(0.9),
            bin: "Components (CPU/RAM)".into(),
            overridden: Some(false),
        }
    }

    #[test]
    fn test_parse_history_empty_is_invalid() {
        assert!(parse_history(b"").is_none());
        assert!(parse_history(b"  \n").is_none());
    }

    #[test]
    fn test_parse_history_header_only() {
        let entries = parse_history(b"timestamp,label,confidence,bin,overridden\n").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_history_unrelated_header_is_invalid() {
        assert!(parse_history(b"foo,bar\n1,2\n").is_none());
    }

    #[test]
    fn test_parse_history_old_schema_backfills() {
        let csv = b"timestamp,label,confidence,bin\n2026-01-01T10:00:00,cpu,0.9,Components (CPU/RAM)\n";
        let entries = parse_history(csv).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "cpu");
        assert_eq!(entries[0].confidence, Some(0.9));
        assert_eq!(entries[0].overridden, None);
    }

    #[test]
    fn test_parse_history_reordered_and_short_rows() {
        let csv = b"label,timestamp,extra\nram_stick,2026-01-02T09:00:00,x\nflash_drive\n";
        let entries = parse_history(csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "2026-01-02T09:00:00");
        assert_eq!(entries[0].bin, "");
        assert_eq!(entries[1].label, "flash_drive");
        assert_eq!(entries[1].timestamp, "");
    }

    #[test]
    fn test_parse_history_keeps_non_utf8_rows() {
        let csv = b"timestamp,label,confidence,bin,overridden\nt1,cpu,0.9,B\xff,false\n";
        let entries = parse_history(csv).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bin, "B\u{fffd}");
    }

    #[test]
    fn test_append_row_follows_file_column_order() {
        let bytes = b"bin,operator,timestamp,overridden,label,confidence\nX,alice,t0,true,cpu,0.5";
        let header = header_of(bytes).unwrap();
        let out = append_row(bytes, &header, &entry()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "bin,operator,timestamp,overridden,label,confidence\nX,alice,t0,true,cpu,0.5\n\
             Components (CPU/RAM),,2026-01-03T08:00:00,false,cpu,0.9\n"
        );
    }

    #[test]
    fn test_migrate_adds_missing_columns_at_end() {
        let bytes = b"timestamp,label,note\nt0,ram_stick,keep me\n";
        let header = header_of(bytes).unwrap();
        let out = migrate(bytes, &header, &entry()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "timestamp,label,note,confidence,bin,overridden\n\
             t0,ram_stick,keep me,,,\n\
             2026-01-03T08:00:00,cpu,,0.9,Components (CPU/RAM),false\n"
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_to_record_absent_values() {
        let entry = ScanLogEntry {
            timestamp: "t".into(),
            label: "unknown".into(),
            confidence: None,
            bin: "b".into(),
            overridden: None,
        };
        assert_eq!(to_record(&entry), ["t", "unknown", "", "b", ""].map(String::from));
    }
}
