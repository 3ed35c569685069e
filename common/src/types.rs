//! スキャン関連の型定義
//!
//! - Label: システムが扱う品目ラベル
//! - DetectionRecord: 検出器が返す候補1件
//! - ScanLogEntry: 履歴ファイルの1行
//! - OverrideAction: 低信頼度時に提示する手動分類の選択肢

use serde::{Deserialize, Serialize};
use std::fmt;

/// 品目ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Cpu,
    RamStick,
    FlashDrive,
    Unknown,
}

impl Label {
    /// `unknown` 以外のラベル（オーバーライド選択肢の表示順）
    pub const KNOWN: [Label; 3] = [Label::Cpu, Label::RamStick, Label::FlashDrive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Cpu => "cpu",
            Label::RamStick => "ram_stick",
            Label::FlashDrive => "flash_drive",
            Label::Unknown => "unknown",
        }
    }

    /// 表示名
    pub fn display_name(&self) -> &'static str {
        match self {
            Label::Cpu => "CPU",
            Label::RamStick => "RAM",
            Label::FlashDrive => "Flash Drive",
            Label::Unknown => "Unknown",
        }
    }

    /// ラベル文字列から変換（該当なしは `Unknown`）
    pub fn from_label(s: &str) -> Label {
        match s.trim() {
            "cpu" => Label::Cpu,
            "ram_stick" => Label::RamStick,
            "flash_drive" => Label::FlashDrive,
            _ => Label::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Label::Unknown)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CLI引数用の厳密なパース（別名も受け付ける）
impl std::str::FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Label::Cpu),
            "ram" | "ram_stick" => Ok(Label::RamStick),
            "flash" | "usb" | "flash_drive" | "usb_drive" => Ok(Label::FlashDrive),
            "unknown" => Ok(Label::Unknown),
            _ => Err(format!(
                "Unknown label: {}. Use cpu, ram_stick, flash_drive or unknown",
                s
            )),
        }
    }
}

/// 検出候補1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// 検出器側のクラス名
    pub class_name: String,
    /// 正規化後のラベル
    pub mapped_label: Label,
    /// 信頼度 (0.0-1.0)
    pub confidence: f64,
}

impl DetectionRecord {
    pub fn new(class_name: impl Into<String>, mapped_label: Label, confidence: f64) -> Self {
        Self {
            class_name: class_name.into(),
            mapped_label,
            confidence,
        }
    }
}

/// 履歴1行
///
/// 読み込み時に列が欠けていた場合、文字列は空文字、
/// 数値・真偽値は `None` で埋める。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    /// ISO-8601（秒精度）
    pub timestamp: String,
    pub label: String,
    pub confidence: Option<f64>,
    pub bin: String,
    pub overridden: Option<bool>,
}

impl ScanLogEntry {
    pub fn new(
        timestamp: impl Into<String>,
        label: Label,
        confidence: f64,
        bin: impl Into<String>,
        overridden: bool,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            label: label.as_str().to_string(),
            confidence: Some(confidence),
            bin: bin.into(),
            overridden: Some(overridden),
        }
    }
}

/// 手動分類の選択肢
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideAction {
    pub label: Label,
    pub title: &'static str,
}

/// 低信頼度時に提示する選択肢（既知ラベルごとに1つ）
pub const OVERRIDE_ACTIONS: [OverrideAction; 3] = [
    OverrideAction { label: Label::Cpu, title: "Mark as CPU" },
    OverrideAction { label: Label::RamStick, title: "Mark as RAM" },
    OverrideAction { label: Label::FlashDrive, title: "Mark as Flash Drive" },
];
