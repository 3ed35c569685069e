//! 履歴の集計

use ewizard_common::ScanLogEntry;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    /// ラベル → 件数
    pub by_label: BTreeMap<String, usize>,
    pub overridden: usize,
    /// 信頼度が記録されている行の平均
    pub mean_confidence: Option<f64>,
}

impl HistoryStats {
    pub fn from_entries(entries: &[ScanLogEntry]) -> Self {
        let mut by_label: BTreeMap<String, usize> = BTreeMap::new();
        for entry in entries {
            *by_label.entry(entry.label.clone()).or_default() += 1;
        }

        let confidences: Vec<f64> = entries.iter().filter_map(|e| e.confidence).collect();
        let mean_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        Self {
            total: entries.len(),
            by_label,
            overridden: entries.iter().filter(|e| e.overridden == Some(true)).count(),
            mean_confidence,
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.by_label.get(label).copied().unwrap_or(0)
    }
}
