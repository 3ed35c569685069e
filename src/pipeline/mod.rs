//! スキャンパイプライン
//!
//! 画像1枚について以下を順に実行する:
//!
//! ```text
//! 検出 → 信頼度判定 → (閾値未満: オーバーライド待ち) → 確定
//!      → ガイダンス → 仕分け(任意) → 履歴追記 → 結果
//! ```
//!
//! スキャンを中断するのは検出の失敗だけ。ガイダンス・仕分け・履歴の失敗は
//! 結果のフィールドに反映して処理を続ける。

mod session;

pub use session::{AbandonHandle, Session};

use crate::actuator::Sorter;
use crate::advisory::{resolve_guidance, Advisor};
use crate::config::validate_threshold;
use crate::detector::{Detection, Detector};
use crate::error::{Result, SorterError};
use crate::history::HistoryStore;
use ewizard_common::{
    bin_for_label, select_top, split_sections, static_guidance, DetectionRecord, GuidanceSection,
    Label, OverrideAction, ScanLogEntry, OVERRIDE_ACTIONS,
};
use image::DynamicImage;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.25;

/// スキャンごとの設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    pub confidence_threshold: f64,
    pub advisory_enabled: bool,
    pub actuation_enabled: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            advisory_enabled: true,
            actuation_enabled: false,
        }
    }
}

/// スキャン結果
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub timestamp: String,
    pub label: Label,
    /// 採用した検出の信頼度（`unknown` に落とした場合も元の値）
    pub confidence: f64,
    pub bin: String,
    pub guidance: String,
    #[serde(skip)]
    pub annotated_image: Option<DynamicImage>,
    pub detections: Vec<DetectionRecord>,
    pub low_confidence: bool,
    pub overridden: bool,
    /// 仕分け結果（試行しなかった場合は `None`）
    pub actuated: Option<bool>,
    /// 履歴に書き込めたか
    pub logged: bool,
    /// 入力画像のSHA-256
    pub image_digest: String,
}

impl ScanResult {
    pub fn log_entry(&self) -> ScanLogEntry {
        ScanLogEntry::new(
            self.timestamp.clone(),
            self.label,
            self.confidence,
            self.bin.clone(),
            self.overridden,
        )
    }

    /// ガイダンスを見出し付きブロックに分割
    pub fn guidance_sections(&self) -> Vec<GuidanceSection> {
        split_sections(&self.guidance)
    }
}

/// 検出済み・未確定のスキャン
#[derive(Debug, Clone)]
pub struct DetectedScan {
    label: Label,
    confidence: f64,
    detections: Vec<DetectionRecord>,
    annotated_image: Option<DynamicImage>,
    low_confidence: bool,
    options: ScanOptions,
    generation: u64,
    image_digest: String,
}

impl DetectedScan {
    pub fn label(&self) -> Label {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn detections(&self) -> &[DetectionRecord] {
        &self.detections
    }

    pub fn low_confidence(&self) -> bool {
        self.low_confidence
    }
}

/// 信頼度判定の結果
#[derive(Debug, Clone)]
pub enum Gate {
    /// ラベル確定済み（閾値以上、または検出なしで `unknown`）
    Resolved(DetectedScan),
    /// 閾値未満。オーバーライド待ち（ラベルは `unknown`）
    AwaitOverride(DetectedScan),
}

impl Gate {
    pub fn is_pending(&self) -> bool {
        matches!(self, Gate::AwaitOverride(_))
    }

    /// 提示できるオーバーライド操作（確定済みなら空）
    pub fn actions(&self) -> &'static [OverrideAction] {
        match self {
            Gate::Resolved(_) => &[],
            Gate::AwaitOverride(_) => &OVERRIDE_ACTIONS,
        }
    }

    pub fn scan(&self) -> &DetectedScan {
        match self {
            Gate::Resolved(scan) | Gate::AwaitOverride(scan) => scan,
        }
    }
}

pub struct Pipeline<D, A, S> {
    detector: D,
    advisor: A,
    sorter: S,
    history: HistoryStore,
}

impl<D: Detector, A: Advisor, S: Sorter> Pipeline<D, A, S> {
    pub fn new(detector: D, advisor: A, sorter: S, history: HistoryStore) -> Self {
        Self {
            detector,
            advisor,
            sorter,
            history,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// 検出と信頼度判定
    ///
    /// 検出器が画像を処理できなかった場合のみエラー（履歴には残らない）。
    pub fn detect(&self, session: &Session, image: &DynamicImage, options: ScanOptions) -> Result<Gate> {
        validate_threshold(options.confidence_threshold)?;
        let generation = session.begin();
        let image_digest = hex::encode(Sha256::digest(image.as_bytes()));

        debug!(digest = %image_digest, "物体検出を開始");
        let Detection {
            detections,
            annotated_image,
        } = self.detector.detect(image).map_err(|e| match e {
            SorterError::Detection(_) => e,
            other => SorterError::Detection(other.to_string()),
        })?;

        let top = select_top(&detections);
        let (label, confidence) = top
            .map(|d| (d.mapped_label, d.confidence))
            .unwrap_or((Label::Unknown, 0.0));
        let top_found = top.is_some();
        // 検出なしは閾値に関係なく低信頼度扱い
        let low_confidence = !top_found || confidence < options.confidence_threshold;

        debug!(
            count = detections.len(),
            label = %label,
            confidence,
            threshold = options.confidence_threshold,
            low_confidence,
            "信頼度判定"
        );

        let scan = DetectedScan {
            label: if low_confidence { Label::Unknown } else { label },
            confidence,
            detections,
            annotated_image,
            low_confidence,
            options,
            generation,
            image_digest,
        };

        // 検出なしはオーバーライドを受け付けず unknown で確定
        Ok(if low_confidence && top_found {
            Gate::AwaitOverride(scan)
        } else {
            Gate::Resolved(scan)
        })
    }

    /// オーバーライドを反映してスキャンを完了させる
    ///
    /// 閾値未満でオーバーライドが無ければ `unknown` のまま確定する。
    pub async fn complete(
        &self,
        session: &mut Session,
        gate: Gate,
        override_label: Option<Label>,
    ) -> ScanResult {
        let pending = gate.is_pending();
        let scan = match gate {
            Gate::Resolved(scan) | Gate::AwaitOverride(scan) => scan,
        };

        let (label, overridden) = match (pending, override_label) {
            (true, Some(choice)) if choice.is_known() => (choice, true),
            (true, _) => {
                debug!("オーバーライドなし、unknown として確定");
                (Label::Unknown, false)
            }
            (false, Some(choice)) => {
                debug!(ignored = %choice, "確定済みのためオーバーライドを無視");
                (scan.label, false)
            }
            (false, None) => (scan.label, false),
        };

        let bin = bin_for_label(label);
        let options = scan.options;

        let guidance = if options.advisory_enabled {
            resolve_guidance(self.advisor.advise(label.as_str()).await, label)
        } else {
            static_guidance(label.as_str()).to_string()
        };

        let actuated = if options.actuation_enabled && !scan.low_confidence {
            if session.is_current(scan.generation) {
                Some(self.sorter.actuate(bin))
            } else {
                warn!("破棄されたスキャンのため仕分けをスキップ");
                None
            }
        } else {
            None
        };

        let mut result = ScanResult {
            timestamp: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            label,
            confidence: scan.confidence,
            bin: bin.to_string(),
            guidance,
            annotated_image: scan.annotated_image,
            detections: scan.detections,
            low_confidence: scan.low_confidence,
            overridden,
            actuated,
            logged: false,
            image_digest: scan.image_digest,
        };

        result.logged = match self.history.append(&result.log_entry()) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "履歴に書き込めません");
                false
            }
        };

        info!(
            label = %result.label,
            confidence = result.confidence,
            bin = %result.bin,
            overridden = result.overridden,
            "スキャン完了"
        );

        session.finish(result.clone());
        result
    }

    /// 検出から履歴追記までを一括実行
    pub async fn scan(
        &self,
        session: &mut Session,
        image: &DynamicImage,
        options: ScanOptions,
        override_label: Option<Label>,
    ) -> Result<ScanResult> {
        let gate = self.detect(session, image, options)?;
        Ok(self.complete(session, gate, override_label).await)
    }
}
