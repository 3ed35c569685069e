//! 物体検出アダプタ
//!
//! 検出モデル本体は外部プロセス。ここでは出力を `DetectionRecord` 列へ正規化するだけで、
//! ユーザー向けの信頼度閾値は適用しない（パイプライン側の責務）。

mod command;

pub use command::{parse_detector_output, CommandDetector, RawDetection};

use crate::config::DetectorConfig;
use crate::error::Result;
use ewizard_common::{label_for_class, DetectionRecord};
use image::DynamicImage;
use std::sync::{Arc, OnceLock};

/// 検出結果
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// 検出器の出力順
    pub detections: Vec<DetectionRecord>,
    /// 検出枠を描画した画像（検出器が生成した場合のみ）
    pub annotated_image: Option<DynamicImage>,
}

pub trait Detector {
    /// 画像1枚を検出にかける
    ///
    /// 何も見つからない場合は空の列を返し、エラーにはしない。
    fn detect(&self, image: &DynamicImage) -> Result<Detection>;
}

impl<T: Detector + ?Sized> Detector for Arc<T> {
    fn detect(&self, image: &DynamicImage) -> Result<Detection> {
        (**self).detect(image)
    }
}

impl<T: Detector + ?Sized> Detector for &T {
    fn detect(&self, image: &DynamicImage) -> Result<Detection> {
        (**self).detect(image)
    }
}

/// 生の検出をラベルへ正規化する
///
/// 信頼度は0.0〜1.0に丸め、`floor` 未満は捨てる。順序は保持する。
pub fn normalize(raw: Vec<RawDetection>, floor: f64) -> Vec<DetectionRecord> {
    raw.into_iter()
        .filter(|d| d.confidence.is_finite())
        .map(|d| {
            let confidence = d.confidence.clamp(0.0, 1.0);
            let label = label_for_class(&d.class_name);
            DetectionRecord::new(d.class_name, label, confidence)
        })
        .filter(|d| d.confidence >= floor)
        .collect()
}

static SHARED: OnceLock<Arc<CommandDetector>> = OnceLock::new();

/// プロセス共有の検出器を取得
///
/// 最初の呼び出しの設定で一度だけ初期化され、以降は同じハンドルを返す。
pub fn shared(config: &DetectorConfig) -> Result<Arc<CommandDetector>> {
    if let Some(detector) = SHARED.get() {
        return Ok(Arc::clone(detector));
    }

    let detector = CommandDetector::from_config(config)?;
    Ok(Arc::clone(SHARED.get_or_init(|| Arc::new(detector))))
}
