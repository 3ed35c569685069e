//! 検出候補の選択ルール

use crate::types::DetectionRecord;

/// 信頼度が最大の候補を選ぶ
///
/// 同点の場合は先に現れた候補を採用する。空なら `None`。
pub fn select_top(detections: &[DetectionRecord]) -> Option<&DetectionRecord> {
    let mut best: Option<&DetectionRecord> = None;
    for detection in detections {
        match best {
            Some(current) if detection.confidence <= current.confidence => {}
            _ => best = Some(detection),
        }
    }
    best
}
