//! 外部コマンドによる検出
//!
//! 画像を一時PNGに書き出し、検出スクリプトを呼び出して標準出力のJSONを読む。
//!
//! ```text
//! <command...> --weights <weights> --image <input.png> --conf <floor> --annotated <out.png>
//! stdout: {"detections": [{"class_name": "CPU", "confidence": 0.91}, ...]}
//! ```

use super::{normalize, Detection, Detector};
use crate::config::DetectorConfig;
use crate::error::{Result, SorterError};
use ewizard_common::extract_json_object;
use image::DynamicImage;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// 検出スクリプトが返す1件
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "class", alias = "name")]
    pub class_name: String,
    #[serde(alias = "conf", alias = "score")]
    pub confidence: f64,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorOutput {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    weights: PathBuf,
    min_confidence: f64,
}

impl CommandDetector {
    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| SorterError::Config("検出コマンドが設定されていません".into()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            weights: config.weights.clone(),
            min_confidence: config.min_confidence,
        })
    }

    fn run(&self, image: &DynamicImage) -> Result<Detection> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.png");
        let annotated = workdir.path().join("annotated.png");

        image
            .save(&input)
            .map_err(|e| SorterError::ImageLoad(format!("一時画像の書き出しに失敗: {}", e)))?;

        debug!(program = %self.program, "検出コマンドを実行");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--weights")
            .arg(&self.weights)
            .arg("--image")
            .arg(&input)
            .arg("--conf")
            .arg(self.min_confidence.to_string())
            .arg("--annotated")
            .arg(&annotated)
            .output()
            .map_err(|e| {
                SorterError::Detection(format!("検出コマンドを起動できません ({}): {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SorterError::Detection(format!(
                "検出コマンドが失敗しました (code {:?}): {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw = parse_detector_output(&stdout)?;
        let detections = normalize(raw, self.min_confidence);

        let annotated_image = if annotated.exists() {
            match image::open(&annotated) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("検出結果画像を読み込めません: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Detection {
            detections,
            annotated_image,
        })
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Detection> {
        self.run(image)
    }
}

/// 検出スクリプトの標準出力をパース
pub fn parse_detector_output(stdout: &str) -> Result<Vec<RawDetection>> {
    let json_str = extract_json_object(stdout)
        .map_err(|e| SorterError::Detection(format!("検出結果にJSONがありません: {}", e)))?;
    let output: DetectorOutput = serde_json::from_str(json_str)
        .map_err(|e| SorterError::Detection(format!("検出結果 JSONパースエラー: {}", e)))?;
    Ok(output.detections)
}
