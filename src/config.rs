use crate::error::{Result, SorterError};
use ewizard_common::{COMPONENTS_BIN, STORAGE_BIN, UNKNOWN_BIN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const HISTORY_ENV: &str = "EWIZARD_HISTORY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub advisory_endpoint: String,
    pub advisory_timeout_seconds: u64,
    pub location_hint: String,
    pub confidence_threshold: f64,
    pub history_path: PathBuf,
    pub detector: DetectorConfig,
    pub actuator: ActuatorConfig,
}

/// 外部検出コマンドの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 実行コマンド（argv）
    pub command: Vec<String>,
    /// 学習済み重み
    pub weights: PathBuf,
    /// これ未満の検出は捨てる（ユーザー向け閾値とは別）
    pub min_confidence: f64,
}

/// サーボ（sysfs PWM）の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub pwm_chip: PathBuf,
    pub channel: u32,
    pub period_ns: u64,
    pub settle_millis: u64,
    /// 分別先 → サーボ角度（度）
    pub angles: BTreeMap<String, f64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SorterError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("ewizard").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SorterError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    /// 履歴ファイルのパス（環境変数を優先）
    pub fn history_path(&self) -> PathBuf {
        match std::env::var(HISTORY_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self.history_path.clone(),
        }
    }

    /// 閾値の決定（引数指定 > 設定ファイル）
    pub fn threshold(&self, requested: Option<f64>) -> Result<f64> {
        validate_threshold(requested.unwrap_or(self.confidence_threshold))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            advisory_endpoint: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            advisory_timeout_seconds: 30,
            location_hint: "University of Georgia (UGA), Athens, Georgia".into(),
            confidence_threshold: 0.25,
            history_path: PathBuf::from("data").join("scans.csv"),
            detector: DetectorConfig::default(),
            actuator: ActuatorConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".into(), "ml/detect.py".into()],
            weights: PathBuf::from("ml").join("best.pt"),
            min_confidence: 0.05,
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        let angles = BTreeMap::from([
            (COMPONENTS_BIN.to_string(), 180.0),
            (STORAGE_BIN.to_string(), 45.0),
            (UNKNOWN_BIN.to_string(), 90.0),
        ]);

        Self {
            pwm_chip: PathBuf::from("/sys/class/pwm/pwmchip0"),
            channel: 0,
            period_ns: 20_000_000,
            settle_millis: 150,
            angles,
        }
    }
}

/// 信頼度閾値の範囲チェック
pub fn validate_threshold(value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SorterError::Config(format!(
            "信頼度の閾値は0.0〜1.0で指定してください: {}",
            value
        )))
    }
}
