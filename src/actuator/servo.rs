//! サーボ1基による仕分け（Linux sysfs PWM）
//!
//! パルス幅 0.5ms〜2.5ms を 0〜180度に線形対応させる。

use super::Sorter;
use crate::config::ActuatorConfig;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const MIN_PULSE_NS: f64 = 500_000.0;
const MAX_PULSE_NS: f64 = 2_500_000.0;

/// 角度（度）をデューティ（ns）へ変換。範囲外は0〜180に丸める
pub fn angle_to_duty_ns(angle: f64) -> u64 {
    let angle = if angle.is_finite() { angle.clamp(0.0, 180.0) } else { 0.0 };
    (MIN_PULSE_NS + (MAX_PULSE_NS - MIN_PULSE_NS) * angle / 180.0).round() as u64
}

#[derive(Debug, Clone)]
pub struct ServoSorter {
    pwm_chip: PathBuf,
    channel: u32,
    period_ns: u64,
    settle: Duration,
    angles: BTreeMap<String, f64>,
}

impl ServoSorter {
    pub fn from_config(config: &ActuatorConfig) -> Self {
        Self {
            pwm_chip: config.pwm_chip.clone(),
            channel: config.channel,
            period_ns: config.period_ns,
            settle: Duration::from_millis(config.settle_millis),
            angles: config.angles.clone(),
        }
    }

    /// 分別先に割り当てられた角度
    pub fn angle_for(&self, bin_category: &str) -> Option<f64> {
        self.angles.get(bin_category).copied()
    }

    fn drive(&self, angle: f64) -> io::Result<()> {
        let pwm = self.pwm_chip.join(format!("pwm{}", self.channel));
        if !pwm.exists() {
            fs::write(self.pwm_chip.join("export"), self.channel.to_string())?;
        }

        fs::write(pwm.join("period"), self.period_ns.to_string())?;
        fs::write(pwm.join("duty_cycle"), angle_to_duty_ns(angle).to_string())?;
        fs::write(pwm.join("enable"), "1")?;

        // サーボの移動待ち
        std::thread::sleep(self.settle);
        Ok(())
    }
}

impl Sorter for ServoSorter {
    fn actuate(&self, bin_category: &str) -> bool {
        let Some(angle) = self.angle_for(bin_category) else {
            warn!(bin = bin_category, "角度が割り当てられていない分別先");
            return false;
        };

        match self.drive(angle) {
            Ok(()) => {
                info!(bin = bin_category, angle, "サーボを移動");
                true
            }
            Err(e) => {
                warn!(bin = bin_category, error = %e, "サーボを動かせません");
                false
            }
        }
    }
}
