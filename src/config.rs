// src/config.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drivers::{StimulationParams, BAUD_RATE};

pub const CONFIG_FILE: &str = "nmes_force.json";
pub const CONFIG_ENV: &str = "NMES_FORCE_CONFIG";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub baud_rate: u32,
    pub tick_interval_ms: u64,
    /// Samples kept on the scrolling plot.
    pub plot_length: usize,
    pub default_port: String,
    pub log_dir: PathBuf,
    /// Resampled points per averaged cycle.
    pub profile_points: usize,
    /// Multiplier applied to logged force when building a profile (kgf -> N).
    pub force_scale: f64,
    pub simulation: SimulationConfig,
    pub voluntary: VoluntaryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            tick_interval_ms: 20,
            plot_length: 100,
            default_port: String::new(),
            log_dir: PathBuf::from("."),
            profile_points: 200,
            force_scale: 9.81,
            simulation: SimulationConfig::default(),
            voluntary: VoluntaryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub trigger_interval_secs: f64,
    pub frequency: f64,
    pub on_time: f64,
    pub off_time: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            amplitude: 5.0,
            frequency_hz: 1.0,
            trigger_interval_secs: 3.0,
            frequency: 35.0,
            on_time: 2.0,
            off_time: 3.0,
        }
    }
}

impl SimulationConfig {
    pub fn status(&self) -> StimulationParams {
        StimulationParams::new(self.frequency, self.on_time, self.off_time)
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_secs_f64(self.trigger_interval_secs.max(0.0))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoluntaryConfig {
    pub default_amplitude: f64,
    pub target_length: usize,
}

impl Default for VoluntaryConfig {
    fn default() -> Self {
        Self {
            default_amplitude: 0.5,
            target_length: 100,
        }
    }
}

impl AppConfig {
    /// `$NMES_FORCE_CONFIG`, else `nmes_force.json` in the working directory,
    /// else built-in defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn auto_log_name(&self, now: DateTime<Local>) -> PathBuf {
        self.log_dir
            .join(format!("Log_{}.txt", now.format("%Y-%m-%d_%H.%M.%S")))
    }
}
