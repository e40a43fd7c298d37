//! Simulation configuration loaded from TOML.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::simulation::types::{MAX_GEOCAST_SOURCES, NodeId};

/// Longest accepted run, one simulated day.
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// One application sending geocasts from `source` toward `target`'s region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeocastConfig {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default = "default_geocast_period_ms")]
    pub period_ms: u64,
    /// Application payload bytes per packet.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
    /// Stop sending after this many ms of simulated time. Runs until the end when unset.
    #[serde(default)]
    pub stop_after_ms: Option<u64>,
}

fn default_geocast_period_ms() -> u64 {
    2000
}

fn default_payload_size() -> usize {
    10
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    /// Simulated run length.
    pub duration_ms: u64,
    /// Virtual clock speed, 100 = real time.
    pub speed_percent: u32,
    pub beacon_period_ms: u64,
    pub beacon_start_ms: u64,
    /// Unit-disk radio range for nodes the scene does not override.
    pub radio_range: f64,
    /// Seeds random scenes and the first-send jitter of every application.
    pub seed: u64,
    pub geocast: Vec<GeocastConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 30_000,
            speed_percent: 1000,
            beacon_period_ms: 1000,
            beacon_start_ms: 0,
            radio_range: 1.5,
            seed: 1,
            geocast: vec![GeocastConfig {
                source: 0,
                target: 0,
                period_ms: default_geocast_period_ms(),
                payload_size: default_payload_size(),
                stop_after_ms: None,
            }],
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path).with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    /// Load `config_path` if it exists, defaults otherwise.
    pub fn load_or_default(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            log::info!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load(config_path)
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    /// Check the configuration against a scene of `node_count` nodes.
    pub fn validate(&self, node_count: usize) -> Result<(), String> {
        if self.duration_ms == 0 {
            return Err("duration-ms must be positive".to_string());
        }
        if self.duration_ms > MAX_DURATION_MS {
            return Err(format!("duration-ms {} exceeds maximum of {}", self.duration_ms, MAX_DURATION_MS));
        }
        if !(1..=10_000).contains(&self.speed_percent) {
            return Err(format!("speed-percent {} outside 1-10000", self.speed_percent));
        }
        if self.beacon_period_ms == 0 {
            return Err("beacon-period-ms must be positive".to_string());
        }
        if !(self.radio_range.is_finite() && self.radio_range > 0.0) {
            return Err(format!("radio-range {} must be positive", self.radio_range));
        }
        if self.geocast.len() > MAX_GEOCAST_SOURCES {
            return Err(format!("{} geocast sources exceed maximum of {}", self.geocast.len(), MAX_GEOCAST_SOURCES));
        }

        let valid_id = |id: NodeId| usize::try_from(id).is_ok_and(|idx| idx < node_count);
        for (idx, geocast) in self.geocast.iter().enumerate() {
            if !valid_id(geocast.source) || !valid_id(geocast.target) {
                return Err(format!(
                    "Geocast {} references node {} -> {} outside the scene (0..{})",
                    idx, geocast.source, geocast.target, node_count
                ));
            }
            if geocast.period_ms == 0 {
                return Err(format!("Geocast {} period-ms must be positive", idx));
            }
        }

        Ok(())
    }
}
