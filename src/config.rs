use crate::error::HarnessError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Trajectory shape driven by the motion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    #[default]
    StraightLine,
    Random,
    Circular,
}

impl MovementPattern {
    pub fn label(self) -> &'static str {
        match self {
            MovementPattern::StraightLine => "straight_line",
            MovementPattern::Random => "random",
            MovementPattern::Circular => "circular",
        }
    }
}

/// How the controller moves the actor: through host physics via velocity
/// writes, or by assigning positions directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActuationMode {
    #[default]
    Grounded,
    FreeFlight,
}

impl ActuationMode {
    pub fn label(self) -> &'static str {
        match self {
            ActuationMode::Grounded => "grounded",
            ActuationMode::FreeFlight => "free_flight",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotionConfig {
    #[serde(default)]
    pub pattern: MovementPattern,
    #[serde(default = "MotionConfig::default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub actuation: ActuationMode,
    /// Altitude the actor is lifted to on activation; free-flight only.
    #[serde(default = "MotionConfig::default_fly_height")]
    pub fly_height: f64,
    #[serde(default)]
    pub auto_rotate_camera: bool,
    #[serde(default = "MotionConfig::default_rotation_speed")]
    pub rotation_speed_deg_per_tick: f32,
}

impl MotionConfig {
    const fn default_speed() -> f64 {
        1.0
    }

    const fn default_fly_height() -> f64 {
        120.0
    }

    const fn default_rotation_speed() -> f32 {
        0.5
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pattern: MovementPattern::default(),
            speed: Self::default_speed(),
            actuation: ActuationMode::default(),
            fly_height: Self::default_fly_height(),
            auto_rotate_camera: false,
            rotation_speed_deg_per_tick: Self::default_rotation_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Seconds between samples; clamped to at least one at use.
    #[serde(default = "MetricsConfig::default_sample_interval")]
    pub sample_interval_secs: u64,
    #[serde(default = "MetricsConfig::default_output_directory")]
    pub output_directory: PathBuf,
}

impl MetricsConfig {
    const fn default_sample_interval() -> u64 {
        1
    }

    fn default_output_directory() -> PathBuf {
        PathBuf::from("./perfdata")
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: Self::default_sample_interval(),
            output_directory: Self::default_output_directory(),
        }
    }
}

/// Immutable per-session configuration for the benchmark harness.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Wall-clock bound on the session in seconds; zero means unbounded.
    #[serde(default = "HarnessConfig::default_test_duration")]
    pub test_duration_secs: u64,
}

impl HarnessConfig {
    const fn default_test_duration() -> u64 {
        300
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Loads the document at `path`, falling back to defaults on any failure.
    /// The constructed defaults are persisted back so the next run starts from
    /// an editable file; that write is best-effort.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                let fault =
                    HarnessError::Config { path: path.to_path_buf(), detail: format!("{err:#}") };
                eprintln!("[config] {fault}; falling back to defaults");
                let cfg = Self::default();
                if let Err(save_err) = cfg.save(path) {
                    eprintln!("[config] could not persist defaults to {}: {save_err:?}", path.display());
                }
                cfg
            }
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            metrics: MetricsConfig::default(),
            test_duration_secs: Self::default_test_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let cfg = HarnessConfig::default();
        let json = serde_json::to_string_pretty(&cfg).expect("serialize defaults");
        let parsed: HarnessConfig = serde_json::from_str(&json).expect("parse serialized defaults");
        assert_eq!(parsed.motion.pattern, MovementPattern::StraightLine);
        assert_eq!(parsed.motion.actuation, ActuationMode::Grounded);
        assert_eq!(parsed.metrics.sample_interval_secs, 1);
        assert_eq!(parsed.test_duration_secs, 300);
    }

    #[test]
    fn partial_document_fills_missing_fields() {
        let json = r#"{ "motion": { "pattern": "circular", "speed": 2.5, "actuation": "free_flight" } }"#;
        let cfg: HarnessConfig = serde_json::from_str(json).expect("parse partial config");
        assert_eq!(cfg.motion.pattern, MovementPattern::Circular);
        assert_eq!(cfg.motion.actuation, ActuationMode::FreeFlight);
        assert_eq!(cfg.motion.speed, 2.5);
        assert_eq!(cfg.motion.fly_height, MotionConfig::default_fly_height());
        assert_eq!(cfg.metrics.output_directory, PathBuf::from("./perfdata"));
    }

    #[test]
    fn unknown_pattern_is_a_parse_error() {
        let json = r#"{ "motion": { "pattern": "zigzag" } }"#;
        assert!(serde_json::from_str::<HarnessConfig>(json).is_err());
    }

    #[test]
    fn load_or_default_persists_defaults_on_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bench_config.json");
        let cfg = HarnessConfig::load_or_default(&path);
        assert_eq!(cfg.motion.speed, 1.0);
        assert!(path.exists(), "defaults should be written back");
        let reloaded = HarnessConfig::load(&path).expect("reload persisted defaults");
        assert_eq!(reloaded.test_duration_secs, cfg.test_duration_secs);
    }

    #[test]
    fn pattern_labels_match_wire_names() {
        assert_eq!(MovementPattern::StraightLine.label(), "straight_line");
        assert_eq!(MovementPattern::Random.label(), "random");
        assert_eq!(MovementPattern::Circular.label(), "circular");
        assert_eq!(ActuationMode::FreeFlight.label(), "free_flight");
    }
}
