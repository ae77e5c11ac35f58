//! Analysis defaults loaded from TOML.
//!
//! ```toml
//! [detection]
//! t_refractory = 2.0
//! t_min_spike = 0.1
//! threshold = -20.0   # optional, falls back to the record's threshold
//! parallel = true
//!
//! [notch]
//! q = 10.0
//! frequencies = [5.0, 10.0]
//! ```
//!
//! Missing sections and keys take the documented defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::{DetectionParams, ExecutionMode, DEFAULT_T_MIN_SPIKE, DEFAULT_T_REFRACTORY};
use crate::error::{RasterError, Result};
use crate::notch::DEFAULT_Q;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub detection: DetectionConfig,
    pub notch: NotchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Refractory period, in ms.
    pub t_refractory: f64,
    /// Minimum time above threshold, in ms.
    pub t_min_spike: f64,
    /// Detection threshold in mV; unset uses the record's threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Scan rows on the rayon pool.
    pub parallel: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            t_refractory: DEFAULT_T_REFRACTORY,
            t_min_spike: DEFAULT_T_MIN_SPIKE,
            threshold: None,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotchConfig {
    pub q: f64,
    /// Frequencies to remove, in kHz, in application order.
    pub frequencies: Vec<f64>,
}

impl Default for NotchConfig {
    fn default() -> Self {
        Self {
            q: DEFAULT_Q,
            frequencies: Vec::new(),
        }
    }
}

impl DetectionConfig {
    /// Detection parameters over the whole simulation.
    pub fn params(&self) -> DetectionParams {
        DetectionParams {
            threshold: self.threshold,
            t_refractory: self.t_refractory,
            t_min_spike: self.t_min_spike,
            mode: if self.parallel {
                ExecutionMode::Parallel
            } else {
                ExecutionMode::Sequential
            },
            ..DetectionParams::default()
        }
    }
}

impl AnalysisConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !(self.detection.t_refractory >= 0.0) {
            errors.push(format!(
                "detection.t_refractory must be >= 0, got {}",
                self.detection.t_refractory
            ));
        }
        if !(self.detection.t_min_spike >= 0.0) {
            errors.push(format!(
                "detection.t_min_spike must be >= 0, got {}",
                self.detection.t_min_spike
            ));
        }
        if !(self.notch.q > 0.0) {
            errors.push(format!("notch.q must be > 0, got {}", self.notch.q));
        }
        for freq in self.notch.frequencies.iter().filter(|&&f| !(f > 0.0)) {
            errors.push(format!("notch.frequencies must be > 0, got {}", freq));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RasterError::InvalidConfig(errors.join("; ")))
        }
    }
}

/// Loads and validates the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let content = fs::read_to_string(path)?;
    AnalysisConfig::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.detection.params(), DetectionParams::default());
        assert_eq!(config.notch.q, 10.0);
    }

    #[test]
    fn test_partial_sections() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [detection]
            threshold = -20.0
            parallel = true

            [notch]
            frequencies = [5.0, 10.0]
            "#,
        )
        .unwrap();

        let params = config.detection.params();
        assert_eq!(params.threshold, Some(-20.0));
        assert_eq!(params.mode, ExecutionMode::Parallel);
        assert_eq!(params.t_refractory, DEFAULT_T_REFRACTORY);
        assert_eq!(config.notch.frequencies, vec![5.0, 10.0]);
        assert_eq!(config.notch.q, DEFAULT_Q);
    }

    #[test]
    fn test_validation_collects_errors() {
        let err = AnalysisConfig::from_toml_str(
            r#"
            [detection]
            t_min_spike = -1.0
            [notch]
            q = 0.0
            frequencies = [5.0, -2.0]
            "#,
        )
        .unwrap_err();

        let RasterError::InvalidConfig(message) = &err else {
            panic!("expected InvalidConfig, got {:?}", err);
        };
        assert!(message.contains("t_min_spike"));
        assert!(message.contains("notch.q"));
        assert!(message.contains("-2"));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("[detection\nparallel = true"),
            Err(RasterError::Toml(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[detection]\nt_refractory = 1.5").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.detection.t_refractory, 1.5);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(&dir.path().join("absent.toml")),
            Err(RasterError::Io(_))
        ));
    }
}
