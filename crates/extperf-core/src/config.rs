use crate::analysis::ScoringPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Upper bounds for every externally awaited operation, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub evaluation_ms: u64,
    pub detection_ms: u64,
    /// Pause after navigating to the neutral baseline page
    pub settle_ms: u64,
    /// Length of the baseline sample
    pub sample_window_ms: u64,
    pub idle_cap_ms: u64,
    pub idle_poll_ms: u64,
    /// Extra time a network recording may take beyond its window
    pub network_grace_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            evaluation_ms: 5_000,
            detection_ms: 2_000,
            settle_ms: 500,
            sample_window_ms: 1_000,
            idle_cap_ms: 10_000,
            idle_poll_ms: 250,
            network_grace_ms: 2_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn evaluation(&self) -> Duration {
        Duration::from_millis(self.evaluation_ms)
    }

    pub fn detection(&self) -> Duration {
        Duration::from_millis(self.detection_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_window_ms)
    }

    pub fn idle_cap(&self) -> Duration {
        Duration::from_millis(self.idle_cap_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn network_grace(&self) -> Duration {
        Duration::from_millis(self.network_grace_ms)
    }

    fn validate(&self) -> Result<()> {
        let bounded = [
            ("navigationMs", self.navigation_ms),
            ("evaluationMs", self.evaluation_ms),
            ("detectionMs", self.detection_ms),
            ("idlePollMs", self.idle_poll_ms),
        ];
        for (name, value) in bounded {
            if value == 0 {
                return Err(Error::InvalidInput(format!("timeouts.{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}

/// Contents of the optional JSON config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtperfConfig {
    pub timeouts: Timeouts,
    pub scoring: ScoringPolicy,
    /// Pages measured by `impact` when none are given on the command line
    pub test_pages: Vec<String>,
}

impl ExtperfConfig {
    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        self.scoring.validate()?;

        for page in &self.test_pages {
            Url::parse(page)
                .map_err(|e| Error::InvalidInput(format!("invalid test page '{}': {}", page, e)))?;
        }

        Ok(())
    }
}

pub struct ConfigReader;

impl ConfigReader {
    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<ExtperfConfig> {
        tracing::debug!("Reading config file: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_str(&content)?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<ExtperfConfig> {
        let config: ExtperfConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `path` when it exists, otherwise fall back to the defaults
    pub fn load_or_default(path: &Path) -> Result<ExtperfConfig> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(ExtperfConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = ConfigReader::from_str("{}").unwrap();
        assert_eq!(config, ExtperfConfig::default());
        assert_eq!(config.timeouts.detection(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_override() {
        let config = ConfigReader::from_str(
            r#"{
                "timeouts": { "navigationMs": 5000 },
                "scoring": { "cpu": { "weight": 0.5, "cap": 25.0, "trigger": 5.0 } },
                "testPages": ["https://example.com"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.timeouts.navigation_ms, 5000);
        assert_eq!(config.timeouts.evaluation_ms, Timeouts::default().evaluation_ms);
        assert_eq!(config.scoring.cpu.cap, 25.0);
        assert_eq!(config.scoring.memory, ScoringPolicy::default().memory);
        assert_eq!(config.test_pages, vec!["https://example.com"]);
    }

    #[test]
    fn test_rejects_relative_test_page() {
        let err = ConfigReader::from_str(r#"{ "testPages": ["/relative"] }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_zero_detection_timeout() {
        let err = ConfigReader::from_str(r#"{ "timeouts": { "detectionMs": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("detectionMs"));
    }

    #[test]
    fn test_rejects_descending_levels() {
        let err = ConfigReader::from_str(
            r#"{ "scoring": { "levels": { "low": 40, "moderate": 30, "high": 55, "severe": 80 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{ "timeouts": {{ "settleMs": 100 }} }}"#).unwrap();

        let config = ConfigReader::from_file(&path).unwrap();
        assert_eq!(config.timeouts.settle_ms, 100);

        let missing = dir.path().join("nope.json");
        assert_eq!(ConfigReader::load_or_default(&missing).unwrap(), ExtperfConfig::default());
        assert!(ConfigReader::from_file(&missing).is_err());
    }
}
