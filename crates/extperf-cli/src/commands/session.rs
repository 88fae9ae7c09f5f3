use anyhow::{Context, Result};
use extperf_browser::{BrowserDriver, CdpDriver, ChromeFinder, ChromeLauncher, ProfileManager};
use extperf_core::config::{ConfigReader, ExtperfConfig};
use extperf_detectors::{DialogManager, PageStateDetector};
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::Arc;

/// How the CLI reaches the browser under test
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub port: u16,
    /// When set, Chrome is launched with this unpacked extension instead of attached to
    pub extension_path: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub headless: bool,
}

/// A driven tab, plus the Chrome process and profile when extperf started them
pub struct Session {
    driver: Arc<CdpDriver>,
    chrome: Option<Child>,
    _profile: Option<ProfileManager>,
}

impl Session {
    pub async fn open(options: &BrowserOptions) -> Result<Self> {
        let Some(extension_path) = &options.extension_path else {
            let driver = CdpDriver::attach(options.port).await.with_context(|| {
                format!(
                    "Could not attach to Chrome on port {}. Start Chrome with \
                     --remote-debugging-port={} or pass --extension-path",
                    options.port, options.port
                )
            })?;
            log_tabs(&driver).await;
            return Ok(Self {
                driver: Arc::new(driver),
                chrome: None,
                _profile: None,
            });
        };

        let chrome_binary = ChromeFinder::new(options.chrome_path.clone()).find()?;
        tracing::info!("Using Chrome at {}", chrome_binary.display());

        let profile = match &options.profile {
            Some(name) => ProfileManager::named(name)?,
            None => ProfileManager::temporary()?,
        };

        let launcher = ChromeLauncher::new(chrome_binary, profile.path().to_path_buf())
            .with_extension(extension_path)
            .with_debugging_port(options.port)
            .headless(options.headless);
        let mut chrome = launcher.launch()?;
        tracing::info!("Launched Chrome (pid {}) with {}", chrome.id(), extension_path.display());

        match CdpDriver::attach(launcher.debugging_port()).await {
            Ok(driver) => {
                log_tabs(&driver).await;
                Ok(Self {
                    driver: Arc::new(driver),
                    chrome: Some(chrome),
                    _profile: Some(profile),
                })
            }
            Err(e) => {
                let _ = chrome.kill();
                Err(e).context("Chrome started but its DevTools endpoint did not answer")
            }
        }
    }

    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        self.driver.clone()
    }

    pub fn page_state_detector(&self, config: &ExtperfConfig) -> PageStateDetector {
        PageStateDetector::new(
            DialogManager::new(self.driver(), config.timeouts.evaluation()),
            config.timeouts.detection(),
        )
    }
}

async fn log_tabs(driver: &CdpDriver) {
    match driver.list_tabs().await {
        Ok(tabs) => {
            for tab in tabs {
                tracing::debug!("Tab {}: {}", tab.target_id, tab.url.as_deref().unwrap_or("(no url)"));
            }
        }
        Err(e) => tracing::debug!("Could not list tabs: {}", e),
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut chrome) = self.chrome.take() {
            tracing::debug!("Stopping Chrome (pid {})", chrome.id());
            let _ = chrome.kill();
            let _ = chrome.wait();
        }
    }
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".extperf").join("config.json"))
}

/// An explicit `--config` must exist; the default location is optional
pub fn load_config(path: Option<&Path>) -> Result<ExtperfConfig> {
    match path {
        Some(path) => ConfigReader::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => match default_config_path() {
            Some(path) => ConfigReader::load_or_default(&path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => Ok(ExtperfConfig::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_config_must_exist() {
        let err = load_config(Some(Path::new("/nonexistent/extperf.json"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/extperf.json"));
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"testPages": ["https://example.com/"]}}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.test_pages, vec!["https://example.com/"]);
        assert_eq!(config.timeouts, extperf_core::config::Timeouts::default());
    }
}
