use extperf_browser::{BrowserDriver, NetworkCapture, with_timeout};
use extperf_core::config::Timeouts;
use extperf_core::network::NetworkSummary;
use extperf_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Records request activity for a fixed window and summarizes it
pub struct NetworkTracker {
    driver: Arc<dyn BrowserDriver>,
    timeouts: Timeouts,
}

impl NetworkTracker {
    pub fn new(driver: Arc<dyn BrowserDriver>, timeouts: Timeouts) -> Self {
        Self { driver, timeouts }
    }

    /// Listen for `duration`, navigating to `test_url` once the listeners are in place.
    /// Requests still open when the window closes count as failed.
    pub async fn track(
        &self,
        extension_id: &str,
        duration: Duration,
        test_url: Option<&str>,
        include_requests: bool,
    ) -> Result<NetworkSummary> {
        if duration.is_zero() {
            return Err(Error::InvalidInput("network window must be greater than 0".to_string()));
        }
        if let Some(url) = test_url {
            Url::parse(url).map_err(|e| Error::InvalidInput(format!("'{}' is not an absolute URL: {}", url, e)))?;
        }

        tracing::debug!("Recording network for {:?} (navigate: {:?})", duration, test_url);
        let events = with_timeout(
            "network recording",
            duration + self.timeouts.network_grace(),
            self.driver.record_network(duration, test_url),
        )
        .await?;

        let mut capture = NetworkCapture::new(extension_id);
        capture.extend(&events);
        tracing::debug!("Folded {} event(s) into {} request(s)", events.len(), capture.count());

        let summary = NetworkSummary::from_records(
            extension_id,
            test_url.map(str::to_string),
            duration.as_millis() as u64,
            capture.finish(),
            include_requests,
        );

        tracing::info!(
            "Tracked {} request(s), {} failed, {} bytes",
            summary.total_requests,
            summary.statistics.failed_requests,
            summary.total_data_transferred
        );
        Ok(summary)
    }
}
