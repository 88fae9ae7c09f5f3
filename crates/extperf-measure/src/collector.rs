use crate::sampler::Sampler;
use extperf_browser::{BrowserDriver, with_timeout};
use extperf_core::config::Timeouts;
use extperf_core::metrics::PerformanceMeasurement;
use extperf_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Durations below this produce deltas dominated by noise
pub const MIN_RELIABLE_DURATION_MS: u64 = 1000;

/// Neutral page used for the baseline sample
pub const BASELINE_URL: &str = "about:blank";

pub const IDLE_PROBE_TAG: &str = "/* extperf:idle-probe */";

const IDLE_PROBE_BODY: &str =
    "({ readyState: document.readyState, resources: performance.getEntriesByType('resource').length })";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdleProbe {
    ready_state: String,
    resources: u64,
}

/// Drives one baseline / load-with-extension / settle cycle
pub struct MetricsCollector {
    driver: Arc<dyn BrowserDriver>,
    sampler: Sampler,
    timeouts: Timeouts,
}

impl MetricsCollector {
    pub fn new(driver: Arc<dyn BrowserDriver>, timeouts: Timeouts) -> Self {
        Self {
            sampler: Sampler::new(driver.clone(), timeouts.evaluation()),
            driver,
            timeouts,
        }
    }

    pub async fn measure(
        &self,
        extension_id: &str,
        test_url: &str,
        duration: Duration,
        wait_for_idle: bool,
    ) -> Result<PerformanceMeasurement> {
        if duration.is_zero() {
            return Err(Error::InvalidInput("measurement duration must be greater than 0".to_string()));
        }
        if duration.as_millis() < MIN_RELIABLE_DURATION_MS as u128 {
            tracing::warn!(
                "Measuring for only {} ms; deltas below {} ms are noisy",
                duration.as_millis(),
                MIN_RELIABLE_DURATION_MS
            );
        }
        let url = Url::parse(test_url)
            .map_err(|e| Error::InvalidInput(format!("'{}' is not an absolute URL: {}", test_url, e)))?;

        tracing::debug!("Capturing baseline on {}", BASELINE_URL);
        self.navigate(BASELINE_URL).await?;
        tokio::time::sleep(self.timeouts.settle()).await;
        let baseline = self.sampler.capture(self.timeouts.sample_window()).await?;

        tracing::debug!("Loading {} for {:?}", url, duration);
        let mark = self.sampler.begin().await?;
        self.navigate(url.as_str()).await?;
        tokio::time::sleep(duration).await;

        let idle_reached = if wait_for_idle {
            self.wait_for_idle().await
        } else {
            false
        };

        let with_extension = self.sampler.finish(mark).await?;
        let measurement = PerformanceMeasurement::new(
            extension_id,
            url.as_str(),
            duration.as_millis() as u64,
            idle_reached,
            baseline,
            with_extension,
        );

        tracing::info!(
            "Measured {}: cpu {:+.1}%, memory {:+.1} MB, script {:+.1} ms",
            url,
            measurement.delta.cpu_usage,
            measurement.delta.memory_usage,
            measurement.delta.execution_time
        );
        Ok(measurement)
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.driver
            .navigate(url, self.timeouts.navigation())
            .await
            .map_err(Error::from)
    }

    /// Poll until the document is complete and the resource count holds between two polls.
    /// Returns whether that happened before the idle cap.
    async fn wait_for_idle(&self) -> bool {
        let deadline = Instant::now() + self.timeouts.idle_cap();
        let script = format!("{}{}", IDLE_PROBE_TAG, IDLE_PROBE_BODY);
        let mut settled_resources: Option<u64> = None;

        loop {
            match self.probe(&script).await {
                Ok(probe) => {
                    let complete = probe.ready_state == "complete";
                    if complete && settled_resources == Some(probe.resources) {
                        tracing::debug!("Page idle with {} resource(s)", probe.resources);
                        return true;
                    }
                    settled_resources = complete.then_some(probe.resources);
                }
                Err(e) => tracing::debug!("Idle probe failed: {}", e),
            }

            if Instant::now() + self.timeouts.idle_poll() > deadline {
                tracing::warn!("Page did not go idle within {:?}", self.timeouts.idle_cap());
                return false;
            }
            tokio::time::sleep(self.timeouts.idle_poll()).await;
        }
    }

    async fn probe(&self, script: &str) -> Result<IdleProbe> {
        let value = with_timeout("idle probe", self.timeouts.evaluation(), self.driver.evaluate(script)).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::WEB_VITALS_TAG;
    use extperf_browser::PerformanceCounters;
    use extperf_browser::testing::ScriptedDriver;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EXT: &str = "abcdefghijklmnopabcdefghijklmnop";

    fn heap(mb: f64) -> Option<f64> {
        Some(mb * 1_048_576.0)
    }

    /// Baseline reads are counters 0 and 1, the with-extension window is 2 and 3
    fn script_page(driver: &ScriptedDriver, ready_state: &'static str) {
        driver.on_counters(|n| {
            let (ts, task, script, mb) = match n {
                0 => (100.0, 0.5, 0.1, 10.0),
                1 => (101.0, 0.5, 0.1, 10.0),
                2 => (102.0, 1.0, 0.2, 12.0),
                _ => (104.0, 2.0, 0.7, 30.0),
            };
            Ok(PerformanceCounters {
                timestamp: Some(ts),
                task_duration: Some(task),
                script_duration: Some(script),
                js_heap_used_size: heap(mb),
            })
        });

        let vitals_reads = AtomicUsize::new(0);
        driver.on_evaluate(move |script| {
            if script.starts_with(WEB_VITALS_TAG) {
                return if vitals_reads.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(json!({ "lcp": 0.0, "cls": 0.0 }))
                } else {
                    Ok(json!({ "lcp": 1830.0, "cls": 0.125 }))
                };
            }
            assert!(script.starts_with(IDLE_PROBE_TAG));
            Ok(json!({ "readyState": ready_state, "resources": 14 }))
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_computes_delta_against_baseline() {
        let driver = Arc::new(ScriptedDriver::new());
        script_page(&driver, "complete");

        let collector = MetricsCollector::new(driver.clone(), Timeouts::default());
        let m = collector
            .measure(EXT, "https://example.com/", Duration::from_millis(3000), true)
            .await
            .unwrap();

        assert_eq!(driver.navigations(), vec![BASELINE_URL, "https://example.com/"]);
        assert_eq!(m.duration_ms, 3000);
        assert!(m.idle_reached);
        assert_eq!(m.baseline.cpu_usage, 0.0);
        assert_eq!(m.with_extension.cpu_usage, 50.0);
        assert_eq!(m.delta.cpu_usage, 50.0);
        assert_eq!(m.delta.memory_usage, 20.0);
        assert!((m.delta.execution_time - 500.0).abs() < 1e-9);
        assert_eq!(m.delta.lcp, 1830.0);
        assert_eq!(m.delta.cls, 0.125);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_wait_gives_up_at_cap() {
        let driver = Arc::new(ScriptedDriver::new());
        script_page(&driver, "loading");

        let collector = MetricsCollector::new(driver.clone(), Timeouts::default());
        let started = Instant::now();
        let m = collector
            .measure(EXT, "https://example.com/", Duration::from_millis(1000), true)
            .await
            .unwrap();

        assert!(!m.idle_reached);
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_zero_duration_is_rejected() {
        let driver = Arc::new(ScriptedDriver::new());
        let collector = MetricsCollector::new(driver.clone(), Timeouts::default());

        let err = collector
            .measure(EXT, "https://example.com/", Duration::ZERO, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(driver.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_relative_url_is_rejected() {
        let driver = Arc::new(ScriptedDriver::new());
        let collector = MetricsCollector::new(driver, Timeouts::default());

        let err = collector
            .measure(EXT, "/checkout", Duration::from_secs(2), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("/checkout")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_is_unreachable_target() {
        let driver = Arc::new(ScriptedDriver::new());
        script_page(&driver, "complete");
        driver.fail_navigation(true);

        let collector = MetricsCollector::new(driver, Timeouts::default());
        let err = collector
            .measure(EXT, "https://example.com/", Duration::from_secs(2), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TargetUnreachable");
    }
}
