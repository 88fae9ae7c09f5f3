use extperf_browser::{BrowserDriver, PerformanceCounters, with_timeout};
use extperf_core::metrics::PerformanceSnapshot;
use extperf_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const WEB_VITALS_TAG: &str = "/* extperf:web-vitals */";

const BYTES_PER_MB: f64 = 1_048_576.0;

// Buffered observers deliver queued entries asynchronously, so the answer waits one short task turn
const WEB_VITALS_BODY: &str = r#"
new Promise((resolve) => {
  let lcp = 0;
  let cls = 0;
  try {
    new PerformanceObserver((list) => {
      for (const entry of list.getEntries()) {
        lcp = Math.max(lcp, entry.renderTime || entry.loadTime || entry.startTime || 0);
      }
    }).observe({ type: 'largest-contentful-paint', buffered: true });
    new PerformanceObserver((list) => {
      for (const entry of list.getEntries()) {
        if (!entry.hadRecentInput) cls += entry.value;
      }
    }).observe({ type: 'layout-shift', buffered: true });
  } catch (e) {}
  setTimeout(() => resolve({ lcp, cls }), 50);
})
"#;

#[derive(Debug, Deserialize)]
struct WebVitals {
    lcp: f64,
    cls: f64,
}

/// Opening half of a sample: the counters read when the window began
#[derive(Debug, Clone, Copy)]
pub struct SampleMark {
    counters: PerformanceCounters,
    started: Instant,
}

/// Takes coarse performance snapshots of the driven tab
pub struct Sampler {
    driver: Arc<dyn BrowserDriver>,
    evaluation_timeout: Duration,
}

impl Sampler {
    pub fn new(driver: Arc<dyn BrowserDriver>, evaluation_timeout: Duration) -> Self {
        Self {
            driver,
            evaluation_timeout,
        }
    }

    pub async fn begin(&self) -> Result<SampleMark> {
        let counters = self.read_counters().await?;
        Ok(SampleMark {
            counters,
            started: Instant::now(),
        })
    }

    /// Close the window opened by `mark` and turn both counter reads into a snapshot
    pub async fn finish(&self, mark: SampleMark) -> Result<PerformanceSnapshot> {
        let closing = self.read_counters().await?;
        let wall_clock = mark.started.elapsed().as_secs_f64();
        let vitals = self.web_vitals().await?;

        let snapshot = snapshot_between(&mark.counters, &closing, wall_clock, vitals)?;
        tracing::debug!(
            "Sample: cpu {:.1}%, heap {:.1} MB, script {:.1} ms",
            snapshot.cpu_usage,
            snapshot.memory_usage,
            snapshot.execution_time
        );
        Ok(snapshot)
    }

    /// Sample the page over `window`
    pub async fn capture(&self, window: Duration) -> Result<PerformanceSnapshot> {
        let mark = self.begin().await?;
        tokio::time::sleep(window).await;
        self.finish(mark).await
    }

    async fn read_counters(&self) -> Result<PerformanceCounters> {
        with_timeout(
            "read performance counters",
            self.evaluation_timeout,
            self.driver.performance_counters(),
        )
        .await
        .map_err(|e| collection_error("performance counters unavailable", e))
    }

    async fn web_vitals(&self) -> Result<WebVitals> {
        let script = format!("{}{}", WEB_VITALS_TAG, WEB_VITALS_BODY);
        let value = with_timeout("read web vitals", self.evaluation_timeout, self.driver.evaluate(&script))
            .await
            .map_err(|e| collection_error("web vitals unavailable", e))?;

        serde_json::from_value(value)
            .map_err(|e| Error::Collection(format!("unexpected web vitals payload: {}", e)))
    }
}

/// A closed tab stays `TargetUnreachable`; every other read failure is a collection failure
fn collection_error(context: &str, err: extperf_browser::Error) -> Error {
    match Error::from(err) {
        Error::TargetUnreachable(msg) => Error::TargetUnreachable(msg),
        other => Error::Collection(format!("{}: {}", context, other)),
    }
}

fn required(value: Option<f64>, name: &str) -> Result<f64> {
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Collection(format!("{} counter missing from Performance.getMetrics", name)))
}

fn snapshot_between(
    opening: &PerformanceCounters,
    closing: &PerformanceCounters,
    wall_clock_secs: f64,
    vitals: WebVitals,
) -> Result<PerformanceSnapshot> {
    let task = required(closing.task_duration, "TaskDuration")? - required(opening.task_duration, "TaskDuration")?;
    let script =
        required(closing.script_duration, "ScriptDuration")? - required(opening.script_duration, "ScriptDuration")?;
    let heap = required(closing.js_heap_used_size, "JSHeapUsedSize")?;
    // A renderer swap mid-window restarts the cumulative counters
    if task < 0.0 || script < 0.0 {
        return Err(Error::Collection(format!(
            "performance counters went backwards during the sample (TaskDuration {:+.3}s, ScriptDuration {:+.3}s)",
            task, script
        )));
    }

    let elapsed = match (opening.timestamp, closing.timestamp) {
        (Some(start), Some(end)) => end - start,
        _ => wall_clock_secs,
    };
    let cpu_usage = if elapsed > 0.0 {
        (task / elapsed * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    Ok(PerformanceSnapshot {
        cpu_usage,
        memory_usage: heap / BYTES_PER_MB,
        timestamp: chrono::Utc::now(),
        execution_time: script * 1000.0,
        lcp: vitals.lcp,
        cls: vitals.cls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use extperf_browser::testing::ScriptedDriver;
    use serde_json::json;

    fn counters(ts: Option<f64>, task: f64, script: f64, heap_mb: f64) -> PerformanceCounters {
        PerformanceCounters {
            timestamp: ts,
            task_duration: Some(task),
            script_duration: Some(script),
            js_heap_used_size: Some(heap_mb * BYTES_PER_MB),
        }
    }

    fn vitals(lcp: f64, cls: f64) -> WebVitals {
        WebVitals { lcp, cls }
    }

    #[test]
    fn test_snapshot_from_counter_deltas() {
        let snapshot = snapshot_between(
            &counters(Some(10.0), 1.0, 0.25, 8.0),
            &counters(Some(12.0), 1.5, 0.5, 24.0),
            5.0,
            vitals(1200.0, 0.05),
        )
        .unwrap();

        assert_eq!(snapshot.cpu_usage, 25.0);
        assert_eq!(snapshot.memory_usage, 24.0);
        assert_eq!(snapshot.execution_time, 250.0);
        assert_eq!(snapshot.lcp, 1200.0);
    }

    #[test]
    fn test_cpu_falls_back_to_wall_clock_and_clamps() {
        let snapshot = snapshot_between(
            &counters(None, 0.0, 0.0, 1.0),
            &counters(None, 3.0, 0.0, 1.0),
            2.0,
            vitals(0.0, 0.0),
        )
        .unwrap();
        assert_eq!(snapshot.cpu_usage, 100.0);

        let empty_window = snapshot_between(
            &counters(Some(5.0), 0.0, 0.0, 1.0),
            &counters(Some(5.0), 0.0, 0.0, 1.0),
            0.0,
            vitals(0.0, 0.0),
        )
        .unwrap();
        assert_eq!(empty_window.cpu_usage, 0.0);
    }

    #[test]
    fn test_missing_counter_is_collection_error() {
        let mut closing = counters(Some(2.0), 1.0, 1.0, 1.0);
        closing.js_heap_used_size = None;

        let err = snapshot_between(&counters(Some(1.0), 0.0, 0.0, 1.0), &closing, 1.0, vitals(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::Collection(msg) if msg.contains("JSHeapUsedSize")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_reads_counters_around_window() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_counters(|n| Ok(counters(Some(100.0 + n as f64), 0.1 * n as f64, 0.0, 16.0)));
        driver.on_evaluate(|script| {
            assert!(script.starts_with(WEB_VITALS_TAG));
            Ok(json!({ "lcp": 640.5, "cls": 0.02 }))
        });

        let sampler = Sampler::new(driver.clone(), Duration::from_secs(5));
        let snapshot = sampler.capture(Duration::from_millis(1000)).await.unwrap();

        assert_eq!(driver.counter_reads(), 2);
        assert!((snapshot.cpu_usage - 10.0).abs() < 1e-9);
        assert_eq!(snapshot.memory_usage, 16.0);
        assert_eq!(snapshot.lcp, 640.5);
    }

    #[tokio::test]
    async fn test_unscripted_counters_fail_collection() {
        let driver = Arc::new(ScriptedDriver::new());
        let sampler = Sampler::new(driver, Duration::from_secs(5));

        let err = sampler.begin().await.unwrap_err();
        assert_eq!(err.kind(), "CollectionError");
    }

    #[test]
    fn test_counter_reset_is_collection_error() {
        let err = snapshot_between(
            &counters(Some(100.0), 8.0, 3.0, 10.0),
            &counters(Some(105.0), 0.5, 0.2, 12.0),
            5.0,
            vitals(0.0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Collection(ref msg) if msg.contains("went backwards")));

        let script_only = snapshot_between(
            &counters(Some(100.0), 1.0, 3.0, 10.0),
            &counters(Some(105.0), 2.0, 0.2, 12.0),
            5.0,
            vitals(0.0, 0.0),
        );
        assert!(script_only.is_err());
    }

    #[tokio::test]
    async fn test_closed_target_is_unreachable() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.on_counters(|_| Err(extperf_browser::Error::TargetClosed("tab crashed".to_string())));
        let sampler = Sampler::new(driver, Duration::from_secs(5));

        let err = sampler.begin().await.unwrap_err();
        assert!(matches!(err, Error::TargetUnreachable(_)));
    }
}
