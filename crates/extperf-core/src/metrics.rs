use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single performance reading of the page under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    /// Share of wall time spent on the main thread, in percent
    pub cpu_usage: f64,
    /// Used JS heap, in MB
    pub memory_usage: f64,
    pub timestamp: DateTime<Utc>,
    /// Script execution time over the sample window, in ms
    pub execution_time: f64,
    /// Largest Contentful Paint, in ms
    pub lcp: f64,
    /// Cumulative Layout Shift
    pub cls: f64,
}

/// Field-wise difference between a with-extension snapshot and its baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDelta {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub execution_time: f64,
    pub lcp: f64,
    pub cls: f64,
}

impl MetricsDelta {
    /// Compute `after - before` for every field, without rounding
    pub fn between(before: &PerformanceSnapshot, after: &PerformanceSnapshot) -> Self {
        Self {
            cpu_usage: after.cpu_usage - before.cpu_usage,
            memory_usage: after.memory_usage - before.memory_usage,
            execution_time: after.execution_time - before.execution_time,
            lcp: after.lcp - before.lcp,
            cls: after.cls - before.cls,
        }
    }

    /// Arithmetic mean of a set of deltas, `None` when the set is empty
    pub fn mean<'a, I>(deltas: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a MetricsDelta>,
    {
        let mut sum = MetricsDelta::default();
        let mut count = 0usize;
        for d in deltas {
            sum.cpu_usage += d.cpu_usage;
            sum.memory_usage += d.memory_usage;
            sum.execution_time += d.execution_time;
            sum.lcp += d.lcp;
            sum.cls += d.cls;
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        Some(Self {
            cpu_usage: sum.cpu_usage / n,
            memory_usage: sum.memory_usage / n,
            execution_time: sum.execution_time / n,
            lcp: sum.lcp / n,
            cls: sum.cls / n,
        })
    }
}

/// Result of one baseline / with-extension measurement cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMeasurement {
    pub extension_id: String,
    pub test_url: String,
    pub duration_ms: u64,
    /// Whether an idle signal was observed before the idle cap (always false when not requested)
    pub idle_reached: bool,
    pub baseline: PerformanceSnapshot,
    pub with_extension: PerformanceSnapshot,
    pub delta: MetricsDelta,
}

impl PerformanceMeasurement {
    pub fn new(
        extension_id: impl Into<String>,
        test_url: impl Into<String>,
        duration_ms: u64,
        idle_reached: bool,
        baseline: PerformanceSnapshot,
        with_extension: PerformanceSnapshot,
    ) -> Self {
        let delta = MetricsDelta::between(&baseline, &with_extension);
        Self {
            extension_id: extension_id.into(),
            test_url: test_url.into(),
            duration_ms,
            idle_reached,
            baseline,
            with_extension,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f64, mem: f64, exec: f64, lcp: f64, cls: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            cpu_usage: cpu,
            memory_usage: mem,
            timestamp: Utc::now(),
            execution_time: exec,
            lcp,
            cls,
        }
    }

    #[test]
    fn test_delta_is_exact_difference() {
        let before = snapshot(3.5, 12.25, 40.0, 0.0, 0.0);
        let after = snapshot(17.75, 30.5, 215.125, 1830.4, 0.12);

        let delta = MetricsDelta::between(&before, &after);

        assert_eq!(delta.cpu_usage, 17.75 - 3.5);
        assert_eq!(delta.memory_usage, 30.5 - 12.25);
        assert_eq!(delta.execution_time, 215.125 - 40.0);
        assert_eq!(delta.lcp, 1830.4);
        assert_eq!(delta.cls, 0.12);
    }

    #[test]
    fn test_delta_can_be_negative() {
        let before = snapshot(20.0, 50.0, 100.0, 900.0, 0.2);
        let after = snapshot(10.0, 45.0, 80.0, 700.0, 0.1);

        let delta = MetricsDelta::between(&before, &after);

        assert!(delta.cpu_usage < 0.0);
        assert!(delta.memory_usage < 0.0);
        assert!(delta.lcp < 0.0);
    }

    #[test]
    fn test_mean_of_empty_set_is_none() {
        assert!(MetricsDelta::mean(&Vec::<MetricsDelta>::new()).is_none());
    }

    #[test]
    fn test_mean_of_deltas() {
        let a = MetricsDelta {
            cpu_usage: 10.0,
            memory_usage: 4.0,
            execution_time: 100.0,
            lcp: 200.0,
            cls: 0.1,
        };
        let b = MetricsDelta {
            cpu_usage: 20.0,
            memory_usage: 6.0,
            execution_time: 300.0,
            lcp: 400.0,
            cls: 0.3,
        };

        let mean = MetricsDelta::mean(&[a, b]).unwrap();
        assert_eq!(mean.cpu_usage, 15.0);
        assert_eq!(mean.memory_usage, 5.0);
        assert_eq!(mean.execution_time, 200.0);
        assert_eq!(mean.lcp, 300.0);
        assert!((mean.cls - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_measurement_pairs_delta_with_snapshots() {
        let before = snapshot(1.0, 10.0, 5.0, 0.0, 0.0);
        let after = snapshot(4.0, 12.0, 25.0, 1200.0, 0.05);

        let m = PerformanceMeasurement::new("abc", "https://example.com", 3000, false, before, after);
        assert_eq!(m.delta.cpu_usage, 3.0);
        assert_eq!(m.delta.execution_time, 20.0);

        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("withExtension").is_some());
        assert!(json["delta"].get("cpuUsage").is_some());
    }
}
