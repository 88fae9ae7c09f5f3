use crate::Result;
use async_trait::async_trait;
use extperf_core::page::NativeDialog;
use serde::Serialize;
use std::time::Duration;

/// An open browser tab
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub target_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
}

/// One raw sample of the DevTools `Performance.getMetrics` counters.
///
/// Durations and the timestamp are in seconds, the heap size in bytes. Any counter Chrome did not
/// report stays `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceCounters {
    pub timestamp: Option<f64>,
    pub task_duration: Option<f64>,
    pub script_duration: Option<f64>,
    pub js_heap_used_size: Option<f64>,
}

impl PerformanceCounters {
    pub fn from_metrics<'a, I>(metrics: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut counters = Self::default();
        for (name, value) in metrics {
            match name {
                "Timestamp" => counters.timestamp = Some(value),
                "TaskDuration" => counters.task_duration = Some(value),
                "ScriptDuration" => counters.script_duration = Some(value),
                "JSHeapUsedSize" => counters.js_heap_used_size = Some(value),
                _ => {}
            }
        }
        counters
    }
}

/// Network events as reported by the browser; timestamps are monotonic, in ms
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    RequestWillBeSent {
        request_id: String,
        url: String,
        method: String,
        resource_type: Option<String>,
        initiator_url: Option<String>,
        timestamp_ms: f64,
    },
    ResponseReceived {
        request_id: String,
        status: u16,
        mime_type: Option<String>,
        resource_type: Option<String>,
        from_disk_cache: bool,
        from_prefetch_cache: bool,
        from_service_worker: bool,
        timestamp_ms: f64,
    },
    LoadingFinished {
        request_id: String,
        encoded_data_length: u64,
        timestamp_ms: f64,
    },
    LoadingFailed {
        request_id: String,
        error_text: String,
        canceled: bool,
        timestamp_ms: f64,
    },
    /// Served from the in-memory cache
    ServedFromCache { request_id: String },
}

impl NetworkEvent {
    pub fn request_id(&self) -> &str {
        match self {
            NetworkEvent::RequestWillBeSent { request_id, .. }
            | NetworkEvent::ResponseReceived { request_id, .. }
            | NetworkEvent::LoadingFinished { request_id, .. }
            | NetworkEvent::LoadingFailed { request_id, .. }
            | NetworkEvent::ServedFromCache { request_id } => request_id,
        }
    }
}

/// Everything the measurement and detection code needs from a browser tab.
///
/// Implementations drive a single page. Calls are not expected to be issued concurrently except
/// that `native_dialog` must stay answerable while another call is blocked on an open dialog.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;

    async fn open_tab(&self, url: &str) -> Result<TabInfo>;

    /// Navigate the driven tab and wait for the load, bounded by `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate an expression in the page, awaiting promises, and return its JSON value
    async fn evaluate(&self, expression: &str) -> Result<serde_json::Value>;

    async fn performance_counters(&self) -> Result<PerformanceCounters>;

    /// Record network events for `window`, navigating to `navigate_to` once listeners are attached
    async fn record_network(&self, window: Duration, navigate_to: Option<&str>) -> Result<Vec<NetworkEvent>>;

    /// The native dialog currently open on the tab, if any
    async fn native_dialog(&self) -> Result<Option<NativeDialog>>;

    async fn accept_native_dialog(&self, prompt: Option<&str>) -> Result<()>;

    async fn dismiss_native_dialog(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_pick_known_metrics() {
        let counters = PerformanceCounters::from_metrics([
            ("Timestamp", 1000.5),
            ("TaskDuration", 0.25),
            ("Nodes", 420.0),
            ("JSHeapUsedSize", 4_194_304.0),
        ]);

        assert_eq!(counters.timestamp, Some(1000.5));
        assert_eq!(counters.task_duration, Some(0.25));
        assert_eq!(counters.script_duration, None);
        assert_eq!(counters.js_heap_used_size, Some(4_194_304.0));
    }
}
