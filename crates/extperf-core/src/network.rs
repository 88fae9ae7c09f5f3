use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse request category used for `requestsByType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    Document,
    Stylesheet,
    Script,
    Image,
    Font,
    Media,
    Xhr,
    Websocket,
    Other,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Document => "document",
            RequestCategory::Stylesheet => "stylesheet",
            RequestCategory::Script => "script",
            RequestCategory::Image => "image",
            RequestCategory::Font => "font",
            RequestCategory::Media => "media",
            RequestCategory::Xhr => "xhr",
            RequestCategory::Websocket => "websocket",
            RequestCategory::Other => "other",
        }
    }

    /// Classify a request from its DevTools resource type, falling back to the MIME type
    pub fn classify(resource_type: Option<&str>, mime_type: Option<&str>) -> Self {
        if let Some(category) = resource_type.and_then(Self::from_resource_type) {
            return category;
        }

        mime_type
            .map(Self::from_mime_type)
            .unwrap_or(RequestCategory::Other)
    }

    fn from_resource_type(resource_type: &str) -> Option<Self> {
        let category = match resource_type.to_lowercase().as_str() {
            "document" => RequestCategory::Document,
            "stylesheet" => RequestCategory::Stylesheet,
            "script" => RequestCategory::Script,
            "image" => RequestCategory::Image,
            "font" => RequestCategory::Font,
            "media" | "texttrack" => RequestCategory::Media,
            "xhr" | "fetch" | "eventsource" | "preflight" => RequestCategory::Xhr,
            "websocket" => RequestCategory::Websocket,
            // "other" and unknown types defer to the MIME type
            _ => return None,
        };
        Some(category)
    }

    fn from_mime_type(mime_type: &str) -> Self {
        let Ok(parsed) = mime_type.parse::<mime::Mime>() else {
            return RequestCategory::Other;
        };

        let top = parsed.type_();
        let subtype = parsed.subtype().as_str();

        if top == mime::IMAGE {
            RequestCategory::Image
        } else if top == mime::FONT || subtype.starts_with("font") || subtype.starts_with("x-font") {
            RequestCategory::Font
        } else if top == mime::AUDIO || top == mime::VIDEO {
            RequestCategory::Media
        } else if subtype.contains("javascript") || subtype == "ecmascript" {
            RequestCategory::Script
        } else if top == mime::TEXT && subtype == "html" {
            RequestCategory::Document
        } else if top == mime::TEXT && subtype == "css" {
            RequestCategory::Stylesheet
        } else if subtype == "json" || parsed.suffix() == Some(mime::JSON) {
            RequestCategory::Xhr
        } else {
            RequestCategory::Other
        }
    }
}

/// One request observed during a monitoring window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequestRecord {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub category: RequestCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub encoded_data_length: u64,
    /// Latency from request start to completion, only for completed requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub failed: bool,
    pub cached: bool,
    pub from_extension: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatistics {
    pub failed_requests: u64,
    pub cached_requests: u64,
    pub extension_requests: u64,
}

/// Aggregated network activity for one monitoring window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub extension_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_url: Option<String>,
    pub total_requests: u64,
    /// Bytes received over the wire
    pub total_data_transferred: u64,
    /// Mean latency of successfully completed requests, in ms
    pub average_request_time: f64,
    pub requests_by_type: BTreeMap<String, u64>,
    pub statistics: NetworkStatistics,
    pub monitoring_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<NetworkRequestRecord>>,
}

impl NetworkSummary {
    /// Summary of a window in which nothing was observed
    pub fn empty(extension_id: impl Into<String>, monitoring_duration: u64) -> Self {
        Self::from_records(extension_id, None, monitoring_duration, Vec::new(), false)
    }

    /// Fold request records into a summary.
    ///
    /// Failed requests count towards `totalRequests` and `failedRequests` but not towards the
    /// latency mean. Dropping the record list (`include_requests == false`) does not change any
    /// aggregate.
    pub fn from_records(
        extension_id: impl Into<String>,
        test_url: Option<String>,
        monitoring_duration: u64,
        records: Vec<NetworkRequestRecord>,
        include_requests: bool,
    ) -> Self {
        let mut requests_by_type: BTreeMap<String, u64> = BTreeMap::new();
        let mut statistics = NetworkStatistics::default();
        let mut total_data_transferred = 0u64;
        let mut latency_sum = 0.0;
        let mut latency_count = 0u64;

        for record in &records {
            *requests_by_type
                .entry(record.category.as_str().to_string())
                .or_insert(0) += 1;

            if record.failed {
                statistics.failed_requests += 1;
            } else if let Some(duration) = record.duration_ms
                && duration.is_finite()
            {
                latency_sum += duration.max(0.0);
                latency_count += 1;
            }

            if record.cached {
                statistics.cached_requests += 1;
            }
            if record.from_extension {
                statistics.extension_requests += 1;
            }

            total_data_transferred += record.encoded_data_length;
        }

        let average_request_time = if latency_count > 0 {
            latency_sum / latency_count as f64
        } else {
            0.0
        };

        tracing::debug!(
            "Network summary: {} requests, {} failed, {} bytes",
            records.len(),
            statistics.failed_requests,
            total_data_transferred
        );

        Self {
            extension_id: extension_id.into(),
            test_url,
            total_requests: records.len() as u64,
            total_data_transferred,
            average_request_time,
            requests_by_type,
            statistics,
            monitoring_duration,
            requests: include_requests.then_some(records),
        }
    }
}

/// Per-page mean of several network summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAverages {
    pub total_requests: f64,
    pub total_data_transferred: f64,
    pub average_request_time: f64,
    pub failed_requests: f64,
    pub cached_requests: f64,
    pub extension_requests: f64,
    pub requests_by_type: BTreeMap<String, f64>,
}

impl NetworkAverages {
    /// Mean over summaries, `None` when there are none
    pub fn from_summaries<'a, I>(summaries: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NetworkSummary>,
    {
        let mut acc = NetworkAverages::default();
        let mut count = 0usize;

        for s in summaries {
            acc.total_requests += s.total_requests as f64;
            acc.total_data_transferred += s.total_data_transferred as f64;
            acc.average_request_time += s.average_request_time;
            acc.failed_requests += s.statistics.failed_requests as f64;
            acc.cached_requests += s.statistics.cached_requests as f64;
            acc.extension_requests += s.statistics.extension_requests as f64;
            for (kind, n) in &s.requests_by_type {
                *acc.requests_by_type.entry(kind.clone()).or_insert(0.0) += *n as f64;
            }
            count += 1;
        }

        (count > 0).then(|| acc.scaled(1.0 / count as f64))
    }

    /// Mean over already-averaged values, `None` when there are none
    pub fn mean<'a, I>(averages: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NetworkAverages>,
    {
        let mut acc = NetworkAverages::default();
        let mut count = 0usize;

        for a in averages {
            acc.total_requests += a.total_requests;
            acc.total_data_transferred += a.total_data_transferred;
            acc.average_request_time += a.average_request_time;
            acc.failed_requests += a.failed_requests;
            acc.cached_requests += a.cached_requests;
            acc.extension_requests += a.extension_requests;
            for (kind, n) in &a.requests_by_type {
                *acc.requests_by_type.entry(kind.clone()).or_insert(0.0) += n;
            }
            count += 1;
        }

        (count > 0).then(|| acc.scaled(1.0 / count as f64))
    }

    fn scaled(mut self, factor: f64) -> Self {
        self.total_requests *= factor;
        self.total_data_transferred *= factor;
        self.average_request_time *= factor;
        self.failed_requests *= factor;
        self.cached_requests *= factor;
        self.extension_requests *= factor;
        for value in self.requests_by_type.values_mut() {
            *value *= factor;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: RequestCategory, bytes: u64, duration: Option<f64>) -> NetworkRequestRecord {
        NetworkRequestRecord {
            request_id: id.to_string(),
            url: format!("https://example.com/{}", id),
            method: "GET".to_string(),
            category,
            mime_type: None,
            status: Some(200),
            encoded_data_length: bytes,
            duration_ms: duration,
            failed: false,
            cached: false,
            from_extension: false,
            error_text: None,
        }
    }

    #[test]
    fn test_empty_summary_has_zero_averages() {
        let summary = NetworkSummary::empty("ext", 2000);

        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.total_data_transferred, 0);
        assert_eq!(summary.average_request_time, 0.0);
        assert!(!summary.average_request_time.is_nan());
        assert!(summary.requests_by_type.is_empty());
    }

    #[test]
    fn test_failed_requests_excluded_from_latency_mean() {
        let mut records = vec![
            record("1", RequestCategory::Document, 1000, Some(100.0)),
            record("2", RequestCategory::Script, 500, Some(200.0)),
            record("3", RequestCategory::Script, 500, Some(300.0)),
        ];
        let mut failed = record("4", RequestCategory::Xhr, 0, None);
        failed.failed = true;
        records.push(failed);

        let summary = NetworkSummary::from_records("ext", None, 2000, records, false);

        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.statistics.failed_requests, 1);
        assert_eq!(summary.average_request_time, 200.0);
        assert_eq!(summary.total_data_transferred, 2000);
        assert_eq!(summary.requests_by_type.get("script"), Some(&2));
        assert_eq!(summary.requests_by_type.get("xhr"), Some(&1));
    }

    #[test]
    fn test_only_failed_requests_yields_zero_latency() {
        let mut failed = record("1", RequestCategory::Xhr, 0, Some(5000.0));
        failed.failed = true;

        let summary = NetworkSummary::from_records("ext", None, 2000, vec![failed], false);

        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.average_request_time, 0.0);
    }

    #[test]
    fn test_include_requests_does_not_change_aggregates() {
        let records = vec![
            record("1", RequestCategory::Image, 2048, Some(40.0)),
            record("2", RequestCategory::Font, 1024, Some(60.0)),
        ];

        let with = NetworkSummary::from_records("ext", None, 1000, records.clone(), true);
        let without = NetworkSummary::from_records("ext", None, 1000, records, false);

        assert_eq!(with.requests.as_ref().map(Vec::len), Some(2));
        assert!(without.requests.is_none());
        assert_eq!(with.total_requests, without.total_requests);
        assert_eq!(with.total_data_transferred, without.total_data_transferred);
        assert_eq!(with.average_request_time, without.average_request_time);
        assert_eq!(with.requests_by_type, without.requests_by_type);
        assert_eq!(with.statistics, without.statistics);
    }

    #[test]
    fn test_classify_prefers_resource_type() {
        assert_eq!(
            RequestCategory::classify(Some("Script"), Some("text/plain")),
            RequestCategory::Script
        );
        assert_eq!(
            RequestCategory::classify(Some("Fetch"), None),
            RequestCategory::Xhr
        );
    }

    #[test]
    fn test_classify_falls_back_to_mime() {
        assert_eq!(
            RequestCategory::classify(Some("Other"), Some("text/css; charset=utf-8")),
            RequestCategory::Stylesheet
        );
        assert_eq!(
            RequestCategory::classify(None, Some("application/javascript")),
            RequestCategory::Script
        );
        assert_eq!(
            RequestCategory::classify(None, Some("application/ld+json")),
            RequestCategory::Xhr
        );
        assert_eq!(
            RequestCategory::classify(None, Some("image/webp")),
            RequestCategory::Image
        );
        assert_eq!(
            RequestCategory::classify(None, Some("not a mime")),
            RequestCategory::Other
        );
        assert_eq!(RequestCategory::classify(None, None), RequestCategory::Other);
    }

    #[test]
    fn test_averages_over_summaries() {
        let a = NetworkSummary::from_records(
            "ext",
            None,
            1000,
            vec![record("1", RequestCategory::Image, 100, Some(10.0))],
            false,
        );
        let b = NetworkSummary::from_records(
            "ext",
            None,
            1000,
            vec![
                record("1", RequestCategory::Image, 100, Some(30.0)),
                record("2", RequestCategory::Script, 200, Some(30.0)),
            ],
            false,
        );

        let avg = NetworkAverages::from_summaries([&a, &b]).unwrap();
        assert_eq!(avg.total_requests, 1.5);
        assert_eq!(avg.total_data_transferred, 200.0);
        assert_eq!(avg.average_request_time, 20.0);
        assert_eq!(avg.requests_by_type.get("image"), Some(&1.0));
        assert_eq!(avg.requests_by_type.get("script"), Some(&0.5));

        assert!(NetworkAverages::from_summaries(Vec::<&NetworkSummary>::new()).is_none());
    }
}
