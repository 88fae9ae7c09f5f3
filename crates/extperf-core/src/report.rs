use crate::analysis::{ImpactLevel, ScoreBreakdown};
use crate::metrics::MetricsDelta;
use crate::network::{NetworkAverages, NetworkSummary};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfiguration {
    pub total_tests: u64,
    pub total_pages: usize,
    pub iterations_per_page: u32,
    pub performance_duration_ms: u64,
    pub network_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallImpact {
    pub avg_performance: Option<MetricsDelta>,
    pub avg_network: Option<NetworkAverages>,
    pub overall_impact_score: Option<f64>,
    pub overall_impact_level: Option<ImpactLevel>,
    pub pages_measured: usize,
    pub pages_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Every iteration succeeded
    Completed,
    /// Some iterations failed and were excluded
    Partial,
    /// No iteration succeeded; the page is excluded from the overall mean
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStats {
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl ScoreStats {
    /// Min, max and population standard deviation; `None` for an empty set
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: variance.sqrt(),
        })
    }
}

/// Per-iteration detail, attached when network details are requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    pub iteration: u32,
    pub delta: MetricsDelta,
    pub network: NetworkSummary,
    pub impact_score: f64,
    pub impact_level: ImpactLevel,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReportEntry {
    pub page_name: String,
    pub url: String,
    pub status: EntryStatus,
    pub iterations_completed: u32,
    pub iterations_failed: u32,
    pub avg_performance: Option<MetricsDelta>,
    pub avg_network: Option<NetworkAverages>,
    pub impact_score: Option<f64>,
    pub impact_level: Option<ImpactLevel>,
    pub score_stats: Option<ScoreStats>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<Vec<IterationRecord>>,
}

/// A failed step of a campaign, kept so partial results stay explainable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub page: String,
    pub url: String,
    pub iteration: u32,
    pub operation: String,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub extension_id: String,
    pub generated_at: DateTime<Utc>,
    pub configuration: ReportConfiguration,
    pub overall: OverallImpact,
    pub page_results: Vec<ImpactReportEntry>,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub failures: Vec<FailureRecord>,
}

/// Short display name for a test page: host plus path, without scheme or trailing slash
pub fn page_name(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let path = parsed.path().trim_end_matches('/');
            if host.is_empty() {
                url.to_string()
            } else {
                format!("{}{}", host, path)
            }
        }
        Err(_) => url.to_string(),
    }
}

pub struct ReportWriter;

impl ReportWriter {
    /// Write a report to a file as pretty JSON
    pub fn to_file(report: &ImpactReport, path: &Path) -> Result<()> {
        tracing::debug!("Writing impact report to: {}", path.display());

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(
            "Wrote impact report with {} page result(s) to {}",
            report.page_results.len(),
            path.display()
        );

        Ok(())
    }

    /// Read a previously written report
    pub fn from_file(path: &Path) -> Result<ImpactReport> {
        let content = std::fs::read_to_string(path)?;
        let report: ImpactReport = serde_json::from_str(&content)?;

        if report.page_results.len() != report.configuration.total_pages {
            return Err(Error::InvalidInput(format!(
                "report lists {} page results but {} pages were configured",
                report.page_results.len(),
                report.configuration.total_pages
            )));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_name_strips_scheme_and_trailing_slash() {
        assert_eq!(page_name("https://example.com"), "example.com");
        assert_eq!(page_name("https://example.com/"), "example.com");
        assert_eq!(page_name("https://news.example.com/world/"), "news.example.com/world");
        assert_eq!(page_name("not a url"), "not a url");
    }

    #[test]
    fn test_score_stats() {
        let stats = ScoreStats::from_scores(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert!((stats.std_dev - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);

        assert!(ScoreStats::from_scores(&[]).is_none());
        assert_eq!(ScoreStats::from_scores(&[42.0]).unwrap().std_dev, 0.0);
    }

    #[test]
    fn test_report_round_trips_through_file() {
        let report = ImpactReport {
            extension_id: "ext".to_string(),
            generated_at: Utc::now(),
            configuration: ReportConfiguration {
                total_tests: 0,
                total_pages: 0,
                iterations_per_page: 1,
                performance_duration_ms: 1000,
                network_duration_ms: 1000,
            },
            overall: OverallImpact {
                avg_performance: None,
                avg_network: None,
                overall_impact_score: None,
                overall_impact_level: None,
                pages_measured: 0,
                pages_failed: 0,
            },
            page_results: vec![],
            key_findings: vec![],
            recommendations: vec![],
            failures: vec![],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        ReportWriter::to_file(&report, &path).unwrap();

        let read = ReportWriter::from_file(&path).unwrap();
        assert_eq!(read.extension_id, "ext");
        assert_eq!(read.configuration, report.configuration);
    }
}
