mod aggregate;
mod findings;
mod scoring;

pub use aggregate::{
    IterationFailure, IterationOutcome, IterationResult, PageRun, RunConfiguration, build_report,
};
pub use findings::key_findings;
pub use scoring::{ComponentPolicy, ImpactScorer, LevelThresholds, NetworkLoad, ScoringPolicy};

use serde::{Deserialize, Serialize};

/// Discrete bucket derived from the continuous impact score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    None,
    Low,
    Moderate,
    High,
    Severe,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::None => "none",
            ImpactLevel::Low => "low",
            ImpactLevel::Moderate => "moderate",
            ImpactLevel::High => "high",
            ImpactLevel::Severe => "severe",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted contribution of each component to the impact score, in score points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub cpu: f64,
    pub memory: f64,
    pub execution_time: f64,
    pub lcp: f64,
    pub cls: f64,
    pub network: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.cpu + self.memory + self.execution_time + self.lcp + self.cls + self.network
    }

    /// Name and points of the largest contributor, `None` when nothing contributes
    pub fn dominant(&self) -> Option<(&'static str, f64)> {
        [
            ("CPU usage", self.cpu),
            ("memory usage", self.memory),
            ("script execution time", self.execution_time),
            ("largest contentful paint", self.lcp),
            ("layout shift", self.cls),
            ("network overhead", self.network),
        ]
        .into_iter()
        .filter(|(_, points)| *points > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Score, level and advice for one measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    pub impact_score: f64,
    pub impact_level: ImpactLevel,
    pub recommendations: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

/// Recommendation rules; each fires independently of the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Cpu,
    Memory,
    ExecutionTime,
    Lcp,
    Cls,
    RequestCount,
    TransferSize,
    FailedRequests,
    SlowRequests,
}

impl RuleKind {
    /// Page-independent advice used when merging recommendations across pages
    pub fn advice(&self) -> &'static str {
        match self {
            RuleKind::Cpu => {
                "Profile content scripts and background work for long tasks that keep the main thread busy"
            }
            RuleKind::Memory => {
                "Audit retained objects and caches in content scripts; release DOM references when pages change"
            }
            RuleKind::ExecutionTime => {
                "Defer or lazy-load extension scripts and avoid synchronous work at document_start"
            }
            RuleKind::Lcp => {
                "Avoid injecting render-blocking styles or scripts before the page's main content paints"
            }
            RuleKind::Cls => {
                "Reserve space for injected UI or insert it outside the document flow to prevent layout shifts"
            }
            RuleKind::RequestCount => {
                "Batch or cache extension network requests instead of issuing them on every page load"
            }
            RuleKind::TransferSize => {
                "Reduce the size of fetched resources; compress payloads and bundle only what pages need"
            }
            RuleKind::FailedRequests => {
                "Investigate failing requests; retries and error handling add load without benefit"
            }
            RuleKind::SlowRequests => {
                "Move slow network calls off the page's critical path or serve them from a cache"
            }
        }
    }
}

/// A fired rule with the severity of its triggering condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub rule: RuleKind,
    /// Observed value relative to the component cap; higher is worse
    pub severity: f64,
    pub message: String,
}
