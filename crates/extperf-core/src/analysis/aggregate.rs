use super::findings::key_findings;
use super::scoring::{ImpactScorer, NetworkLoad};
use super::{ImpactAssessment, Recommendation, RuleKind};
use crate::Error;
use crate::metrics::MetricsDelta;
use crate::network::{NetworkAverages, NetworkSummary};
use crate::report::{
    EntryStatus, FailureRecord, ImpactReport, ImpactReportEntry, IterationRecord, OverallImpact,
    ReportConfiguration, ScoreStats, page_name,
};
use std::collections::HashMap;

/// One successful (page, iteration) measurement
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub iteration: u32,
    pub delta: MetricsDelta,
    pub network: NetworkSummary,
    pub assessment: ImpactAssessment,
}

/// One failed (page, iteration) measurement
#[derive(Debug, Clone, PartialEq)]
pub struct IterationFailure {
    pub iteration: u32,
    /// Pipeline step that failed, e.g. `metrics` or `network`
    pub operation: String,
    pub kind: String,
    pub error: String,
}

impl IterationFailure {
    pub fn new(iteration: u32, operation: impl Into<String>, error: &Error) -> Self {
        Self {
            iteration,
            operation: operation.into(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}

pub type IterationOutcome = std::result::Result<IterationResult, IterationFailure>;

/// All iteration outcomes for one test page, in iteration order
#[derive(Debug, Clone)]
pub struct PageRun {
    pub url: String,
    pub outcomes: Vec<IterationOutcome>,
}

#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub extension_id: String,
    pub iterations_per_page: u32,
    pub performance_duration_ms: u64,
    pub network_duration_ms: u64,
    pub include_network_details: bool,
}

/// Reduce per-page iteration outcomes into a report.
///
/// Failed iterations are excluded from every mean and listed in `failures`. Pages without a single
/// successful iteration still get an entry (status `failed`, no averages) so that
/// `pageResults.len() == configuration.totalPages`, but they are left out of the overall mean.
pub fn build_report(config: &RunConfiguration, pages: &[PageRun], scorer: &ImpactScorer) -> ImpactReport {
    tracing::debug!("Aggregating {} page run(s)", pages.len());

    let mut entries = Vec::with_capacity(pages.len());
    let mut failures = Vec::new();
    let mut fired: Vec<Vec<Recommendation>> = Vec::new();

    for page in pages {
        let (entry, page_recs) = build_entry(config, page, scorer);
        for outcome in &page.outcomes {
            if let Err(failure) = outcome {
                failures.push(FailureRecord {
                    page: entry.page_name.clone(),
                    url: page.url.clone(),
                    iteration: failure.iteration,
                    operation: failure.operation.clone(),
                    kind: failure.kind.clone(),
                    error: failure.error.clone(),
                });
            }
        }
        if !page_recs.is_empty() {
            fired.push(page_recs);
        }
        entries.push(entry);
    }

    let measured: Vec<&ImpactReportEntry> =
        entries.iter().filter(|e| e.impact_score.is_some()).collect();

    let avg_performance = MetricsDelta::mean(measured.iter().filter_map(|e| e.avg_performance.as_ref()));
    let avg_network = NetworkAverages::mean(measured.iter().filter_map(|e| e.avg_network.as_ref()));
    let overall_impact_score = mean(measured.iter().filter_map(|e| e.impact_score));
    let overall_breakdown = match (&avg_performance, &avg_network) {
        (Some(perf), Some(net)) => Some(scorer.breakdown(perf, NetworkLoad::from(net))),
        _ => None,
    };

    let overall = OverallImpact {
        avg_performance,
        avg_network,
        overall_impact_score,
        overall_impact_level: overall_impact_score.map(|s| scorer.level_for(s)),
        pages_measured: measured.len(),
        pages_failed: entries.len() - measured.len(),
    };

    let recommendations = merge_recommendations(&fired, measured.len());
    let key_findings = key_findings(&entries, &overall, overall_breakdown.as_ref(), &failures);

    tracing::info!(
        "Aggregated {} page(s): {} measured, {} failure(s)",
        entries.len(),
        overall.pages_measured,
        failures.len()
    );

    ImpactReport {
        extension_id: config.extension_id.clone(),
        generated_at: chrono::Utc::now(),
        configuration: ReportConfiguration {
            total_tests: pages.len() as u64 * u64::from(config.iterations_per_page),
            total_pages: pages.len(),
            iterations_per_page: config.iterations_per_page,
            performance_duration_ms: config.performance_duration_ms,
            network_duration_ms: config.network_duration_ms,
        },
        overall,
        page_results: entries,
        key_findings,
        recommendations,
        failures,
    }
}

fn build_entry(
    config: &RunConfiguration,
    page: &PageRun,
    scorer: &ImpactScorer,
) -> (ImpactReportEntry, Vec<Recommendation>) {
    let successes: Vec<&IterationResult> = page.outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    let failed = page.outcomes.len() - successes.len();

    let status = if successes.is_empty() {
        EntryStatus::Failed
    } else if failed > 0 {
        EntryStatus::Partial
    } else {
        EntryStatus::Completed
    };

    let avg_performance = MetricsDelta::mean(successes.iter().map(|r| &r.delta));
    let avg_network = NetworkAverages::from_summaries(successes.iter().map(|r| &r.network));
    let scores: Vec<f64> = successes.iter().map(|r| r.assessment.impact_score).collect();
    let impact_score = mean(scores.iter().copied());

    let recs = match (&avg_performance, &avg_network) {
        (Some(perf), Some(net)) => scorer.recommendations(perf, NetworkLoad::from(net)),
        _ => Vec::new(),
    };

    let iterations = config.include_network_details.then(|| {
        successes
            .iter()
            .map(|r| IterationRecord {
                iteration: r.iteration,
                delta: r.delta,
                network: r.network.clone(),
                impact_score: r.assessment.impact_score,
                impact_level: r.assessment.impact_level,
                breakdown: r.assessment.breakdown,
            })
            .collect()
    });

    let entry = ImpactReportEntry {
        page_name: page_name(&page.url),
        url: page.url.clone(),
        status,
        iterations_completed: successes.len() as u32,
        iterations_failed: failed as u32,
        avg_performance,
        avg_network,
        impact_score,
        impact_level: impact_score.map(|s| scorer.level_for(s)),
        score_stats: ScoreStats::from_scores(&scores),
        recommendations: recs.iter().map(|r| r.message.clone()).collect(),
        iterations,
    };

    (entry, recs)
}

/// Union of per-page rules, most frequent first, ties broken by the worst severity seen
fn merge_recommendations(per_page: &[Vec<Recommendation>], measured_pages: usize) -> Vec<String> {
    let mut merged: HashMap<RuleKind, (usize, f64)> = HashMap::new();
    for recs in per_page {
        for rec in recs {
            let slot = merged.entry(rec.rule).or_insert((0, f64::NEG_INFINITY));
            slot.0 += 1;
            slot.1 = slot.1.max(rec.severity);
        }
    }

    let mut ranked: Vec<(RuleKind, usize, f64)> =
        merged.into_iter().map(|(rule, (n, sev))| (rule, n, sev)).collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.2.total_cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked
        .into_iter()
        .map(|(rule, n, _)| format!("{} ({} of {} measured page(s))", rule.advice(), n, measured_pages))
        .collect()
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}
