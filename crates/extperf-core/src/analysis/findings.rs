use super::ScoreBreakdown;
use crate::report::{EntryStatus, FailureRecord, ImpactReportEntry, OverallImpact};

/// A page's request count must exceed this multiple of the other pages' mean to be called out
const NETWORK_OUTLIER_FACTOR: f64 = 2.0;
/// Fewer requests than this are never called out, however lopsided the ratio
const NETWORK_OUTLIER_FLOOR: f64 = 10.0;
/// Iteration score spread (std dev, in score points) above which a page is flagged as unstable
const UNSTABLE_STD_DEV: f64 = 15.0;

/// Human-readable headline statements for a report
pub fn key_findings(
    entries: &[ImpactReportEntry],
    overall: &OverallImpact,
    overall_breakdown: Option<&ScoreBreakdown>,
    failures: &[FailureRecord],
) -> Vec<String> {
    let mut findings = Vec::new();

    match (overall.overall_impact_score, overall.overall_impact_level) {
        (Some(score), Some(level)) => findings.push(format!(
            "Overall impact is {} ({:.1}/100) across {} measured page(s)",
            level, score, overall.pages_measured
        )),
        _ => findings.push("No page could be measured; overall impact is unknown".to_string()),
    }

    if let Some((driver, points)) = overall_breakdown.and_then(ScoreBreakdown::dominant) {
        findings.push(format!(
            "{} is the main contributor to the overall score ({:.1} points)",
            capitalize(driver),
            points
        ));
    }

    let measured: Vec<&ImpactReportEntry> =
        entries.iter().filter(|e| e.impact_score.is_some()).collect();

    if measured.len() > 1
        && let Some(worst) = measured
            .iter()
            .max_by(|a, b| score_of(a).total_cmp(&score_of(b)))
        && let Some(level) = worst.impact_level
    {
        findings.push(format!(
            "Highest impact on {} ({:.1}, {})",
            worst.page_name,
            score_of(worst),
            level
        ));
    }

    findings.extend(network_outliers(&measured));

    for entry in &measured {
        if let Some(stats) = entry.score_stats
            && stats.std_dev > UNSTABLE_STD_DEV
        {
            findings.push(format!(
                "Scores on {} vary widely between iterations (std dev {:.1}); consider more iterations",
                entry.page_name, stats.std_dev
            ));
        }
    }

    for entry in entries {
        let attempted = entry.iterations_completed + entry.iterations_failed;
        match entry.status {
            EntryStatus::Failed => {
                let reason = failures
                    .iter()
                    .find(|f| f.url == entry.url)
                    .map(|f| format!(": {}", f.error))
                    .unwrap_or_default();
                findings.push(format!(
                    "{} could not be measured and is excluded from the overall score{}",
                    entry.page_name, reason
                ));
            }
            EntryStatus::Partial => findings.push(format!(
                "{}: {} of {} iterations failed and were excluded",
                entry.page_name, entry.iterations_failed, attempted
            )),
            EntryStatus::Completed => {}
        }
    }

    findings
}

fn network_outliers(measured: &[&ImpactReportEntry]) -> Vec<String> {
    if measured.len() < 2 {
        return Vec::new();
    }

    let requests: Vec<f64> = measured
        .iter()
        .map(|e| e.avg_network.as_ref().map_or(0.0, |n| n.total_requests))
        .collect();
    let total: f64 = requests.iter().sum();
    let others = (measured.len() - 1) as f64;

    measured
        .iter()
        .zip(&requests)
        .filter_map(|(entry, &own)| {
            let rest = (total - own) / others;
            let outlier = own >= NETWORK_OUTLIER_FLOOR && own > rest * NETWORK_OUTLIER_FACTOR;
            outlier.then(|| {
                format!(
                    "{} shows disproportionate network overhead: {:.0} requests per load vs {:.0} on other pages",
                    entry.page_name, own, rest
                )
            })
        })
        .collect()
}

fn score_of(entry: &ImpactReportEntry) -> f64 {
    entry.impact_score.unwrap_or(0.0)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImpactLevel;

    fn overall(score: Option<f64>) -> OverallImpact {
        OverallImpact {
            avg_performance: None,
            avg_network: None,
            overall_impact_score: score,
            overall_impact_level: score.map(|_| ImpactLevel::Low),
            pages_measured: usize::from(score.is_some()),
            pages_failed: 0,
        }
    }

    #[test]
    fn test_no_measured_pages() {
        let findings = key_findings(&[], &overall(None), None, &[]);
        assert_eq!(findings, vec!["No page could be measured; overall impact is unknown"]);
    }

    #[test]
    fn test_dominant_driver_is_named() {
        let breakdown = ScoreBreakdown {
            cpu: 4.0,
            execution_time: 9.0,
            ..Default::default()
        };
        let findings = key_findings(&[], &overall(Some(13.0)), Some(&breakdown), &[]);

        assert!(findings[0].starts_with("Overall impact is low (13.0/100)"));
        assert_eq!(
            findings[1],
            "Script execution time is the main contributor to the overall score (9.0 points)"
        );
    }

    #[test]
    fn test_zero_breakdown_names_no_driver() {
        let findings = key_findings(&[], &overall(Some(0.0)), Some(&ScoreBreakdown::default()), &[]);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("layout shift"), "Layout shift");
        assert_eq!(capitalize("CPU usage"), "CPU usage");
        assert_eq!(capitalize(""), "");
    }
}
