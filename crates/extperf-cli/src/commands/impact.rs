use super::session::{self, BrowserOptions, Session};
use super::{format_bytes, output_json, require_absolute_url};
use crate::OutputFormat;
use anyhow::{Context, Result, bail};
use extperf_core::analysis::ImpactScorer;
use extperf_core::report::{EntryStatus, ImpactReport, ReportWriter};
use extperf_measure::{ImpactOrchestrator, ImpactRun};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct ImpactArgs {
    pub extension_id: String,
    pub pages: Vec<String>,
    pub iterations: u32,
    pub performance_duration: u64,
    pub network_duration: u64,
    pub include_network_details: bool,
    pub guard: bool,
    pub output: Option<PathBuf>,
}

/// Pages given on the command line win over the config file's `testPages`
pub fn resolve_pages(cli_pages: &[String], config_pages: &[String]) -> Result<Vec<String>> {
    let pages = if cli_pages.is_empty() { config_pages } else { cli_pages };
    if pages.is_empty() {
        bail!("No test pages given. Pass --page <URL> or set testPages in the config file");
    }
    for page in pages {
        require_absolute_url(page)?;
    }
    Ok(pages.to_vec())
}

pub fn execute(
    browser: &BrowserOptions,
    config_path: Option<&Path>,
    args: ImpactArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = session::load_config(config_path)?;
    let pages = resolve_pages(&args.pages, &config.test_pages)?;
    if args.iterations == 0 {
        bail!("--iterations must be greater than 0");
    }
    if args.performance_duration == 0 || args.network_duration == 0 {
        bail!("--performance-duration and --network-duration must be greater than 0");
    }

    let run = ImpactRun {
        extension_id: args.extension_id.clone(),
        test_pages: pages,
        iterations: args.iterations,
        performance_duration: Duration::from_millis(args.performance_duration),
        network_duration: Duration::from_millis(args.network_duration),
        include_network_details: args.include_network_details,
    };

    let total = run.test_pages.len() as u64 * run.iterations as u64;
    let progress = if format == OutputFormat::Pretty {
        ProgressBar::new(total)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let runtime = session::runtime()?;
    let report = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let scorer = ImpactScorer::new(config.scoring.clone());

        let bar = progress.clone();
        let pages = run.test_pages.clone();
        let mut orchestrator = ImpactOrchestrator::new(session.driver(), config.timeouts, scorer)
            .on_progress(move |p| {
                bar.set_position(p.completed);
                bar.set_message(format!("{} #{}", pages[p.page_index], p.iteration));
            });
        if args.guard {
            orchestrator = orchestrator.with_page_guard(Arc::new(session.page_state_detector(&config)));
        }

        orchestrator.run(&run).await.context("Impact run failed")
    })?;
    progress.finish_and_clear();

    if let Some(path) = &args.output {
        ReportWriter::to_file(&report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    match format {
        OutputFormat::Json => output_json(&report)?,
        OutputFormat::Table => output_table(&report),
        OutputFormat::Pretty => output_pretty(&report),
    }

    Ok(())
}

fn output_pretty(report: &ImpactReport) {
    use console::style;

    println!("\n{}", style("Extension Impact Report").bold().cyan());
    println!("{}", style("=======================").cyan());
    println!("  Extension:   {}", report.extension_id);
    println!(
        "  Tests:       {} ({} page(s) x {} iteration(s))",
        report.configuration.total_tests, report.configuration.total_pages, report.configuration.iterations_per_page
    );

    match (report.overall.overall_impact_score, report.overall.overall_impact_level) {
        (Some(score), Some(level)) => {
            println!("  Impact:      {} ({:.1}/100)", style(level.as_str()).bold(), score)
        }
        _ => println!("  Impact:      {}", style("unknown").red()),
    }

    println!("\n{}", style("Pages:").bold());
    for entry in &report.page_results {
        match (entry.impact_score, entry.impact_level) {
            (Some(score), Some(level)) => {
                let line = format!("  {:<40} {:>5.1}  {}", entry.page_name, score, level.as_str());
                if entry.status == EntryStatus::Partial {
                    println!("{} {}", line, style(format!("({} failed)", entry.iterations_failed)).yellow());
                } else {
                    println!("{}", line);
                }
                if let Some(net) = &entry.avg_network {
                    println!(
                        "      {:.1} requests, {}, {:.0} ms avg",
                        net.total_requests,
                        format_bytes(net.total_data_transferred),
                        net.average_request_time
                    );
                }
            }
            _ => println!("  {:<40} {}", entry.page_name, style("failed").red()),
        }
    }

    if !report.key_findings.is_empty() {
        println!("\n{}", style("Key Findings:").bold());
        for finding in &report.key_findings {
            println!("  - {}", finding);
        }
    }

    if !report.recommendations.is_empty() {
        println!("\n{}", style("Recommendations:").bold());
        for (i, rec) in report.recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
    }

    if !report.failures.is_empty() {
        println!("\n{}", style("Failures:").bold().red());
        for failure in &report.failures {
            println!(
                "  {} #{} [{}] {}: {}",
                failure.page, failure.iteration, failure.operation, failure.kind, failure.error
            );
        }
    }

    println!();
}

fn output_table(report: &ImpactReport) {
    println!("Page,Status,Iterations Completed,Iterations Failed,Impact Score,Impact Level");
    for entry in &report.page_results {
        println!(
            "{},{},{},{},{},{}",
            entry.url,
            match entry.status {
                EntryStatus::Completed => "completed",
                EntryStatus::Partial => "partial",
                EntryStatus::Failed => "failed",
            },
            entry.iterations_completed,
            entry.iterations_failed,
            entry
                .impact_score
                .map(|s| format!("{:.1}", s))
                .unwrap_or_default(),
            entry.impact_level.map(|l| l.as_str()).unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_pages_override_config() {
        let cli = vec!["https://a.example/".to_string()];
        let config = vec!["https://b.example/".to_string()];
        assert_eq!(resolve_pages(&cli, &config).unwrap(), cli);
        assert_eq!(resolve_pages(&[], &config).unwrap(), config);
    }

    #[test]
    fn test_no_pages_is_an_error() {
        let err = resolve_pages(&[], &[]).unwrap_err();
        assert!(err.to_string().contains("No test pages"));
    }

    #[test]
    fn test_relative_page_is_rejected() {
        assert!(resolve_pages(&["shop.example".to_string()], &[]).is_err());
    }
}
