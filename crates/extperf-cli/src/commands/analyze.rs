use super::session::{self, BrowserOptions, Session};
use super::{output_json, require_absolute_url};
use crate::OutputFormat;
use anyhow::{Context, Result, bail};
use extperf_core::metrics::PerformanceMeasurement;
use extperf_measure::{MIN_RELIABLE_DURATION_MS, MetricsCollector};
use std::path::Path;
use std::time::Duration;

pub fn execute(
    browser: &BrowserOptions,
    config_path: Option<&Path>,
    extension_id: &str,
    url: &str,
    duration_ms: u64,
    wait_for_idle: bool,
    format: OutputFormat,
) -> Result<()> {
    require_absolute_url(url)?;
    if duration_ms == 0 {
        bail!("--duration must be greater than 0");
    }
    let config = session::load_config(config_path)?;

    tracing::info!("Analyzing {} with extension {}", url, extension_id);

    let runtime = session::runtime()?;
    let measurement = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let collector = MetricsCollector::new(session.driver(), config.timeouts);
        collector
            .measure(extension_id, url, Duration::from_millis(duration_ms), wait_for_idle)
            .await
            .with_context(|| format!("Performance measurement of {} failed", url))
    })?;

    match format {
        OutputFormat::Json => output_json(&measurement)?,
        OutputFormat::Table => output_table(&measurement),
        OutputFormat::Pretty => output_pretty(&measurement),
    }

    Ok(())
}

fn output_pretty(m: &PerformanceMeasurement) {
    use console::style;

    println!("\n{}", style("Extension Performance").bold().cyan());
    println!("{}", style("=====================").cyan());
    println!("  Extension:  {}", m.extension_id);
    println!("  Page:       {}", m.test_url);
    println!("  Duration:   {} ms", m.duration_ms);
    if m.duration_ms < MIN_RELIABLE_DURATION_MS {
        println!("  {}", style("Short duration, expect noisy deltas").yellow());
    }
    if m.idle_reached {
        println!("  Idle:       reached");
    }

    println!(
        "\n  {:<16} {:>12} {:>14} {:>12}",
        style("Metric").bold(),
        style("Baseline").bold(),
        style("With extension").bold(),
        style("Delta").bold()
    );
    let rows = [
        ("CPU (%)", m.baseline.cpu_usage, m.with_extension.cpu_usage, m.delta.cpu_usage),
        ("Memory (MB)", m.baseline.memory_usage, m.with_extension.memory_usage, m.delta.memory_usage),
        ("Script (ms)", m.baseline.execution_time, m.with_extension.execution_time, m.delta.execution_time),
        ("LCP (ms)", m.baseline.lcp, m.with_extension.lcp, m.delta.lcp),
    ];
    for (name, before, after, delta) in rows {
        println!("  {:<16} {:>12.2} {:>14.2} {:>+12.2}", name, before, after, delta);
    }
    println!(
        "  {:<16} {:>12.3} {:>14.3} {:>+12.3}",
        "CLS", m.baseline.cls, m.with_extension.cls, m.delta.cls
    );

    println!();
}

fn output_table(m: &PerformanceMeasurement) {
    println!("Metric,Baseline,With Extension,Delta");
    println!("CPU (%),{:.2},{:.2},{:.2}", m.baseline.cpu_usage, m.with_extension.cpu_usage, m.delta.cpu_usage);
    println!(
        "Memory (MB),{:.2},{:.2},{:.2}",
        m.baseline.memory_usage, m.with_extension.memory_usage, m.delta.memory_usage
    );
    println!(
        "Script (ms),{:.2},{:.2},{:.2}",
        m.baseline.execution_time, m.with_extension.execution_time, m.delta.execution_time
    );
    println!("LCP (ms),{:.2},{:.2},{:.2}", m.baseline.lcp, m.with_extension.lcp, m.delta.lcp);
    println!("CLS,{:.3},{:.3},{:.3}", m.baseline.cls, m.with_extension.cls, m.delta.cls);
}
