use super::session::{self, BrowserOptions, Session};
use super::{format_bytes, output_json, require_absolute_url};
use crate::OutputFormat;
use anyhow::{Context, Result, bail};
use extperf_core::network::NetworkSummary;
use extperf_measure::NetworkTracker;
use std::path::Path;
use std::time::Duration;

pub fn execute(
    browser: &BrowserOptions,
    config_path: Option<&Path>,
    extension_id: &str,
    duration_ms: u64,
    url: Option<&str>,
    include_requests: bool,
    format: OutputFormat,
) -> Result<()> {
    if let Some(url) = url {
        require_absolute_url(url)?;
    }
    if duration_ms == 0 {
        bail!("--duration must be greater than 0");
    }
    let config = session::load_config(config_path)?;

    let runtime = session::runtime()?;
    let summary = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let tracker = NetworkTracker::new(session.driver(), config.timeouts);
        tracker
            .track(extension_id, Duration::from_millis(duration_ms), url, include_requests)
            .await
            .context("Network tracking failed")
    })?;

    match format {
        OutputFormat::Json => output_json(&summary)?,
        OutputFormat::Table => output_table(&summary),
        OutputFormat::Pretty => output_pretty(&summary),
    }

    Ok(())
}

fn output_pretty(summary: &NetworkSummary) {
    use console::style;

    println!("\n{}", style("Network Activity").bold().cyan());
    println!("{}", style("================").cyan());
    if let Some(url) = &summary.test_url {
        println!("  Page:               {}", url);
    }
    println!("  Window:             {} ms", summary.monitoring_duration);
    println!("  Total Requests:     {}", summary.total_requests);
    println!(
        "  Data Transferred:   {}",
        format_bytes(summary.total_data_transferred as f64)
    );
    println!("  Avg Request Time:   {:.2} ms", summary.average_request_time);
    println!("  Failed:             {}", summary.statistics.failed_requests);
    println!("  Cached:             {}", summary.statistics.cached_requests);
    println!("  From Extension:     {}", summary.statistics.extension_requests);

    if !summary.requests_by_type.is_empty() {
        println!("\n{}", style("By Type:").bold());
        for (kind, count) in &summary.requests_by_type {
            println!("  {:<12} {}", kind, count);
        }
    }

    if let Some(requests) = &summary.requests {
        println!("\n{}", style("Requests:").bold());
        for req in requests {
            let status = req
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string());
            let timing = req
                .duration_ms
                .map(|d| format!("{:.0} ms", d))
                .unwrap_or_else(|| "-".to_string());
            let line = format!("  {} {} [{}] {} {}", status, req.method, timing, req.category.as_str(), req.url);
            if req.failed {
                println!("{}", style(line).red());
            } else {
                println!("{}", line);
            }
        }
    }

    println!();
}

fn output_table(summary: &NetworkSummary) {
    println!("Metric,Value");
    println!("Total Requests,{}", summary.total_requests);
    println!("Data Transferred (bytes),{}", summary.total_data_transferred);
    println!("Average Request Time (ms),{:.2}", summary.average_request_time);
    println!("Failed Requests,{}", summary.statistics.failed_requests);
    println!("Cached Requests,{}", summary.statistics.cached_requests);
    println!("Extension Requests,{}", summary.statistics.extension_requests);
    for (kind, count) in &summary.requests_by_type {
        println!("Requests ({}),{}", kind, count);
    }
}
