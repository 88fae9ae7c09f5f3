use super::output_json;
use super::page_state::status_label;
use super::session::{self, BrowserOptions, Session};
use crate::OutputFormat;
use anyhow::{Result, bail};
use extperf_detectors::{MonitorOptions, PageStateMonitor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn execute(
    browser: &BrowserOptions,
    config_path: Option<&Path>,
    interval_ms: u64,
    auto_handle: bool,
    duration_ms: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    if interval_ms == 0 {
        bail!("--interval must be greater than 0");
    }
    let config = session::load_config(config_path)?;

    let runtime = session::runtime()?;
    let (status, outcome) = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let monitor = PageStateMonitor::new(Arc::new(session.page_state_detector(&config)));

        let started = Instant::now();
        let live = format == OutputFormat::Pretty;
        let options = MonitorOptions::new(Duration::from_millis(interval_ms))
            .auto_handle(auto_handle)
            .on_state_change(move |state, previous| {
                if live {
                    println!(
                        "[{:>7.1}s] {} -> {}",
                        started.elapsed().as_secs_f64(),
                        status_label(previous.state),
                        status_label(state.state)
                    );
                }
                tracing::debug!("State change: {:?}", state.blocking_element);
            });

        let initial = monitor.start(options).await?;
        if live {
            let state = initial.last_state.as_ref().map(|s| s.state.as_str()).unwrap_or("unknown");
            println!("Monitoring every {} ms (page is {}), Ctrl-C to stop", interval_ms, state);
        }

        match duration_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => tokio::signal::ctrl_c().await?,
        }

        let outcome = monitor.stop().await;
        let status = monitor.status().await;
        Ok::<_, anyhow::Error>((status, outcome))
    })?;

    match format {
        OutputFormat::Json => output_json(&serde_json::json!({ "status": status, "stopped": outcome }))?,
        OutputFormat::Table => {
            println!("Metric,Value");
            println!("Ticks,{}", status.ticks);
            println!("Remediations,{}", status.remediations);
            println!(
                "Last State,{}",
                status.last_state.as_ref().map(|s| s.state.as_str()).unwrap_or("unknown")
            );
        }
        OutputFormat::Pretty => {
            use console::style;
            println!("\n{}", style("Monitoring stopped").bold());
            println!("  Ticks:         {}", status.ticks);
            println!("  Remediations:  {}", status.remediations);
            if let Some(state) = &status.last_state {
                println!("  Last state:    {}", status_label(state.state));
            }
            println!();
        }
    }

    Ok(())
}
