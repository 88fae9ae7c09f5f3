use super::output_json;
use super::session::{self, BrowserOptions, Session};
use crate::OutputFormat;
use anyhow::Result;
use extperf_core::page::{BlockingKind, PageState, PageStatus};
use std::path::Path;

pub fn execute(browser: &BrowserOptions, config_path: Option<&Path>, clear: bool, format: OutputFormat) -> Result<()> {
    let config = session::load_config(config_path)?;

    let runtime = session::runtime()?;
    let (state, cleared) = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let detector = session.page_state_detector(&config);

        let state = detector.classify().await;
        let cleared = if clear && state.can_auto_handle() {
            detector.resolve(&state).await?
        } else {
            false
        };
        Ok::<_, anyhow::Error>((state, cleared))
    })?;

    match format {
        OutputFormat::Json => {
            if clear {
                output_json(&serde_json::json!({ "pageState": state, "cleared": cleared }))?
            } else {
                output_json(&state)?
            }
        }
        OutputFormat::Table => output_table(&state),
        OutputFormat::Pretty => print_state(&state, clear.then_some(cleared)),
    }

    Ok(())
}

pub fn status_label(status: PageStatus) -> console::StyledObject<&'static str> {
    use console::style;

    match status {
        PageStatus::Normal => style(status.as_str()).green(),
        PageStatus::Blocked => style(status.as_str()).red().bold(),
        PageStatus::Unknown => style(status.as_str()).yellow(),
    }
}

pub fn print_state(state: &PageState, cleared: Option<bool>) {
    use console::style;

    println!("\n{}", style("Page State").bold().cyan());
    println!("{}", style("==========").cyan());
    println!("  State:        {}", status_label(state.state));
    println!("  Detection:    {:.1} ms", state.execution_time);

    if let Some(element) = &state.blocking_element {
        let kind = match element.kind {
            BlockingKind::BrowserDialog => "native dialog",
            BlockingKind::CustomModal => "in-page modal",
        };
        println!("  Blocked by:   {}", kind);
        if let Some(selector) = &element.selector {
            println!("  Selector:     {}", selector);
        }
        if !element.message.is_empty() {
            println!("  Message:      {}", element.message);
        }
        println!("  Auto-handle:  {}", if element.can_auto_handle { "yes" } else { "no" });
    }

    if let Some(cleared) = cleared {
        println!("  Cleared:      {}", if cleared { "yes" } else { "no" });
    }

    for rec in &state.recommendations {
        println!("  - {}", rec);
    }
    println!();
}

fn output_table(state: &PageState) {
    println!("Field,Value");
    println!("State,{}", state.state.as_str());
    println!("Blocked,{}", state.is_blocked);
    println!("Can Auto Handle,{}", state.can_auto_handle());
    println!("Detection Time (ms),{:.1}", state.execution_time);
}
