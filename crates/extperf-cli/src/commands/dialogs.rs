use super::output_json;
use super::session::{self, BrowserOptions, Session};
use crate::OutputFormat;
use anyhow::{Context, Result};
use extperf_core::page::{DialogAction, DialogDetection};
use std::path::Path;
use std::time::Duration;

pub fn detect(browser: &BrowserOptions, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = session::load_config(config_path)?;

    let runtime = session::runtime()?;
    let detection = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let detector = session.page_state_detector(&config);
        detector.dialogs().detect().await.context("Dialog detection failed")
    })?;

    match format {
        OutputFormat::Json => output_json(&detection)?,
        OutputFormat::Table => output_table(&detection),
        OutputFormat::Pretty => output_pretty(&detection),
    }

    Ok(())
}

pub fn handle(
    browser: &BrowserOptions,
    config_path: Option<&Path>,
    action: DialogAction,
    selector: Option<&str>,
    timeout_ms: u64,
    format: OutputFormat,
) -> Result<()> {
    let config = session::load_config(config_path)?;

    let runtime = session::runtime()?;
    let handled = runtime.block_on(async {
        let session = Session::open(browser).await?;
        let detector = session.page_state_detector(&config);
        detector
            .dialogs()
            .handle(action, selector, Duration::from_millis(timeout_ms))
            .await
            .with_context(|| format!("Could not {} dialog", action.as_str()))
    })?;

    match format {
        OutputFormat::Json => output_json(&serde_json::json!({
            "action": action,
            "selector": selector,
            "handled": handled,
        }))?,
        OutputFormat::Table => {
            println!("Action,Handled");
            println!("{},{}", action.as_str(), handled);
        }
        OutputFormat::Pretty => {
            if handled {
                println!("Dialog handled ({})", action.as_str());
            } else {
                println!("No dialog to {}", action.as_str());
            }
        }
    }

    Ok(())
}

fn output_pretty(detection: &DialogDetection) {
    use console::style;

    println!("\n{}", style("Dialogs").bold().cyan());
    println!("{}", style("=======").cyan());

    match &detection.browser_dialog {
        Some(native) => println!(
            "  Native dialog:  {} \"{}\"",
            style(native.kind.as_str()).bold(),
            native.message
        ),
        None => println!("  Native dialog:  none"),
    }
    println!("  In-page:        {}", detection.summary.custom_dialog_count);

    for (i, dialog) in detection.custom_dialogs.iter().enumerate() {
        println!(
            "\n  {}. <{}> {}",
            i + 1,
            dialog.element.tag_name,
            dialog.selector.as_deref().unwrap_or("(no selector)")
        );
        if !dialog.message.is_empty() {
            println!("     {}", dialog.message);
        }
        for button in &dialog.buttons {
            println!("     [{}] {:?}", button.label, button.role);
        }
    }
    println!();
}

fn output_table(detection: &DialogDetection) {
    println!("Selector,Tag,Buttons,Message");
    for dialog in &detection.custom_dialogs {
        println!(
            "{},{},{},\"{}\"",
            dialog.selector.as_deref().unwrap_or_default(),
            dialog.element.tag_name,
            dialog.buttons.len(),
            dialog.message.replace('"', "\"\"")
        );
    }
    if let Some(native) = &detection.browser_dialog {
        println!(",{},0,\"{}\"", native.kind.as_str(), native.message.replace('"', "\"\""));
    }
}
