use super::output_json;
use super::session;
use crate::OutputFormat;
use anyhow::Result;
use extperf_core::config::ExtperfConfig;
use std::path::Path;

pub fn execute(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = session::load_config(config_path)?;

    match format {
        OutputFormat::Json => output_json(&config)?,
        OutputFormat::Table => output_table(&config),
        OutputFormat::Pretty => output_pretty(&config, config_path),
    }

    Ok(())
}

fn output_pretty(config: &ExtperfConfig, config_path: Option<&Path>) {
    use console::style;

    println!("\n{}", style("Configuration").bold().cyan());
    println!("{}", style("=============").cyan());
    match config_path.map(Path::to_path_buf).or_else(session::default_config_path) {
        Some(path) if path.exists() => println!("  Source: {}", path.display()),
        _ => println!("  Source: built-in defaults"),
    }

    let t = &config.timeouts;
    println!("\n{}", style("Timeouts (ms):").bold());
    println!("  Navigation:     {}", t.navigation_ms);
    println!("  Evaluation:     {}", t.evaluation_ms);
    println!("  Detection:      {}", t.detection_ms);
    println!("  Settle:         {}", t.settle_ms);
    println!("  Sample window:  {}", t.sample_window_ms);
    println!("  Idle cap:       {}", t.idle_cap_ms);
    println!("  Idle poll:      {}", t.idle_poll_ms);
    println!("  Network grace:  {}", t.network_grace_ms);

    let s = &config.scoring;
    println!("\n{}", style("Scoring (weight / cap):").bold());
    let components = [
        ("CPU", s.cpu),
        ("Memory", s.memory),
        ("Execution time", s.execution_time),
        ("LCP", s.lcp),
        ("CLS", s.cls),
        ("Requests", s.requests),
        ("Bytes", s.bytes),
    ];
    for (name, c) in components {
        println!("  {:<15} {:.3} / {}", name, c.weight, c.cap);
    }
    println!(
        "  Levels:         low {} / moderate {} / high {} / severe {}",
        s.levels.low, s.levels.moderate, s.levels.high, s.levels.severe
    );

    if !config.test_pages.is_empty() {
        println!("\n{}", style("Test pages:").bold());
        for page in &config.test_pages {
            println!("  {}", page);
        }
    }
    println!();
}

fn output_table(config: &ExtperfConfig) {
    let t = &config.timeouts;
    println!("Setting,Value");
    println!("timeouts.navigationMs,{}", t.navigation_ms);
    println!("timeouts.evaluationMs,{}", t.evaluation_ms);
    println!("timeouts.detectionMs,{}", t.detection_ms);
    println!("timeouts.settleMs,{}", t.settle_ms);
    println!("timeouts.sampleWindowMs,{}", t.sample_window_ms);
    println!("timeouts.idleCapMs,{}", t.idle_cap_ms);
    println!("timeouts.idlePollMs,{}", t.idle_poll_ms);
    println!("timeouts.networkGraceMs,{}", t.network_grace_ms);
    println!("testPages,{}", config.test_pages.len());
}
