use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use extperf_browser::DEFAULT_DEBUGGING_PORT;
use extperf_cli::OutputFormat;
use extperf_cli::commands;
use extperf_cli::commands::session::BrowserOptions;
use extperf_core::page::DialogAction;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "extperf")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Measure the performance and network impact of a browser extension",
    long_about = "extperf loads pages in Chrome with an extension installed, compares them against a \
                  neutral baseline, and scores the extension's CPU, memory, script, web-vitals and \
                  network cost. It can also detect and clear dialogs that block unattended runs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// JSON config file (defaults to ~/.extperf/config.json when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chrome remote debugging port to attach to (or to launch on with --extension-path)
    #[arg(long, global = true, env = "EXTPERF_DEBUG_PORT", default_value_t = DEFAULT_DEBUGGING_PORT)]
    port: u16,

    /// Launch Chrome with this unpacked extension instead of attaching to a running instance
    #[arg(long, global = true, value_name = "DIR")]
    extension_path: Option<PathBuf>,

    /// Custom Chrome binary path (used with --extension-path)
    #[arg(long, global = true, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// Named profile under ~/.extperf/profiles (temporary profile if omitted)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Launch Chrome headless (used with --extension-path)
    #[arg(long, global = true)]
    headless: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure CPU, memory, script and web-vitals deltas for one page load
    Analyze {
        /// ID of the extension under test
        #[arg(long, env = "EXTPERF_EXTENSION_ID")]
        extension_id: String,

        /// Page to load
        #[arg(long)]
        url: String,

        /// How long to hold the page after navigation, in ms
        #[arg(long, default_value_t = 5000)]
        duration: u64,

        /// Also wait for the page to go idle before closing the sample
        #[arg(long)]
        wait_for_idle: bool,
    },

    /// Record network activity for a fixed window
    Network {
        /// ID of the extension under test
        #[arg(long, env = "EXTPERF_EXTENSION_ID")]
        extension_id: String,

        /// Monitoring window, in ms
        #[arg(long, default_value_t = 10000)]
        duration: u64,

        /// Navigate here once listening has started
        #[arg(long)]
        url: Option<String>,

        /// Include every request in the output
        #[arg(long)]
        include_requests: bool,
    },

    /// Score an extension across several pages and iterations
    Impact {
        /// ID of the extension under test
        #[arg(long, env = "EXTPERF_EXTENSION_ID")]
        extension_id: String,

        /// Test page (repeatable; defaults to testPages from the config file)
        #[arg(long = "page", value_name = "URL")]
        pages: Vec<String>,

        /// Iterations per page
        #[arg(long, default_value_t = 3)]
        iterations: u32,

        /// Performance hold per iteration, in ms
        #[arg(long, default_value_t = 5000)]
        performance_duration: u64,

        /// Network window per iteration, in ms
        #[arg(long, default_value_t = 10000)]
        network_duration: u64,

        /// Attach per-iteration records with raw request lists
        #[arg(long)]
        include_network_details: bool,

        /// Clear blocking dialogs before each step
        #[arg(long)]
        guard: bool,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify the current page as normal, blocked or unknown
    PageState {
        /// Clear the block when it is safe to do so
        #[arg(long)]
        clear: bool,
    },

    /// Watch the page state and optionally clear blocks as they appear
    Monitor {
        /// Detection interval, in ms
        #[arg(long, default_value_t = 1000)]
        interval: u64,

        /// Clear auto-handleable blocks
        #[arg(long)]
        auto_handle: bool,

        /// Stop after this many ms (runs until Ctrl-C otherwise)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Detect or handle dialogs on the current page
    Dialogs {
        #[command(subcommand)]
        action: DialogsCommand,
    },

    /// Show the effective configuration
    Config,

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for extperf.

SUPPORTED SHELLS:
  bash, zsh, fish, powershell, elvish

INSTALLATION:
  bash:  extperf completion --shell bash > ~/.local/share/bash-completion/completions/extperf
         (or source it from ~/.bashrc)
  zsh:   extperf completion --shell zsh > \"${fpath[1]}/_extperf\"
         (make sure compinit runs in ~/.zshrc)
  fish:  extperf completion --shell fish > ~/.config/fish/completions/extperf.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum DialogsCommand {
    /// List native and in-page dialogs
    Detect,

    /// Accept or dismiss a dialog
    Handle {
        #[arg(value_enum)]
        action: DialogChoice,

        /// Selector of the in-page dialog (first one if omitted)
        #[arg(long)]
        selector: Option<String>,

        /// Time allowed for the action, in ms
        #[arg(long, default_value_t = 5000)]
        timeout: u64,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum DialogChoice {
    Accept,
    Dismiss,
}

impl From<DialogChoice> for DialogAction {
    fn from(choice: DialogChoice) -> Self {
        match choice {
            DialogChoice::Accept => DialogAction::Accept,
            DialogChoice::Dismiss => DialogAction::Dismiss,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let browser = BrowserOptions {
        port: cli.port,
        extension_path: cli.extension_path.clone(),
        chrome_path: cli.chrome_path.clone(),
        profile: cli.profile.clone(),
        headless: cli.headless,
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Analyze {
            extension_id,
            url,
            duration,
            wait_for_idle,
        } => commands::analyze::execute(
            &browser,
            config_path,
            &extension_id,
            &url,
            duration,
            wait_for_idle,
            cli.format,
        ),
        Commands::Network {
            extension_id,
            duration,
            url,
            include_requests,
        } => commands::network::execute(
            &browser,
            config_path,
            &extension_id,
            duration,
            url.as_deref(),
            include_requests,
            cli.format,
        ),
        Commands::Impact {
            extension_id,
            pages,
            iterations,
            performance_duration,
            network_duration,
            include_network_details,
            guard,
            output,
        } => commands::impact::execute(
            &browser,
            config_path,
            commands::impact::ImpactArgs {
                extension_id,
                pages,
                iterations,
                performance_duration,
                network_duration,
                include_network_details,
                guard,
                output,
            },
            cli.format,
        ),
        Commands::PageState { clear } => commands::page_state::execute(&browser, config_path, clear, cli.format),
        Commands::Monitor {
            interval,
            auto_handle,
            duration,
        } => commands::monitor::execute(&browser, config_path, interval, auto_handle, duration, cli.format),
        Commands::Dialogs { action } => match action {
            DialogsCommand::Detect => commands::dialogs::detect(&browser, config_path, cli.format),
            DialogsCommand::Handle {
                action,
                selector,
                timeout,
            } => commands::dialogs::handle(
                &browser,
                config_path,
                action.into(),
                selector.as_deref(),
                timeout,
                cli.format,
            ),
        },
        Commands::Config => commands::config::execute(config_path, cli.format),
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "extperf=debug,extperf_cli=debug,extperf_core=debug,extperf_browser=debug,\
             extperf_detectors=debug,extperf_measure=debug",
        )
    } else {
        EnvFilter::new("extperf=info,extperf_cli=info,extperf_measure=warn,extperf_detectors=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
