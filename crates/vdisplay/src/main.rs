//! vdisplay entry point.
//!
//! ```text
//! main()
//!  └─ Cli::parse()              -- clap grammar, --help and --version
//!  └─ load_config()             -- TOML file, defaults when absent
//!  └─ tracing init              -- RUST_LOG > --debug > config log_level
//!  └─ XrandrExtension           -- wrapped in DryRunExtension for --dry-run
//!  └─ Dispatcher::run()         -- validate, then execute one command
//! ```
//!
//! Exit status: 0 on success, 2 for validation errors (nothing was changed),
//! 1 for operational errors from the display server or the config file.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vdisplay::application::dispatch::Dispatcher;
use vdisplay::application::extension::DisplayExtension;
use vdisplay::cli::Cli;
use vdisplay::infrastructure::extension::{DryRunExtension, XrandrExtension};
use vdisplay::infrastructure::storage::config::{load_config, AppConfig};

const EXIT_OPERATIONAL: u8 = 1;
const EXIT_VALIDATION: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()).context("failed to load configuration") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vdisplay: {e:#}");
            return ExitCode::from(EXIT_OPERATIONAL);
        }
    };

    init_logging(&cli, &config);
    debug!(?config, "configuration loaded");

    let settings = config.settings();
    let xrandr = XrandrExtension::new(config.extension.program.clone());
    let dry_run = cli.dry_run.then(|| DryRunExtension::new(&xrandr));
    let extension: &dyn DisplayExtension = match &dry_run {
        Some(dry) => dry,
        None => &xrandr,
    };

    let result = Dispatcher::new(extension, &settings).run(&cli.invocation());

    let code = match result {
        Ok(outcome) => {
            let text = outcome.to_string();
            if !text.is_empty() {
                println!("{text}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("vdisplay: {e}");
            if e.is_validation() {
                ExitCode::from(EXIT_VALIDATION)
            } else {
                ExitCode::from(EXIT_OPERATIONAL)
            }
        }
    };

    if let Some(dry) = &dry_run {
        println!("{}", dry.report());
    }
    code
}

/// Initialises structured logging on stderr.  `RUST_LOG` wins when set.
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = if cli.debug {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}
