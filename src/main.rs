//! luna - CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use luna::cli::{AppContext, Cli, Commands};
use luna::core::logging::{self, LogSettings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&LogSettings::from_flags(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
    ));

    let json_errors = cli.json_output;
    let no_color = !luna::util::env::should_use_color(cli.no_color)
        || !luna::util::env::stderr_is_tty();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        // The notice is already on stdout; details stay in the logs.
        Err(e) if e.is_rendered_as_notice() => {
            tracing::info!(code = e.error_code(), "Exiting after notice");
            ExitCode::from(e.exit_code() as u8)
        }
        Err(e) => {
            tracing::error!(code = e.error_code(), "{}", e);
            eprintln!("{}", luna::render::render_error(&e, json_errors, no_color));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> luna::Result<()> {
    let ctx = AppContext::load(&cli)?;

    match cli.command {
        None | Some(Commands::Chat) => luna::cli::chat::execute(&ctx).await,
        Some(Commands::Say(args)) => luna::cli::say::execute(&ctx, &args).await,
        Some(Commands::Probe(args)) => luna::cli::probe::execute(&ctx, &args).await,
        Some(Commands::Providers) => {
            luna::cli::providers::execute(&ctx);
            Ok(())
        }
    }
}
