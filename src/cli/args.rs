//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Luna - chat with whichever LLM is reachable, one typed character at a time.
#[derive(Parser, Debug)]
#[command(name = "luna")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Config file to use instead of the platform default
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Credentials document (JSON object of provider id to API key)
    #[arg(long, value_name = "PATH", global = true)]
    pub credentials: Option<PathBuf>,

    /// Preferred provider when it is available
    #[arg(long, value_name = "ID", global = true)]
    pub provider: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat (default command)
    Chat,

    /// Send one message, render the reply and exit
    Say(SayArgs),

    /// Check which providers are reachable right now
    Probe(ProbeArgs),

    /// List registered providers
    Providers,
}

/// Arguments for the `say` command.
#[derive(Parser, Debug)]
pub struct SayArgs {
    /// Message to send
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

impl SayArgs {
    #[must_use]
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

/// Arguments for the `probe` command.
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
