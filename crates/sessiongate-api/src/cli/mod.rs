//! CLI command definitions for the `sgate` binary.

pub mod config;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run the multi-user chat session gateway.
#[derive(Parser)]
#[command(name = "sgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON (command output and log lines).
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true, env = "SESSIONGATE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000", env = "SESSIONGATE_PORT")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1", env = "SESSIONGATE_HOST")]
        host: String,
    },

    /// Print the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Log filter implied by `--quiet` and `-v`.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,sessiongate=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filter() {
        let cli = Cli::parse_from(["sgate", "config"]);
        assert_eq!(cli.log_filter(), "info");
        let cli = Cli::parse_from(["sgate", "-v", "config"]);
        assert_eq!(cli.log_filter(), "info,sessiongate=debug");
        let cli = Cli::parse_from(["sgate", "--quiet", "config"]);
        assert_eq!(cli.log_filter(), "error");
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["sgate", "serve", "--port", "8080"]);
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, 8080);
                assert_eq!(host, "127.0.0.1");
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
