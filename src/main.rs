mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Commands;
use mnemos::{Config, Error};
use output::{print_json, ErrorResponse};

/// Environment variable holding the log filter directive.
const LOG_ENV_VAR: &str = "MNEMOS_LOG";

/// mnemos - per-user conversational memory
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User whose memory to operate on
    #[arg(short, long, global = true, default_value = "default")]
    user: String,

    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    /// Log debug detail to stderr (overridden by MNEMOS_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    if let Commands::Version = cli.command {
        return commands::handle_version(cli.json);
    }

    let config = Config::load()?;
    config.ensure_directories()?;
    commands::execute(&cli.command, &config, &cli.user, cli.json)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                print_json(&ErrorResponse {
                    error: e.to_string(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}
