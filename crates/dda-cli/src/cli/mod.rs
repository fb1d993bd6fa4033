mod commands;
mod helpers;

use clap::Parser;
use dda_core::domain::BenchError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    init_logging();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let bench_error = error.as_bench_error();
            eprintln!("{}", bench_error.diagnostic_line());
            eprintln!("{}", bench_error.fatal_exit_line());
            bench_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("dda-bench".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

/// Pair lines go to stderr at `info`; `RUST_LOG` overrides the level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "dda-bench",
    version,
    about = "Run DDA cases through every engine and compare matching digits"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Run every case and compare engine pairs
    Run(commands::RunArgs),
    /// Parse and validate the command file and engine config without running
    Check(commands::CheckArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Run(args) => commands::run_bench_command(args),
        CliCommand::Check(args) => commands::run_check_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Bench(BenchError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<BenchError> for CliError {
    fn from(error: BenchError) -> Self {
        Self::Bench(error)
    }
}

impl CliError {
    fn as_bench_error(&self) -> BenchError {
        match self {
            Self::Usage(message) => {
                BenchError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Bench(error) => error.clone(),
            Self::Internal(error) => BenchError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
