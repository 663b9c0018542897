#![doc = include_str!("../README.md")]

mod config;
mod context;
mod enricher;
mod errors;
mod monitor;
mod pipeline;
mod queue;
mod sinks;
mod sources;
mod tools;
mod workers;

use std::{ffi::OsString, path::PathBuf};

use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use errors::{IntoDiagnostic, Result};
use init_tracing_opentelemetry::{Guard, TracingConfig};
use tokio_util::sync::CancellationToken;

// Use Jemalloc only for musl-64 bits platforms
// see [Default musl allocator considered harmful (to performance)](https://nickb.dev/blog/default-musl-allocator-considered-harmful-to-performance/)
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Debug, Clone, Parser)]
#[command(
    flatten_help = true,
    version,
    about,
    long_about = "stream-loader reads JSON lines from stdin, a file, an url or a kafka topic, \
fills in the default DATA_SOURCE and ENTITY_TYPE, and submits every record to an entity \
resolution engine through a pool of workers. Throughput and worker health are reported \
periodically."
)]
pub(crate) struct Cli {
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Disable OpenTelemetry initialization and use minimal tracing setup.
    #[clap(long = "disable-otel", global = true)]
    disable_otel: bool,

    /// Change working directory before executing the command.
    ///
    /// This affects relative paths of the configuration file and of the input.
    #[clap(short = 'C', long = "directory", global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Load JSON lines read from standard input.
    Stdin(tools::load::StdinArgs),

    /// Load JSON lines read from `--input-url` (file or http resource).
    Url(tools::load::UrlArgs),

    /// Read like `url`, but only log the records instead of loading them.
    Test(tools::load::UrlArgs),

    /// Load JSON records consumed from a kafka topic.
    #[cfg(feature = "source_kafka")]
    Kafka(tools::kafka::KafkaArgs),

    /// Do nothing for a while (container debugging).
    Sleep(tools::sleep::SleepArgs),
}

fn init_log(verbosity: Verbosity, disable_otel: bool) -> Result<Guard> {
    let mut config = TracingConfig::production();
    if verbosity.is_present() {
        config = config.with_log_directives(verbosity.log_level_filter().as_str().to_lowercase());
    }
    let guard = config
        .with_stderr()
        .with_timer(init_tracing_opentelemetry::LogTimer::Uptime)
        .with_logfmt_format()
        .with_otel(!disable_otel)
        .init_subscriber()
        .into_diagnostic()?;
    Ok(guard)
}

/// to call from main.rs.
/// read args from sys.args
/// on error, exit with code 1
/// on interrupt, exit with code 0 without waiting for pending reads of stdin
#[allow(clippy::missing_errors_doc)]
pub async fn run_with_sys_args() -> Result<()> {
    let cli = Cli::parse();
    let shutdown_token = CancellationToken::new();
    let ok = run(cli, true, shutdown_token.clone()).await?;
    if !ok {
        std::process::exit(1);
    }
    if shutdown_token.is_cancelled() {
        // a blocking read of stdin would hold the runtime shutdown
        std::process::exit(0);
    }
    Ok(())
}

/// to ease call from other crates, test,...
#[allow(clippy::missing_errors_doc)]
pub async fn run_with_args<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with_args_and_log(args, true, CancellationToken::new()).await
}

#[allow(clippy::missing_errors_doc)]
pub async fn run_with_args_and_log<I, T>(
    args: I,
    with_init_log: bool,
    shutdown_token: CancellationToken,
) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    // clap expects the name of the binary first
    let mut cmdline = vec![OsString::from("stream-loader-lib")];
    cmdline.extend(args.into_iter().map(Into::into));
    let cli = Cli::try_parse_from(cmdline).into_diagnostic()?;
    run(cli, with_init_log, shutdown_token).await
}

pub(crate) async fn run(
    cli: Cli,
    with_init_log: bool,
    shutdown_token: CancellationToken,
) -> Result<bool> {
    let _guard = if with_init_log { Some(init_log(cli.verbose, cli.disable_otel)?) } else { None };
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir).into_diagnostic()?;
    }
    match cli.command {
        Command::Stdin(args) => tools::load::stdin(args, shutdown_token).await,
        Command::Url(args) => tools::load::url(args, shutdown_token).await,
        Command::Test(args) => tools::load::test(args, shutdown_token).await,
        #[cfg(feature = "source_kafka")]
        Command::Kafka(args) => tools::kafka::kafka(args, shutdown_token).await,
        Command::Sleep(args) => tools::sleep::sleep(args, shutdown_token).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
