//! `stdin`, `url` and `test` subcommands: load JSON lines through the bounded queue.

use super::PipelineArgs;
use crate::{
    errors::Result,
    pipeline::{Input, PipelineBuilder},
    sinks,
    sources::SourceKind,
};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Args)]
pub(crate) struct StdinArgs {
    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct UrlArgs {
    /// Where to read JSON lines from: `file://...`, `http(s)://...` or a local path.
    /// Standard input when absent.
    #[clap(long = "input-url", env("SENZING_INPUT_URL"))]
    input_url: Option<String>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

/// Returns true if the load ran successfully
pub(crate) async fn stdin(args: StdinArgs, shutdown_token: CancellationToken) -> Result<bool> {
    let config = args.pipeline.load_config(&args.pipeline.overrides())?;
    PipelineBuilder::new(config).run(Input::Lines(SourceKind::Stdin), shutdown_token).await
}

pub(crate) async fn url(args: UrlArgs, shutdown_token: CancellationToken) -> Result<bool> {
    let mut overrides = args.pipeline.overrides();
    overrides.input.url = args.input_url;
    run_lines(&args.pipeline, &overrides, shutdown_token).await
}

/// Same as `url`, but records are only echoed to the log.
pub(crate) async fn test(args: UrlArgs, shutdown_token: CancellationToken) -> Result<bool> {
    let mut overrides = args.pipeline.overrides();
    overrides.input.url = args.input_url;
    overrides.sink = Some(sinks::Config::Debug(sinks::debug::Config::default()));
    run_lines(&args.pipeline, &overrides, shutdown_token).await
}

async fn run_lines(
    pipeline: &PipelineArgs,
    overrides: &crate::config::Overrides,
    shutdown_token: CancellationToken,
) -> Result<bool> {
    let config = pipeline.load_config(overrides)?;
    let kind = SourceKind::from_input_url(config.input.url.as_deref())?;
    PipelineBuilder::new(config).run(Input::Lines(kind), shutdown_token).await
}
