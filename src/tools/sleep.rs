use crate::{errors::Result, pipeline::handle_shutdown_signal};
use clap::Args;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Args)]
pub(crate) struct SleepArgs {
    /// How long to sleep, in seconds.
    #[clap(long = "sleep-time", env("SENZING_SLEEP_TIME"), default_value_t = 600)]
    sleep_time: u64,
}

/// Do nothing until the delay is over or a shutdown signal is received.
pub(crate) async fn sleep(args: SleepArgs, shutdown_token: CancellationToken) -> Result<bool> {
    let duration = Duration::from_secs(args.sleep_time);
    tracing::info!(?duration, "sleeping");
    let signal_handler = tokio::spawn(handle_shutdown_signal(shutdown_token.clone()));
    tokio::select! {
        () = tokio::time::sleep(duration) => tracing::info!("awake"),
        () = shutdown_token.cancelled() => tracing::info!("interrupted, exiting"),
    }
    signal_handler.abort();
    Ok(true)
}
