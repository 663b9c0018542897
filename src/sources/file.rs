use super::{Emitter, drain_lines};
use crate::errors::{Result, miette};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

#[tracing::instrument(skip(emitter))]
pub(crate) async fn run(path: PathBuf, emitter: Emitter) -> Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|err| miette!("failed to open input file {}: {err}", path.display()))?;
    let lines = Mutex::new(BufReader::new(file).lines());
    drain_lines(&lines, &emitter).await?;
    tracing::info!(kind = "source", "end of file");
    Ok(())
}
