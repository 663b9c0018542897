use super::{Emitter, drain_lines};
use crate::errors::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

pub(crate) type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub(crate) fn shared_lines() -> SharedLines {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

#[tracing::instrument(skip(lines, emitter))]
pub(crate) async fn run(reader: usize, lines: SharedLines, emitter: Emitter) -> Result<()> {
    drain_lines(&lines, &emitter).await?;
    tracing::info!(kind = "source", "end of standard input");
    Ok(())
}
