use super::Emitter;
use crate::errors::{IntoDiagnostic, Result, miette};
use url::Url;

#[tracing::instrument(skip(emitter), fields(url = %url))]
pub(crate) async fn run(url: Url, emitter: Emitter) -> Result<()> {
    let mut response = reqwest::get(url.clone()).await.into_diagnostic()?;
    if !response.status().is_success() {
        return Err(miette!("failed to fetch {url}: http status {}", response.status()));
    }
    let mut splitter = LineSplitter::default();
    loop {
        tokio::task::yield_now().await;
        let chunk = tokio::select! {
            () = emitter.cancel_token().cancelled() => return Ok(()),
            chunk = response.chunk() => chunk.into_diagnostic()?,
        };
        let Some(chunk) = chunk else {
            break;
        };
        for line in splitter.push(&chunk) {
            emit(&emitter, line).await?;
        }
    }
    if let Some(line) = splitter.finish() {
        emit(&emitter, line).await?;
    }
    tracing::info!(kind = "source", "end of remote resource");
    Ok(())
}

async fn emit(emitter: &Emitter, line: Vec<u8>) -> Result<()> {
    match String::from_utf8(line) {
        Ok(line) => emitter.accept(&line).await,
        Err(err) => {
            emitter.reject(&err.utf8_error());
            Ok(())
        }
    }
}

/// Cut a byte stream into lines, whatever the chunk boundaries are.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = vec![];
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line = self.pending.drain(..=end).collect::<Vec<_>>();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    fn finish(self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then_some(self.pending)
    }
}
