pub(crate) mod file;
#[cfg(feature = "source_kafka")]
pub(crate) mod kafka;
pub(crate) mod stdin;
#[cfg(feature = "source_url")]
pub(crate) mod url;

use crate::context::PipelineContext;
use crate::enricher::Enricher;
use crate::errors::{Error, IntoDiagnostic, Result};
use crate::queue::QueueSender;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Line source selected from the optional input url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceKind {
    Stdin,
    File(PathBuf),
    Url(::url::Url),
}

impl SourceKind {
    /// - absent: stdin
    /// - `http`, `https`: remote resource
    /// - `file` or no scheme: local file
    pub(crate) fn from_input_url(input_url: Option<&str>) -> Result<Self> {
        let Some(input_url) = input_url else {
            return Ok(Self::Stdin);
        };
        match ::url::Url::parse(input_url) {
            Err(::url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Self::File(PathBuf::from(input_url)))
            }
            Err(_) => unsupported(input_url),
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Url(url)),
                "file" => url.to_file_path().map(Self::File).or_else(|()| unsupported(input_url)),
                _ => unsupported(input_url),
            },
        }
    }
}

fn unsupported(input_url: &str) -> Result<SourceKind> {
    Err(Error::UnsupportedInputUrl { url: input_url.to_string() }).into_diagnostic()
}

/// Start the reader task(s) of a line source.
///
/// Stdin is shared by `input_workers` readers, file and url have a single reader.
/// Every returned task owns a clone of the queue sender: the queue closes when they
/// have all finished.
pub(crate) fn start(
    kind: &SourceKind,
    input_workers: usize,
    emitter: Emitter,
) -> Vec<JoinHandle<Result<()>>> {
    tracing::info!(kind = "source", source = ?kind, "starting");
    match kind {
        SourceKind::Stdin => {
            let lines = stdin::shared_lines();
            (0..input_workers.max(1))
                .map(|index| {
                    let lines = Arc::clone(&lines);
                    let emitter = emitter.clone();
                    tokio::spawn(async move { stdin::run(index, lines, emitter).await })
                })
                .collect()
        }
        SourceKind::File(path) => {
            let path = path.clone();
            vec![tokio::spawn(async move { file::run(path, emitter).await })]
        }
        #[cfg(feature = "source_url")]
        SourceKind::Url(url) => {
            let url = url.clone();
            vec![tokio::spawn(async move { url::run(url, emitter).await })]
        }
        #[cfg(not(feature = "source_url"))]
        SourceKind::Url(url) => {
            let url = url.to_string();
            vec![tokio::spawn(async move {
                Err(Error::UnsupportedInputUrl { url }).into_diagnostic()
            })]
        }
    }
}

/// Hands raw lines to the queue: counts, enriches, then enqueues them.
#[derive(Debug, Clone)]
pub(crate) struct Emitter {
    context: Arc<PipelineContext>,
    enricher: Arc<Enricher>,
    queue: QueueSender,
    cancel_token: CancellationToken,
}

impl Emitter {
    pub(crate) fn new(
        context: Arc<PipelineContext>,
        enricher: Arc<Enricher>,
        queue: QueueSender,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { context, enricher, queue, cancel_token }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Blank lines are ignored. A line that can not be enriched is counted as bad
    /// and dropped. Fails only when the queue has no consumer left.
    pub(crate) async fn accept(&self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.context.record_queued();
        let entry = match self.enricher.enrich(line) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(?err, line, "dropping malformed line");
                self.context.record_bad();
                return Ok(());
            }
        };
        tokio::select! {
            () = self.cancel_token.cancelled() => Ok(()),
            sent = self.queue.put(entry) => sent,
        }
    }

    /// Count a line that could not even be decoded as text.
    pub(crate) fn reject(&self, err: &std::str::Utf8Error) {
        self.context.record_queued();
        tracing::warn!(?err, "dropping line that is not valid utf-8");
        self.context.record_bad();
    }
}

/// Feed every line of `lines` to the emitter until end of input or cancellation.
///
/// Several tasks can drain the same `lines`, each one reading whole lines.
pub(crate) async fn drain_lines<R>(lines: &Mutex<Lines<R>>, emitter: &Emitter) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        tokio::task::yield_now().await;
        let step = async {
            let line = lines.lock().await.next_line().await.into_diagnostic()?;
            match line {
                Some(line) => emitter.accept(&line).await.map(|()| true),
                None => Ok(false),
            }
        };
        tokio::select! {
            biased;
            () = emitter.cancel_token().cancelled() => return Ok(()),
            more = step => {
                if !more? {
                    return Ok(());
                }
            }
        }
    }
}
