//! Bounded FIFO between line sources and queue workers.
//!
//! `put` waits while the queue is full, `get` waits while it is empty. The queue is
//! closed once every [`QueueSender`] is dropped: `get` then drains what is left and
//! returns `None`.

use crate::errors::{Error, IntoDiagnostic, Result, miette};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// A queued, already enriched, JSON line.
pub(crate) type QueueEntry = String;

/// Create a queue able to hold `capacity` entries (must be at least 1).
pub(crate) fn bounded(capacity: usize) -> Result<(QueueSender, QueueReceiver)> {
    if capacity == 0 {
        return Err(Error::InvalidConfig("queue capacity must be at least 1".to_string()))
            .into_diagnostic();
    }
    let (tx, rx) = mpsc::channel::<QueueEntry>(capacity);
    let depth = QueueDepth(tx.downgrade());
    Ok((
        QueueSender { tx, depth: depth.clone() },
        QueueReceiver { rx: Arc::new(Mutex::new(rx)), depth },
    ))
}

/// Number of entries currently waiting in the queue (for reporting only).
///
/// Read from the channel permits, 0 once the queue is closed.
#[derive(Debug, Clone)]
pub(crate) struct QueueDepth(mpsc::WeakSender<QueueEntry>);

impl QueueDepth {
    pub(crate) fn get(&self) -> usize {
        self.0.upgrade().map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QueueSender {
    tx: mpsc::Sender<QueueEntry>,
    depth: QueueDepth,
}

impl QueueSender {
    pub(crate) async fn put(&self, entry: QueueEntry) -> Result<()> {
        self.tx.send(entry).await.map_err(|_| miette!("queue closed, no worker left"))
    }

    pub(crate) fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }
}

/// Consumer side, shared by every queue worker.
#[derive(Debug, Clone)]
pub(crate) struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<QueueEntry>>>,
    depth: QueueDepth,
}

impl QueueReceiver {
    /// Returns `None` when the queue is closed and drained.
    pub(crate) async fn get(&self) -> Option<QueueEntry> {
        self.rx.lock().await.recv().await
    }

    pub(crate) fn depth(&self) -> QueueDepth {
        self.depth.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(bounded(0).is_err());
    }

    #[tokio::test]
    async fn single_producer_single_consumer_is_fifo() {
        let (tx, rx) = bounded(3).unwrap();
        let producer = tokio::spawn(async move {
            for i in 0..50 {
                tx.put(format!("{i}")).await.unwrap();
            }
        });
        let mut received = vec![];
        while let Some(entry) = rx.get().await {
            received.push(entry);
        }
        producer.await.unwrap();
        let expected = (0..50).map(|i| format!("{i}")).collect::<Vec<_>>();
        assert_eq!(received, expected);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(10)]
    #[tokio::test]
    async fn put_waits_while_full(#[case] capacity: usize) {
        let (tx, rx) = bounded(capacity).unwrap();
        for i in 0..capacity {
            tx.put(format!("{i}")).await.unwrap();
        }
        assert_eq!(tx.depth().get(), capacity);

        let blocked = timeout(Duration::from_millis(50), tx.put("overflow".to_string())).await;
        assert!(blocked.is_err(), "put returned while the queue was full");

        assert_eq!(rx.get().await.as_deref(), Some("0"));
        let unblocked = timeout(Duration::from_millis(500), tx.put("next".to_string())).await;
        assert2::assert!(let Ok(Ok(())) = unblocked);
        assert_eq!(rx.depth().get(), capacity);
    }

    #[tokio::test]
    async fn get_drains_then_reports_closure() {
        let (tx, rx) = bounded(4).unwrap();
        tx.put("a".to_string()).await.unwrap();
        tx.put("b".to_string()).await.unwrap();
        drop(tx);
        assert_eq!(rx.get().await.as_deref(), Some("a"));
        assert_eq!(rx.get().await.as_deref(), Some("b"));
        assert_eq!(rx.get().await, None);
        assert_eq!(rx.depth().get(), 0);
    }

    #[tokio::test]
    async fn entries_are_handed_to_a_single_consumer() {
        let (tx, rx) = bounded(8).unwrap();
        let consumers = (0..4)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    let mut got = vec![];
                    while let Some(entry) = rx.get().await {
                        got.push(entry);
                        tokio::task::yield_now().await;
                    }
                    got
                })
            })
            .collect::<Vec<_>>();
        for i in 0..200 {
            tx.put(format!("{i}")).await.unwrap();
        }
        drop(tx);
        let mut all = vec![];
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_by_key(|entry| entry.parse::<u32>().unwrap());
        assert_eq!(all, (0..200).map(|i| format!("{i}")).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn depth_is_back_to_zero_once_drained() {
        for _ in 0..50 {
            let (tx, rx) = bounded(1).unwrap();
            let consumer = tokio::spawn({
                let rx = rx.clone();
                async move {
                    for _ in 0..200 {
                        rx.get().await.unwrap();
                    }
                }
            });
            for i in 0..200 {
                tx.put(format!("{i}")).await.unwrap();
                assert!(tx.depth().get() <= 1);
            }
            consumer.await.unwrap();
            assert_eq!(tx.depth().get(), 0);
            assert_eq!(rx.depth().get(), 0);
        }
    }

    #[tokio::test]
    async fn put_fails_once_every_consumer_is_gone() {
        let (tx, rx) = bounded(1).unwrap();
        drop(rx);
        assert!(tx.put("lost".to_string()).await.is_err());
    }
}
