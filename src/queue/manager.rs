use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{QueueItem, QueueItemHandler};
use crate::fetch::MessageFetcher;
use crate::platform::ChannelInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: usize,
    pub processed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
}

pub struct QueueManager {
    channels: Mutex<VecDeque<ChannelInfo>>,
    sender: mpsc::UnboundedSender<QueueItem>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueueItem>>>,
    /// Items enqueued but not yet marked done.
    pending: Arc<watch::Sender<usize>>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueManager {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        Self {
            channels: Mutex::new(VecDeque::new()),
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            pending: Arc::new(pending),
            counters: Arc::new(Counters::default()),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub async fn queue_channels<S>(&self, channels: S) -> usize
    where
        S: Stream<Item = ChannelInfo>,
    {
        let mut channels = std::pin::pin!(channels);
        let mut count = 0;
        while let Some(channel) = channels.next().await {
            debug!(channel = %channel.title, "queued channel");
            self.channels.lock().unwrap().push_back(channel);
            count += 1;
        }
        info!("Queued {} channels", count);
        count
    }

    /// Pushes a message item and counts it as outstanding.
    pub fn enqueue(&self, item: QueueItem) {
        self.pending.send_modify(|n| *n += 1);
        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(item).is_err() {
            // Receiver is owned by self, so this only happens mid-teardown.
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            warn!("message queue closed, dropping item");
        }
    }

    /// Drains the channel queue one channel at a time. A channel's messages
    /// are all enqueued before the next channel is fetched.
    pub async fn process_channel_queue(&self, fetcher: &MessageFetcher) -> usize {
        let mut total = 0;
        loop {
            let Some(channel) = self.channels.lock().unwrap().pop_front() else {
                break;
            };

            let mut messages = match fetcher.fetch(&channel).await {
                Ok(messages) => messages,
                Err(e) => {
                    error!(channel = %channel.title, error = %e, "failed to fetch messages");
                    continue;
                }
            };

            let mut queued = 0;
            while let Some(message) = messages.next().await {
                match message {
                    Ok(message) => {
                        self.enqueue(QueueItem {
                            channel: channel.clone(),
                            message,
                        });
                        queued += 1;
                    }
                    Err(e) => {
                        error!(
                            channel = %channel.title,
                            error = %e,
                            "message walk aborted after {} messages",
                            queued
                        );
                        break;
                    }
                }
            }
            info!(
                "Queued {} messages from {} ({})",
                queued,
                channel.title,
                fetcher.strategy()
            );
            total += queued;
        }
        total
    }

    pub fn spawn_consumers(&self, count: usize, handler: Arc<dyn QueueItemHandler>) {
        let mut workers = self.workers.lock().unwrap();
        for worker_id in 0..count {
            let receiver = self.receiver.clone();
            let pending = self.pending.clone();
            let counters = self.counters.clone();
            let shutdown = self.shutdown.clone();
            let handler = handler.clone();

            workers.push(tokio::spawn(async move {
                debug!("consumer {} started", worker_id);
                loop {
                    let item = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        item = async { receiver.lock().await.recv().await } => item,
                    };
                    let Some(item) = item else { break };

                    let channel = item.channel.title.clone();
                    let message_id = item.message.id;
                    let outcome = AssertUnwindSafe(handler.handle(item)).catch_unwind().await;
                    match outcome {
                        Ok(Ok(())) => {
                            counters.processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(Err(e)) => {
                            counters.failed.fetch_add(1, Ordering::SeqCst);
                            error!(message_id, channel = %channel, error = %format!("{:#}", e), "item failed");
                        }
                        Err(_) => {
                            counters.failed.fetch_add(1, Ordering::SeqCst);
                            error!(message_id, channel = %channel, "handler panicked");
                        }
                    }
                    pending.send_modify(|n| *n = n.saturating_sub(1));
                }
                debug!("consumer {} stopped", worker_id);
            }));
        }
        info!("Spawned {} consumers", count);
    }

    /// Resolves once every enqueued item has been marked done.
    pub async fn wait(&self) {
        let mut pending = self.pending.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::SeqCst),
            processed: self.counters.processed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Cancels the consumers and waits for them to exit.
    pub async fn finish(&self) {
        self.shutdown.cancel();
        let workers: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("consumer task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MessageStrategy;
    use crate::store::SqliteMediaStore;
    use crate::test_support::{text_message, FakePlatform};
    use async_trait::async_trait;
    use futures::stream;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(i64, i64)>>,
        fail_ids: Vec<i64>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl QueueItemHandler for RecordingHandler {
        async fn handle(&self, item: QueueItem) -> anyhow::Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.seen
                .lock()
                .unwrap()
                .push((item.channel.id, item.message.id));
            if self.fail_ids.contains(&item.message.id) {
                anyhow::bail!("boom");
            }
            if item.message.id == 666 {
                panic!("handler bug");
            }
            Ok(())
        }
    }

    fn fetcher(platform: Arc<FakePlatform>) -> MessageFetcher {
        MessageFetcher::new(
            platform,
            Arc::new(SqliteMediaStore::in_memory().unwrap()),
            MessageStrategy::All,
            None,
        )
    }

    #[tokio::test]
    async fn test_producer_keeps_per_channel_order() {
        let platform = Arc::new(FakePlatform::new());
        let a = platform.add_channel(1, "a");
        let b = platform.add_channel(2, "b");
        for id in 1..=3 {
            platform.add_message(text_message(1, id));
            platform.add_message(text_message(2, id + 10));
        }

        let queue = QueueManager::new();
        assert_eq!(queue.queue_channels(stream::iter(vec![a, b])).await, 2);
        assert_eq!(queue.process_channel_queue(&fetcher(platform)).await, 6);

        // Single consumer preserves the queue order exactly.
        let handler = Arc::new(RecordingHandler::default());
        queue.spawn_consumers(1, handler.clone());
        queue.wait().await;
        queue.finish().await;

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(1, 3), (1, 2), (1, 1), (2, 13), (2, 12), (2, 11)]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_channel() {
        let platform = Arc::new(FakePlatform::new());
        let a = platform.add_channel(1, "a");
        platform.add_message(text_message(1, 1));
        let fetcher = MessageFetcher::new(
            platform,
            Arc::new(SqliteMediaStore::in_memory().unwrap()),
            MessageStrategy::Oldest,
            None,
        );

        let queue = QueueManager::new();
        queue.queue_channels(stream::iter(vec![a])).await;
        assert_eq!(queue.process_channel_queue(&fetcher).await, 0);
    }

    #[tokio::test]
    async fn test_wait_drains_everything_despite_failures() {
        let queue = QueueManager::new();
        let channel = ChannelInfo::new(1, "a");
        for id in 1..=20 {
            queue.enqueue(QueueItem {
                channel: channel.clone(),
                message: text_message(1, id),
            });
        }
        queue.enqueue(QueueItem {
            channel: channel.clone(),
            message: text_message(1, 666),
        });

        let handler = Arc::new(RecordingHandler {
            fail_ids: vec![3, 7],
            delay: Some(Duration::from_millis(2)),
            ..Default::default()
        });
        queue.spawn_consumers(4, handler.clone());
        queue.wait().await;

        assert_eq!(handler.seen.lock().unwrap().len(), 21);
        assert_eq!(
            queue.stats(),
            QueueStats {
                enqueued: 21,
                processed: 18,
                failed: 3,
            }
        );
        queue.finish().await;
    }

    #[tokio::test]
    async fn test_wait_with_nothing_enqueued_returns() {
        let queue = QueueManager::new();
        queue.spawn_consumers(2, Arc::new(RecordingHandler::default()));
        queue.wait().await;
        queue.finish().await;
        assert_eq!(queue.stats(), QueueStats::default());
    }
}
