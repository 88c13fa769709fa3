use parking_lot::Mutex as SyncMutex;
use snipper_core::{ShortenerError, UrlStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, TypedBuilder)]
pub struct DeletionConfig {
    /// Number of workers draining the queue.
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Largest number of short URLs sent to storage in one call.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Bound on each storage call.
    #[builder(default = DEFAULT_DISPATCH_TIMEOUT)]
    pub dispatch_timeout: Duration,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

type Batch = Vec<String>;

struct Shared {
    storage: Arc<dyn UrlStorage>,
    config: DeletionConfig,
    /// Weak so that the queue closes once the pipeline drops its sender.
    requeue: WeakUnboundedSender<Batch>,
    /// Batches that are queued or being dispatched.
    pending: watch::Sender<usize>,
}

impl Shared {
    fn requeue(&self, rest: Batch) {
        let Some(sender) = self.requeue.upgrade() else {
            error!(count = rest.len(), "deletion queue closed, dropping remainder");
            return;
        };
        self.pending.send_modify(|n| *n += 1);
        if let Err(e) = sender.send(rest) {
            self.pending.send_modify(|n| *n -= 1);
            error!(count = e.0.len(), "deletion queue closed, dropping remainder");
        }
    }

    async fn dispatch(&self, worker: usize, batch: Batch) {
        let count = batch.len();
        let outcome =
            tokio::time::timeout(self.config.dispatch_timeout, self.storage.delete_urls(&batch))
                .await;

        match outcome {
            Ok(Ok(())) => debug!(worker, count, "deletion batch applied"),
            Ok(Err(e)) => error!(worker, count, error = %e, "deletion batch failed, dropping it"),
            Err(_) => error!(
                worker,
                count,
                timeout_ms = self.config.dispatch_timeout.as_millis() as u64,
                "deletion batch timed out, dropping it"
            ),
        }
    }
}

async fn run_worker(
    worker: usize,
    shared: Arc<Shared>,
    receiver: Arc<Mutex<UnboundedReceiver<Batch>>>,
) {
    trace!(worker, "deletion worker started");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(mut batch) = next else {
            break;
        };

        if batch.len() > shared.config.batch_size {
            let rest = batch.split_off(shared.config.batch_size);
            trace!(worker, remaining = rest.len(), "re-enqueueing oversized batch tail");
            shared.requeue(rest);
        }

        // A panicking storage call must neither kill the worker nor leave
        // the batch counted as pending.
        let dispatch = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move { shared.dispatch(worker, batch).await })
        };
        if let Err(e) = dispatch.await {
            error!(worker, error = %e, "deletion dispatch panicked, dropping batch");
        }
        shared.pending.send_modify(|n| *n -= 1);
    }

    trace!(worker, "deletion worker stopped");
}

/// Background pool that tombstones short URLs in bounded batches.
///
/// Callers hand over any number of short URLs and return immediately. A
/// fixed set of workers shares one unbounded queue; a batch larger than
/// `batch_size` is cut, its head dispatched and its tail put back on the
/// queue. Failed or timed-out dispatches are logged and dropped.
pub struct DeletionPipeline {
    sender: SyncMutex<Option<UnboundedSender<Batch>>>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the workers. Must be called inside a tokio runtime.
    pub fn start(storage: Arc<dyn UrlStorage>, config: DeletionConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let worker_count = config.workers.max(1);

        let shared = Arc::new(Shared {
            storage,
            config: DeletionConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            requeue: sender.downgrade(),
            pending,
        });

        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&shared),
                    Arc::clone(&receiver),
                ))
            })
            .collect();

        debug!(
            workers = worker_count,
            batch_size = shared.config.batch_size,
            "deletion pipeline started"
        );

        Self {
            sender: SyncMutex::new(Some(sender)),
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queues `short_urls` for deletion without waiting for storage.
    ///
    /// Fails with [`ShortenerError::ShuttingDown`] once
    /// [`shutdown`](Self::shutdown) has begun.
    pub fn enqueue(&self, short_urls: Vec<String>) -> Result<(), ShortenerError> {
        if short_urls.is_empty() {
            return Ok(());
        }

        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(ShortenerError::ShuttingDown);
        };

        let count = short_urls.len();
        self.shared.pending.send_modify(|n| *n += 1);
        if sender.send(short_urls).is_err() {
            self.shared.pending.send_modify(|n| *n -= 1);
            return Err(ShortenerError::ShuttingDown);
        }

        trace!(count, "deletion batch enqueued");
        Ok(())
    }

    /// Number of batches queued or in flight.
    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    /// Stops accepting work, waits until every queued and in-flight batch
    /// (re-enqueued tails included) is done, then stops the workers.
    ///
    /// Later calls return immediately.
    pub async fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };

        info!(pending = self.pending(), "draining deletion pipeline");

        let mut pending = self.shared.pending.subscribe();
        if pending.wait_for(|n| *n == 0).await.is_err() {
            error!("deletion pipeline lost its pending counter");
        }

        // With the last strong sender gone the workers see a closed queue.
        drop(sender);
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "deletion worker panicked");
            }
        }

        info!("deletion pipeline drained");
    }
}
