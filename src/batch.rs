//! Admission-window batching.
//!
//! [`BatchClient`] groups requests that arrive close together and dispatches
//! each group at once. There is no merged multi-prompt call: every item in a
//! flushed batch goes to the wrapped client as its own concurrent request,
//! under its own `max_wait` timeout.
//!
//! ```text
//! generate() ──try_send──► [admission queue] ──► worker ──► batch buffer
//!     │   (full: call inner directly)                           │
//!     │                                  flush on size / timer / shutdown
//!     ▼                                                          ▼
//!  await reply ◄──────────── oneshot ◄──── one task per item ── inner.generate
//! ```
//!
//! A caller that stops waiting (drops its future, or its cancellation token
//! fires) loses nothing but its own result: the worker skips items whose
//! reply slot is already closed, and a late send is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::config::duration_millis;
use crate::providers::ModelClient;
use crate::telemetry;
use crate::types::{ChunkStream, GenerateRequest, GenerateResponse};
use crate::{ErrorCode, HuginnError, Result};

/// Batching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Disabled clients pass every call straight through. Default: false.
    pub enabled: bool,
    /// Flush as soon as this many items are buffered. Default: 10.
    pub max_batch_size: usize,
    /// Per-item dispatch timeout. Default: 30 seconds.
    #[serde(rename = "max_wait_ms", with = "duration_millis")]
    pub max_wait: Duration,
    /// Flush a non-empty buffer this often. Default: 100 ms.
    #[serde(rename = "flush_interval_ms", with = "duration_millis")]
    pub flush_interval: Duration,
    /// Admission queue capacity. Default: 100.
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_batch_size: 10,
            max_wait: Duration::from_secs(30),
            flush_interval: Duration::from_millis(100),
            queue_capacity: 100,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Reject zero sizes and durations.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(HuginnError::Configuration(
                "batch max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(HuginnError::Configuration(
                "batch queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_wait.is_zero() {
            return Err(HuginnError::Configuration(
                "batch max_wait_ms must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(HuginnError::Configuration(
                "batch flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shortest flush interval the worker will run with.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// An in-flight batched call. The reply slot is written at most once.
struct BatchItem {
    id: u64,
    request: GenerateRequest,
    reply: oneshot::Sender<Result<GenerateResponse>>,
}

/// A [`ModelClient`] decorator that coalesces requests into batches.
pub struct BatchClient {
    inner: Arc<dyn ModelClient>,
    queue: Option<mpsc::Sender<BatchItem>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl BatchClient {
    /// Wrap `inner`.
    ///
    /// When batching is enabled this spawns the worker task, so it must be
    /// called from within a tokio runtime. Zero sizes and a zero flush
    /// interval are raised to their minimum; use [`BatchConfig::validate`]
    /// to reject them instead.
    pub fn new(inner: Arc<dyn ModelClient>, config: BatchConfig) -> Self {
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();

        let queue = if config.enabled {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            let worker = Worker {
                inner: Arc::clone(&inner),
                max_batch_size: config.max_batch_size.max(1),
                max_wait: config.max_wait,
                tasks: tasks.clone(),
            };
            let flush_interval = config.flush_interval.max(MIN_FLUSH_INTERVAL);
            tasks.spawn(worker.run(rx, flush_interval, shutdown.clone()));
            Some(tx)
        } else {
            None
        };

        Self {
            inner,
            queue,
            next_id: AtomicU64::new(0),
            shutdown,
            tasks,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Like [`generate`](ModelClient::generate), but stop waiting when
    /// `cancel` fires. The batched call itself still runs; its result is
    /// discarded.
    pub async fn generate_with_cancel(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse> {
        tokio::select! {
            result = self.generate(request) => result,
            _ = cancel.cancelled() => Err(HuginnError::Cancelled),
        }
    }
}

#[async_trait]
impl ModelClient for BatchClient {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn models(&self) -> Vec<String> {
        self.inner.models()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let Some(queue) = &self.queue else {
            return self.inner.generate(request).await;
        };

        let (reply, slot) = oneshot::channel();
        let item = BatchItem {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            request: request.clone(),
            reply,
        };
        if let Err(e) = queue.try_send(item) {
            debug!(reason = %e, "admission queue unavailable, dispatching directly");
            metrics::counter!(telemetry::BATCH_BYPASS_TOTAL).increment(1);
            return self.inner.generate(request).await;
        }

        slot.await.unwrap_or_else(|_| {
            Err(HuginnError::provider(
                ErrorCode::ProviderDown,
                self.inner.provider(),
                "batch worker dropped the request",
            ))
        })
    }

    async fn generate_stream(&self, request: &GenerateRequest) -> ChunkStream {
        self.inner.generate_stream(request).await
    }

    async fn health(&self) -> Result<()> {
        self.inner.health().await
    }

    /// Flush pending items, wait for every dispatched call, then close the
    /// inner client.
    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.inner.close().await
    }
}

struct Worker {
    inner: Arc<dyn ModelClient>,
    max_batch_size: usize,
    max_wait: Duration,
    tasks: TaskTracker,
}

impl Worker {
    async fn run(
        self,
        mut rx: mpsc::Receiver<BatchItem>,
        flush_interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut batch: Vec<BatchItem> = Vec::with_capacity(self.max_batch_size);
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => {
                        batch.push(item);
                        if batch.len() >= self.max_batch_size {
                            self.flush(&mut batch, "size");
                        }
                    }
                    // every sender dropped
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch, "timer");
                    }
                }
            }
        }

        rx.close();
        while let Ok(item) = rx.try_recv() {
            batch.push(item);
        }
        if !batch.is_empty() {
            self.flush(&mut batch, "shutdown");
        }
        debug!("batch worker stopped");
    }

    fn flush(&self, batch: &mut Vec<BatchItem>, trigger: &'static str) {
        debug!(size = batch.len(), trigger, "flushing batch");
        metrics::counter!(telemetry::BATCH_FLUSHES_TOTAL, "trigger" => trigger).increment(1);

        for item in batch.drain(..) {
            if item.reply.is_closed() {
                debug!(id = item.id, "caller went away, skipping item");
                continue;
            }
            let inner = Arc::clone(&self.inner);
            let max_wait = self.max_wait;
            self.tasks.spawn(async move {
                let result = match tokio::time::timeout(max_wait, inner.generate(&item.request)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(id = item.id, ?max_wait, "batched request timed out");
                        Err(HuginnError::provider(
                            ErrorCode::Timeout,
                            inner.provider(),
                            format!("batched request exceeded {max_wait:?}"),
                        ))
                    }
                };
                // no-op if the caller already gave up
                let _ = item.reply.send(result);
            });
        }
    }
}
