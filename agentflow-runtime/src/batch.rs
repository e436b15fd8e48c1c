//! Batch processor: coalesces concurrent requests into bounded batches and
//! dispatches each batch through a single handler call.

use crate::error::{Result, RuntimeError};
use agentflow_utils::pool::ObjectPool;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub max_wait: Duration,
    pub queue_capacity: usize,
    pub worker_count: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            max_wait: Duration::from_millis(50),
            queue_capacity: 1024,
            worker_count: 1,
        }
    }
}

/// A handler invoked once per flushed batch. Returns one response per
/// request id it recognised; requests with no matching response get a
/// synthetic "no response" error.
#[async_trait]
pub trait BatchHandler<Req, Resp>: Send + Sync {
    async fn handle(&self, requests: Vec<(String, Req)>) -> Vec<(String, Result<Resp>)>;
}

#[derive(Debug, Default)]
pub struct BatchStats {
    pub submitted: AtomicU64,
    pub batched: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub queued: AtomicU64,
}

impl BatchStats {
    /// `(completed + failed) / batched`, `0.0` before any batch has flushed.
    pub fn efficiency(&self) -> f64 {
        let batched = self.batched.load(Ordering::Relaxed);
        if batched == 0 {
            return 0.0;
        }
        let done = self.completed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        done as f64 / batched as f64
    }
}

struct Enqueued<Req, Resp> {
    id: String,
    request: Req,
    responder: oneshot::Sender<Result<Resp>>,
}

pub struct BatchProcessor<Req, Resp> {
    tx: mpsc::Sender<Enqueued<Req, Resp>>,
    stats: Arc<BatchStats>,
    next_id: AtomicU64,
}

impl<Req, Resp> BatchProcessor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn spawn<H>(config: BatchConfig, handler: H) -> Self
    where
        H: BatchHandler<Req, Resp> + 'static,
    {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(BatchStats::default());
        let worker_stats = stats.clone();
        tokio::spawn(worker_loop(rx, config, handler, worker_stats));
        Self {
            tx,
            stats,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    fn fresh_id(&self) -> String {
        format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Non-blocking submit: returns `queue-full` immediately if the queue
    /// has no room, without ever calling the handler.
    pub fn submit(&self, request: Req) -> Result<oneshot::Receiver<Result<Resp>>> {
        let (responder, receiver) = oneshot::channel();
        let id = self.fresh_id();
        match self.tx.try_send(Enqueued {
            id,
            request,
            responder,
        }) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                Ok(receiver)
            }
            Err(_) => Err(RuntimeError::QueueFull),
        }
    }

    /// Blocking submit: waits for the per-request result or `deadline`,
    /// whichever comes first.
    pub async fn submit_sync(&self, request: Req, deadline: Duration) -> Result<Resp> {
        let receiver = self.submit(request)?;
        match timeout(deadline, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RuntimeError::NoResponse("channel dropped".into())),
            Err(_) => Err(RuntimeError::Upstream(
                agentflow_core::error::AgentFlowError::timeout("submit_sync deadline elapsed"),
            )),
        }
    }
}

async fn worker_loop<Req, Resp, H>(
    mut rx: mpsc::Receiver<Enqueued<Req, Resp>>,
    config: BatchConfig,
    handler: H,
    stats: Arc<BatchStats>,
) where
    Req: Send + 'static,
    Resp: Send + 'static,
    H: BatchHandler<Req, Resp>,
{
    // Every flush needs a fresh id buffer; pooling it avoids a fresh
    // allocation per batch under steady load.
    let id_buffer_pool: ObjectPool<Vec<String>> = ObjectPool::new(config.worker_count.max(1), Vec::new);

    loop {
        let Some(first) = rx.recv().await else {
            return;
        };
        stats.queued.fetch_sub(1, Ordering::Relaxed);

        let mut ids = id_buffer_pool.get();
        ids.push(first.id.clone());
        let mut requests = vec![(first.id, first.request)];
        let mut responders = vec![first.responder];

        let deadline = tokio::time::Instant::now() + config.max_wait;
        while requests.len() < config.max_batch_size {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Some(next)) => {
                    stats.queued.fetch_sub(1, Ordering::Relaxed);
                    ids.push(next.id.clone());
                    requests.push((next.id, next.request));
                    responders.push(next.responder);
                }
                Ok(None) | Err(_) => break,
            }
        }

        stats.batched.fetch_add(1, Ordering::Relaxed);
        debug!(size = requests.len(), "flushing batch");
        let mut results: std::collections::HashMap<_, _> =
            handler.handle(requests).await.into_iter().collect();

        for (id, responder) in ids.drain(..).zip(responders) {
            let outcome = results
                .remove(&id)
                .unwrap_or_else(|| Err(RuntimeError::NoResponse(id)));
            match &outcome {
                Ok(_) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            let _ = responder.send(outcome);
        }
        id_buffer_pool.put(ids);
    }
}
