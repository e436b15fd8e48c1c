use agentflow_runtime::{BatchConfig, BatchHandler, BatchProcessor};
use agentflow_runtime::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

struct DoublingHandler;
#[async_trait]
impl BatchHandler<u32, u32> for DoublingHandler {
    async fn handle(&self, requests: Vec<(String, u32)>) -> Vec<(String, Result<u32>)> {
        requests.into_iter().map(|(id, req)| (id, Ok(req * 2))).collect()
    }
}

/// Submits more requests concurrently than fit in one batch and confirms
/// every caller gets back its own correctly paired response, with
/// batching stats reflecting more than one flush.
#[tokio::test]
async fn overflowing_requests_span_multiple_batches_correctly_paired() {
    let config = BatchConfig {
        max_batch_size: 3,
        max_wait: Duration::from_millis(20),
        queue_capacity: 64,
        worker_count: 1,
    };
    let processor = Arc::new(BatchProcessor::spawn(config, DoublingHandler));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let processor = processor.clone();
        handles.push(tokio::spawn(async move {
            processor.submit_sync(i, Duration::from_secs(2)).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        assert_eq!(result.unwrap(), i as u32 * 2);
    }
    assert!(processor.stats().batched.load(std::sync::atomic::Ordering::Relaxed) >= 2);
}
