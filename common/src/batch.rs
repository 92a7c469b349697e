// Bounded-concurrency batch processor
// Items run in fixed-size batches with a short inter-batch delay so the
// downstream rate limits are respected; one item's failure never aborts the
// batch (errors come back per item, in input order).

use anyhow::Result;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Batch sizing and pacing
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items per batch
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
    /// Concurrent items within a batch
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            batch_delay: Duration::from_millis(250),
            max_concurrent: 8,
        }
    }
}

/// Applies `f` to every item with bounded concurrency. Results are returned in
/// input order; each item carries its own `Result`.
pub async fn process_in_batches<I, T, F, Fut>(
    items: Vec<I>,
    config: &BatchConfig,
    f: F,
) -> Vec<Result<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Clone,
    Fut: Future<Output = Result<T>>,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let total = items.len();
    let batch_size = config.batch_size.max(1);
    let mut results = Vec::with_capacity(total);

    let mut items = items.into_iter().peekable();
    let mut batch_index = 0usize;
    while items.peek().is_some() {
        let batch: Vec<I> = items.by_ref().take(batch_size).collect();
        debug!(batch_index, batch_len = batch.len(), total, "processing batch");

        let futures = batch.into_iter().map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let f = f.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                f(item).await
            }
        });
        results.extend(join_all(futures).await);

        batch_index += 1;
        if items.peek().is_some() && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn fast_config() -> BatchConfig {
        BatchConfig {
            batch_size: 3,
            batch_delay: Duration::from_millis(0),
            max_concurrent: 2,
        }
    }

    #[tokio::test]
    async fn results_preserve_input_order() {
        let items: Vec<u32> = (0..10).collect();
        let results = process_in_batches(items, &fast_config(), |n| async move { Ok(n * 2) }).await;
        let values: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn item_failure_does_not_abort_batch() {
        let items: Vec<u32> = (0..6).collect();
        let results = process_in_batches(items, &fast_config(), |n| async move {
            if n == 2 {
                Err(anyhow!("boom"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(results.len(), 6);
        assert!(results[2].is_err());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results =
            process_in_batches(Vec::<u32>::new(), &fast_config(), |n| async move { Ok(n) }).await;
        assert!(results.is_empty());
    }
}
