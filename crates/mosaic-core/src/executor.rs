//! Execution of granule loads.
//!
//! A pooled executor runs loads on tokio's blocking threads with at most
//! `workers` in flight; it can be shared by every mosaic in the process.
//! The inline executor runs them one after the other on the caller's
//! thread. Both return results in submission order, which overlay
//! compositing depends on.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

/// Executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Run loads on a worker pool. When false they run inline.
    pub pooling: bool,
    /// Maximum concurrent loads.
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pooling: true,
            workers: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GranuleExecutor {
    Pooled {
        permits: Arc<Semaphore>,
        workers: usize,
    },
    Inline,
}

impl GranuleExecutor {
    pub fn pooled(workers: usize) -> Self {
        let workers = workers.max(1);
        Self::Pooled {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn inline() -> Self {
        Self::Inline
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        if config.pooling {
            Self::pooled(config.workers)
        } else {
            Self::inline()
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Self::Pooled { .. })
    }

    /// Run every task and collect their outcomes in submission order.
    ///
    /// A task that panics yields `None` like a task that reported failure.
    pub async fn run_all<T, F>(&self, tasks: Vec<F>) -> Vec<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Option<T> + Send + 'static,
    {
        match self {
            Self::Inline => tasks
                .into_iter()
                .map(|task| {
                    catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|_| {
                        warn!("Granule task panicked");
                        None
                    })
                })
                .collect(),
            Self::Pooled { permits, .. } => {
                let handles = tasks.into_iter().map(|task| {
                    let permits = permits.clone();
                    async move {
                        let _permit = permits.acquire_owned().await.ok()?;
                        match tokio::task::spawn_blocking(task).await {
                            Ok(result) => result,
                            Err(e) => {
                                warn!(error = %e, "Granule task interrupted");
                                None
                            }
                        }
                    }
                });
                join_all(handles).await
            }
        }
    }
}

impl Default for GranuleExecutor {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn tasks() -> Vec<Box<dyn FnOnce() -> Option<usize> + Send>> {
        (0..8usize)
            .map(|i| {
                Box::new(move || {
                    // Later tasks finish first.
                    std::thread::sleep(Duration::from_millis((8 - i) as u64 * 2));
                    if i == 3 {
                        None
                    } else {
                        Some(i)
                    }
                }) as Box<dyn FnOnce() -> Option<usize> + Send>
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pooled_preserves_order() {
        let results = GranuleExecutor::pooled(4).run_all(tasks()).await;
        assert_eq!(
            results,
            vec![Some(0), Some(1), Some(2), None, Some(4), Some(5), Some(6), Some(7)]
        );
    }

    #[test]
    fn test_inline_matches_pooled() {
        let inline = tokio_test::block_on(GranuleExecutor::inline().run_all(tasks()));
        assert_eq!(inline[3], None);
        assert_eq!(inline.iter().flatten().count(), 7);
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let active = active.clone();
                let peak = peak.clone();
                move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Some(())
                }
            })
            .collect();

        let results = GranuleExecutor::pooled(3).run_all(tasks).await;
        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_task_is_skipped() {
        let tasks: Vec<Box<dyn FnOnce() -> Option<u8> + Send>> = vec![
            Box::new(|| Some(1)),
            Box::new(|| panic!("decoder blew up")),
            Box::new(|| Some(3)),
        ];
        let results = GranuleExecutor::pooled(2).run_all(tasks).await;
        assert_eq!(results, vec![Some(1), None, Some(3)]);
    }
}
