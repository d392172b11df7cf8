//! Dependency graph execution
//!
//! Provisioning is a DAG of named async tasks connected by typed edges.
//! An edge carries one value from its producing task to any number of
//! consumers; a consumer suspends until the producer fulfills it. Tasks
//! with no unfulfilled inputs run concurrently. If a producer finishes
//! without fulfilling an edge, every waiting consumer fails with
//! `DependencyNotReady`.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::ProvisionError;

/// Create a typed dependency edge. The name identifies the edge in
/// `DependencyNotReady` errors.
pub fn edge<T: Clone + Send + Sync + 'static>(name: &'static str) -> (EdgeTx<T>, EdgeRx<T>) {
    let (tx, rx) = watch::channel(None);
    (EdgeTx { name, tx }, EdgeRx { name, rx })
}

/// Producing end of an edge; fulfilled at most once, by value
pub struct EdgeTx<T> {
    name: &'static str,
    tx: watch::Sender<Option<T>>,
}

impl<T> EdgeTx<T> {
    /// Fulfill the edge, waking every consumer
    pub fn fulfill(self, value: T) {
        debug!(edge = self.name, "Dependency edge fulfilled");
        // Send only fails when no consumer is left, which is harmless
        let _ = self.tx.send(Some(value));
    }
}

/// Consuming end of an edge; clone one per consumer
#[derive(Clone)]
pub struct EdgeRx<T> {
    name: &'static str,
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> EdgeRx<T> {
    /// Wait for the producer to fulfill the edge and take the value.
    ///
    /// Fails with `DependencyNotReady` if the producer is gone without
    /// fulfilling, which happens when it aborted with its own error.
    pub async fn ready(mut self) -> Result<T, ProvisionError> {
        let name = self.name;
        let value = self
            .rx
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| ProvisionError::DependencyNotReady(name))?
            .clone();
        value.ok_or(ProvisionError::DependencyNotReady(name))
    }
}

/// A set of named provisioning tasks executed concurrently
pub struct TaskGraph {
    tasks: Vec<(&'static str, BoxFuture<'static, Result<(), ProvisionError>>)>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Add a named task. Ordering between tasks comes only from the
    /// edges they await, never from insertion order.
    pub fn add<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), ProvisionError>> + Send + 'static,
    {
        self.tasks.push((name, task.boxed()));
    }

    /// Run every task to completion, or abort all on the first failure.
    ///
    /// The error reported is the originating one: a task's own failure
    /// is preferred over the `DependencyNotReady` errors it cascades
    /// into downstream consumers.
    pub async fn run(self) -> Result<(), ProvisionError> {
        let mut set = JoinSet::new();
        for (name, task) in self.tasks {
            set.spawn(async move {
                let result = task.await;
                (name, result)
            });
        }

        let mut first_error: Option<ProvisionError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(task = name, "Provisioning task completed");
                }
                Ok((name, Err(e))) => {
                    error!(task = name, error = %e, "Provisioning task failed");
                    let replace = match (&first_error, &e) {
                        (None, _) => true,
                        (
                            Some(ProvisionError::DependencyNotReady(_)),
                            ProvisionError::DependencyNotReady(_),
                        ) => false,
                        (Some(ProvisionError::DependencyNotReady(_)), _) => true,
                        _ => false,
                    };
                    if replace {
                        first_error = Some(e);
                    }
                    set.abort_all();
                }
                Err(join_error) if join_error.is_cancelled() => {}
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(ProvisionError::Internal(join_error.to_string()));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_consumer_waits_for_producer() {
        let (tx, rx) = edge::<u32>("value");
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = seen.clone();

        let mut graph = TaskGraph::new();
        graph.add("producer", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.fulfill(7);
            Ok(())
        });
        graph.add("consumer", async move {
            let value = rx.ready().await?;
            assert_eq!(value, 7);
            seen_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        graph.run().await.unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unfulfilled_edge_fails_consumer_with_dependency_not_ready() {
        let (tx, rx) = edge::<u32>("abandoned");

        let mut graph = TaskGraph::new();
        graph.add("producer", async move {
            // Finish without fulfilling
            drop(tx);
            Ok(())
        });
        graph.add("consumer", async move {
            rx.ready().await?;
            Ok(())
        });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(err, ProvisionError::DependencyNotReady("abandoned")));
    }

    #[tokio::test]
    async fn test_first_real_error_wins_over_cascaded_not_ready() {
        let (tx, rx) = edge::<u32>("downstream");

        let mut graph = TaskGraph::new();
        graph.add("failing-producer", async move {
            drop(tx);
            Err(ProvisionError::KeyRegistrationFailure("quota".to_string()))
        });
        graph.add("consumer", async move {
            rx.ready().await?;
            Ok(())
        });

        let err = graph.run().await.unwrap_err();
        assert!(matches!(err, ProvisionError::KeyRegistrationFailure(_)));
    }

    #[tokio::test]
    async fn test_independent_tasks_run_concurrently() {
        // Two tasks that each wait on the other's edge would deadlock if
        // run sequentially; concurrent execution lets them hand off.
        let (tx_a, rx_a) = edge::<u32>("a");
        let (tx_b, rx_b) = edge::<u32>("b");

        let mut graph = TaskGraph::new();
        graph.add("first", async move {
            tx_a.fulfill(1);
            let b = rx_b.ready().await?;
            assert_eq!(b, 2);
            Ok(())
        });
        graph.add("second", async move {
            let a = rx_a.ready().await?;
            assert_eq!(a, 1);
            tx_b.fulfill(2);
            Ok(())
        });

        tokio::time::timeout(Duration::from_secs(1), graph.run())
            .await
            .expect("graph deadlocked")
            .unwrap();
    }
}
