//! A fan-out/fan-in group of spawned tasks with a single join point.
use futures::future::join_all;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawns named tasks and awaits all of them at one barrier.
///
/// Nothing spawned into the group is observed until [`TaskGroup::join_all`]
/// returns, so callers never act on partial results.
#[derive(Debug, Default)]
pub struct TaskGroup {
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a new task and adds its handle to the group.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name, handle));
    }

    /// Number of tasks spawned and not yet joined.
    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for every task in the group. Returns the number of tasks that panicked.
    pub async fn join_all(self) -> usize {
        let handles = self
            .handles
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let task_names: Vec<&'static str> = handles.iter().map(|(name, _)| *name).collect();
        debug!(tasks = handles.len(), "Awaiting task group.");

        let results = join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        let mut panicked = 0;
        for (task_name, result) in task_names.into_iter().zip(results) {
            if let Err(e) = result {
                error!(task_name, error = %e, "Task failed before completing.");
                panicked += 1;
            }
        }
        panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_waits_for_every_task() {
        let group = TaskGroup::new();
        let done = Arc::new(AtomicUsize::new(0));
        for i in 0..5u64 {
            let done = done.clone();
            group.spawn("sleeper", async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(group.len(), 5);

        let panicked = group.join_all().await;
        assert_eq!(panicked, 0);
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_panicking_task_is_counted() {
        let group = TaskGroup::new();
        group.spawn("ok", async {});
        group.spawn("boom", async { panic!("probe exploded") });
        assert_eq!(group.join_all().await, 1);
    }
}
