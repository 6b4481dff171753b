use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use futures::future::{BoxFuture, FutureExt};
use tracing::warn;

/// Work scheduled during a request that must only run once the response
/// has been delivered. Tasks are best-effort: nothing observes their
/// outcome and they are lost if the process stops first.
#[derive(Clone, Default)]
pub struct DeferredWork {
    tasks: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl DeferredWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.lock().push(task.boxed());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<BoxFuture<'static, ()>> {
        std::mem::take(&mut *self.lock())
    }

    /// Hands every pending task to the runtime without waiting for it.
    pub fn spawn_all(&self) {
        let tasks = self.take();
        if tasks.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                for task in tasks {
                    handle.spawn(task);
                }
            }
            Err(_) => warn!(
                dropped = tasks.len(),
                "no runtime available for deferred work"
            ),
        }
    }

    /// Runs every pending task to completion, in scheduling order.
    pub async fn run_all(&self) {
        for task in self.take() {
            task.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BoxFuture<'static, ()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/deferred_tests.rs"]
mod tests;
