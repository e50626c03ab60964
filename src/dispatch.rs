use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};

/// The event dispatch tasks a supervisor has spawned. Bounded: once
/// `max_in_flight` tasks are running, `reserve` and `spawn` wait for one to
/// finish.
pub(crate) struct DispatchGroup {
    tasks: JoinSet<()>,
    max_in_flight: usize,
}

impl DispatchGroup {
    pub(crate) fn new(max_in_flight: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            max_in_flight: max_in_flight.max(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until there is room for one more dispatch. Cancel-safe, so the
    /// wait can be raced against a stop request.
    pub(crate) async fn reserve(&mut self) {
        self.reap();
        while self.tasks.len() >= self.max_in_flight {
            debug!(target: "Client/Dispatch", "{} dispatches in flight, waiting", self.tasks.len());
            match self.tasks.join_next().await {
                Some(result) => log_outcome(result),
                None => break,
            }
        }
    }

    pub(crate) async fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reserve().await;
        self.tasks.spawn(task);
    }

    /// Waits up to `timeout` for running dispatches, then aborts the rest.
    /// Returns how many were aborted.
    pub(crate) async fn drain(&mut self, timeout: Duration) -> usize {
        let tasks = &mut self.tasks;
        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                log_outcome(result);
            }
        })
        .await;

        let remaining = self.tasks.len();
        if finished.is_err() && remaining > 0 {
            warn!(target: "Client/Dispatch", "Aborting {remaining} event dispatches still running at shutdown");
            self.tasks.abort_all();
            // Aborted tasks still have to be reaped to free the set.
            while self.tasks.join_next().await.is_some() {}
        }
        remaining
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_outcome(result);
        }
    }
}

fn log_outcome(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(target: "Client/Dispatch", "Event dispatch panicked: {e}");
        }
    }
}
