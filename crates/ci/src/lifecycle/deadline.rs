//! Overall time budget of a run's forward path.

use pipeprobe_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Absolute deadline shared by every forward step of one run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now, or none at all.
    #[must_use]
    pub fn after(budget: Option<Duration>) -> Self {
        Self {
            at: budget.map(|b| Instant::now() + b),
            budget: budget.unwrap_or_default(),
        }
    }

    /// Run `step`, aborting it with [`Error::DeadlineExceeded`] once the deadline passes.
    ///
    /// The step's future is dropped on expiry, which cancels any subprocess or
    /// request it owns.
    pub async fn guard<T, F>(&self, stage: &str, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let Some(at) = self.at else {
            return step.await;
        };
        tokio::time::timeout_at(at, step)
            .await
            .map_err(|_| Error::DeadlineExceeded {
                stage: stage.to_string(),
                seconds: self.budget.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_passes_through_results() {
        let deadline = Deadline::after(Some(Duration::from_secs(10)));
        let value = deadline.guard("clone", async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_expires() {
        let deadline = Deadline::after(Some(Duration::from_secs(10)));
        let err = deadline
            .guard("push", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded { ref stage, seconds: 10 } if stage == "push"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_never_expires() {
        let deadline = Deadline::after(None);
        deadline
            .guard("poll", async {
                tokio::time::sleep(Duration::from_secs(86_400)).await;
                Ok(())
            })
            .await
            .unwrap();
    }
}
