use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// Runs one action handler on its own task under the server's deadline.
///
/// The deadline is `timeout_ms / 1000` whole seconds; zero means the caller
/// waits for as long as the handler takes. A handler that overruns is
/// abandoned: with `kill_on_timeout` its cancellation token is triggered and
/// the task aborted, otherwise it keeps running detached. Either way the
/// caller gets `AgentError::NoResult`.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutExecutor {
    budget: Option<Duration>,
    kill_on_timeout: bool,
}

impl TimeoutExecutor {
    pub fn new(timeout_ms: u64, kill_on_timeout: bool) -> Self {
        let secs = timeout_ms / 1000;
        TimeoutExecutor {
            budget: (secs > 0).then(|| Duration::from_secs(secs)),
            kill_on_timeout,
        }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    pub async fn run<T, F>(
        &self,
        label: impl Display,
        cancel: CancellationToken,
        work: F,
    ) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AgentError>> + Send + 'static,
    {
        let mut handle = tokio::spawn(work);

        let Some(budget) = self.budget else {
            return handle.await?;
        };

        match tokio::time::timeout(budget, &mut handle).await {
            Ok(joined) => joined?,
            Err(_) => {
                log::warn!("Action timed out after {budget:?}: {label}");
                if self.kill_on_timeout {
                    cancel.cancel();
                    handle.abort();
                    log::warn!("Action forcibly stopped: {label}");
                }
                Err(AgentError::NoResult)
            }
        }
    }
}
