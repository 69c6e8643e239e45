//! One-shot completion signal for bridge lifecycle calls
//!
//! Every `start` or `stop` the coordinator issues gets its own
//! [`CompletionSignal`] / [`Completion`] pair. The bridge task completes the
//! signal with the bridge's result; the coordinator waits on the completion
//! as part of its barrier.
//!
//! # Invariants
//!
//! - A signal completes at most once (`complete` consumes it)
//! - A signal dropped without completing resolves its completion as
//!   [`CompletionOutcome::Abandoned`], so the waiter always gets exactly one
//!   outcome
//! - A completion that misses its deadline resolves as
//!   [`CompletionOutcome::TimedOut`]; the late result is discarded

use majakka_core::BridgeError;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Create a connected signal/completion pair
pub fn completion_pair() -> (CompletionSignal, Completion) {
    let (tx, rx) = oneshot::channel();
    (CompletionSignal { tx }, Completion { rx })
}

/// Write side, held by whoever runs the bridge call
#[derive(Debug)]
pub struct CompletionSignal {
    tx: oneshot::Sender<Result<(), BridgeError>>,
}

impl CompletionSignal {
    /// Deliver the result of the bridge call
    ///
    /// Returns `false` if nobody is waiting anymore (the waiter timed out).
    pub fn complete(self, result: Result<(), BridgeError>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Shorthand for `complete(Ok(()))`
    pub fn succeed(self) -> bool {
        self.complete(Ok(()))
    }

    /// Shorthand for `complete(Err(err))`
    pub fn fail(self, err: BridgeError) -> bool {
        self.complete(Err(err))
    }

    /// Whether the waiter has gone away
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side, awaited by the coordinator
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), BridgeError>>,
}

/// What a completion resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The bridge call succeeded
    Completed,
    /// The bridge call reported an error
    Failed(BridgeError),
    /// The signal was dropped without completing (e.g. the task panicked)
    Abandoned,
    /// The deadline passed first
    TimedOut,
}

impl CompletionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompletionOutcome::Completed)
    }
}

impl Completion {
    /// Wait for the signal without a deadline
    pub async fn wait(self) -> CompletionOutcome {
        match self.rx.await {
            Ok(Ok(())) => CompletionOutcome::Completed,
            Ok(Err(e)) => CompletionOutcome::Failed(e),
            Err(_) => CompletionOutcome::Abandoned,
        }
    }

    /// Wait for the signal until `deadline`, or forever if `None`
    pub async fn wait_until(self, deadline: Option<Instant>) -> CompletionOutcome {
        match deadline {
            None => self.wait().await,
            Some(deadline) => tokio::time::timeout_at(deadline, self.wait())
                .await
                .unwrap_or(CompletionOutcome::TimedOut),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_success_is_delivered() {
        let (signal, completion) = completion_pair();
        assert!(signal.succeed());
        assert_eq!(completion.wait().await, CompletionOutcome::Completed);
    }

    #[tokio::test]
    async fn test_failure_is_delivered() {
        let (signal, completion) = completion_pair();
        signal.fail(BridgeError::Init("no token".into()));
        assert_eq!(
            completion.wait().await,
            CompletionOutcome::Failed(BridgeError::Init("no token".into()))
        );
    }

    #[tokio::test]
    async fn test_dropped_signal_is_abandoned() {
        let (signal, completion) = completion_pair();
        drop(signal);
        assert_eq!(completion.wait().await, CompletionOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_panicking_task_abandons_signal() {
        let (signal, completion) = completion_pair();
        let handle = tokio::spawn(async move {
            let _signal = signal;
            panic!("bridge blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(completion.wait().await, CompletionOutcome::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out() {
        let (signal, completion) = completion_pair();
        let deadline = Instant::now() + Duration::from_millis(50);

        let outcome = completion.wait_until(Some(deadline)).await;
        assert_eq!(outcome, CompletionOutcome::TimedOut);

        // late completion finds nobody listening
        assert!(signal.is_abandoned());
        assert!(!signal.succeed());
    }

    #[tokio::test]
    async fn test_no_deadline_waits() {
        let (signal, completion) = completion_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal.succeed();
        });
        assert!(completion.wait_until(None).await.is_success());
    }
}
