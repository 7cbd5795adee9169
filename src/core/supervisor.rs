//! # Entrypoint supervisor: race completion against termination.
//!
//! Waits for the first of two events, with no priority between them:
//!
//! ```text
//! supervise(entry, termination, exit_timeout)
//!   select! (unbiased)
//!     ├─ entry finished ─────────► termination.resolve()   nothing waiting on it can hang
//!     │                            └─► Conclusion from the entry outcome
//!     └─ termination resolved ───► timeout(exit_timeout, entry)
//!                                    ├─ finished ─► Conclusion from the entry outcome
//!                                    └─ elapsed  ─► emit EntrypointTimeout
//!                                                   └─► Conclusion::Abandoned
//! ```
//!
//! ## Rules
//! - The supervisor never cancels the entrypoint. An abandoned entrypoint stays
//!   registered on the scheduler and is cancelled later by the reaper.
//! - `exit_timeout` bounds only the wait **after** termination resolved.
//! - Exactly one timeout diagnostic is emitted per abandoned entrypoint.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use crate::core::Termination;
use crate::error::TaskError;
use crate::events::{Diagnostic, DiagnosticKind};
use crate::subscribers::SubscriberSet;
use crate::tasks::TaskHandle;

/// Final outcome of the supervised entrypoint.
pub(crate) enum Conclusion<T, E> {
    /// The entrypoint returned a value.
    Returned(T),
    /// The entrypoint returned an error.
    Failed(E),
    /// The entrypoint panicked; the payload is re-raised on the caller thread.
    Panicked(Box<dyn Any + Send + 'static>),
    /// The entrypoint task was dropped before producing an outcome.
    Cancelled,
    /// Termination resolved and the entrypoint overran the exit timeout.
    Abandoned,
}

impl<T, E> Conclusion<T, E> {
    fn from_outcome(outcome: Result<Result<T, E>, TaskError>) -> Self {
        match outcome {
            Ok(Ok(value)) => Conclusion::Returned(value),
            Ok(Err(e)) => Conclusion::Failed(e),
            Err(TaskError::Panicked { payload, .. }) => Conclusion::Panicked(payload),
            Err(TaskError::Cancelled) => Conclusion::Cancelled,
        }
    }

    fn as_label(&self) -> &'static str {
        match self {
            Conclusion::Returned(_) => "returned",
            Conclusion::Failed(_) => "failed",
            Conclusion::Panicked(_) => "panicked",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Abandoned => "abandoned",
        }
    }
}

impl<T, E> fmt::Debug for Conclusion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Supervises `entry` until it concludes or is abandoned.
///
/// `entry` is borrowed so the task stays registered (and reapable) when abandoned.
pub(crate) async fn supervise<T, E>(
    entry: &mut TaskHandle<Result<T, E>>,
    termination: &Termination,
    exit_timeout: Option<Duration>,
    subs: &SubscriberSet,
) -> Conclusion<T, E> {
    let outcome = tokio::select! {
        outcome = &mut *entry => {
            termination.resolve();
            outcome
        }
        _ = termination.resolved() => {
            tracing::debug!(task = %entry.id(), "termination requested, waiting for entrypoint");
            match exit_timeout {
                None => (&mut *entry).await,
                Some(dur) => match tokio::time::timeout(dur, &mut *entry).await {
                    Ok(outcome) => outcome,
                    Err(elapsed) => {
                        subs.emit(
                            &Diagnostic::new(DiagnosticKind::EntrypointTimeout)
                                .with_task(entry.id())
                                .with_task_name(entry.name())
                                .with_timeout(dur)
                                .with_error(elapsed.to_string()),
                        );
                        tracing::debug!(task = %entry.id(), timeout = ?dur, "entrypoint abandoned");
                        return Conclusion::Abandoned;
                    }
                },
            }
        }
    };

    let conclusion = Conclusion::from_outcome(outcome);
    tracing::debug!(task = %entry.id(), conclusion = conclusion.as_label(), "entrypoint concluded");
    conclusion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scheduler;
    use crate::executor::ExecutorBinding;
    use crate::subscribers::Subscribe;
    use crate::tasks::TaskState;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Diagnostic>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_diagnostic(&self, d: &Diagnostic) {
            self.0.lock().unwrap().push(d.clone());
        }
    }

    fn setup() -> (Scheduler, Termination, Arc<Collect>, SubscriberSet) {
        let collect = Arc::new(Collect::default());
        let subs = SubscriberSet::new(vec![collect.clone() as Arc<dyn Subscribe>]);
        (
            Scheduler::new(Handle::current(), ExecutorBinding::lazy(1)),
            Termination::new(),
            collect,
            subs,
        )
    }

    #[tokio::test]
    async fn early_return_resolves_termination() {
        let (s, t, collect, subs) = setup();
        let mut entry = s.spawn("entrypoint", async { Ok::<_, ()>(5) }).unwrap();

        let c = supervise(&mut entry, &t, None, &subs).await;
        assert!(matches!(c, Conclusion::Returned(5)));
        assert!(t.is_resolved());

        subs.shutdown().await;
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_after_termination_is_surfaced() {
        let (s, t, collect, subs) = setup();
        let observed = t.clone();
        let mut entry = s
            .spawn("entrypoint", async move {
                observed.resolved().await;
                Err::<(), _>("stopping failed")
            })
            .unwrap();
        t.resolve();

        let c = supervise(&mut entry, &t, Some(Duration::from_secs(5)), &subs).await;
        assert!(matches!(c, Conclusion::Failed("stopping failed")));

        subs.shutdown().await;
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overrun_is_abandoned_with_one_diagnostic() {
        let (s, t, collect, subs) = setup();
        let mut entry = s
            .spawn("entrypoint", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, ()>(())
            })
            .unwrap();
        t.resolve();

        let c = supervise(&mut entry, &t, Some(Duration::from_secs(1)), &subs).await;
        assert!(matches!(c, Conclusion::Abandoned));
        assert_eq!(entry.state(), TaskState::Running);
        assert_eq!(s.live_tasks(), 1);

        subs.shutdown().await;
        let seen = collect.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::EntrypointTimeout);
        assert!(seen[0].message.contains("timeout"));
        assert_eq!(seen[0].task, Some(entry.id()));
        assert_eq!(seen[0].timeout_ms, Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_abandons_at_once() {
        let (s, t, collect, subs) = setup();
        let mut entry = s
            .spawn("entrypoint", async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, ()>("late")
            })
            .unwrap();
        t.resolve();

        let started = tokio::time::Instant::now();
        let c = supervise(&mut entry, &t, Some(Duration::ZERO), &subs).await;
        assert!(matches!(c, Conclusion::Abandoned));
        assert!(started.elapsed() < Duration::from_secs(1));

        subs.shutdown().await;
        let seen = collect.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::EntrypointTimeout);
        assert_eq!(seen[0].timeout_ms, Some(0));
    }

    #[tokio::test]
    async fn zero_timeout_still_collects_a_finished_entry() {
        let (s, t, collect, subs) = setup();
        let observed = t.clone();
        let mut entry = s
            .spawn("entrypoint", async move {
                observed.resolved().await;
                Ok::<_, ()>("stopped")
            })
            .unwrap();
        t.resolve();
        while !entry.state().is_finished() {
            tokio::task::yield_now().await;
        }

        let c = supervise(&mut entry, &t, Some(Duration::ZERO), &subs).await;
        assert!(matches!(c, Conclusion::Returned("stopped")));

        subs.shutdown().await;
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panic_payload_is_kept() {
        let (s, t, _collect, subs) = setup();
        let mut entry = s
            .spawn("entrypoint", async {
                if true {
                    panic!("entry exploded");
                }
                Ok::<(), ()>(())
            })
            .unwrap();

        match supervise(&mut entry, &t, None, &subs).await {
            Conclusion::Panicked(payload) => {
                assert_eq!(payload.downcast_ref::<&str>(), Some(&"entry exploded"));
            }
            other => panic!("unexpected conclusion: {other:?}"),
        }
        assert!(t.is_resolved());
        subs.shutdown().await;
    }
}
