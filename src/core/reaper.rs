//! # Shutdown reaper: unconditional cleanup of leftover work.
//!
//! Runs once the supervisor concluded, whatever the conclusion was.
//!
//! ```text
//! reap()
//!   1. registry.close()                         further spawns/finalizers are rejected
//!   2. registry.drain()                         tasks still live (incl. an abandoned entrypoint)
//!                                               finished ones not yet unregistered are skipped
//!   3. token.cancel() for each                  abortable: dropped / cooperative: asked to stop
//!   4. join all ──(reap_grace elapsed)──► abort stragglers, join again
//!   5. Failed cells ──► ShutdownFailure diagnostics
//!   6. finalizers, concurrently ──(panic)──► FinalizerFailure diagnostics
//!   7. executor binding: owned pool → shutdown (off the scheduler thread)
//!                        external   → unbind only
//! ```
//!
//! Nothing here returns an error: every failure observed while reaping goes to the
//! diagnostic channel so it cannot mask the outcome already produced.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::core::registry::Entry;
use crate::core::Scheduler;
use crate::error::panic_message;
use crate::events::{Diagnostic, DiagnosticKind};
use crate::subscribers::SubscriberSet;

/// Counters of one reaping pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reaped {
    /// Tasks found live when reaping started.
    pub(crate) tasks: usize,
    /// Tasks that failed during their cleanup.
    pub(crate) failed: usize,
    /// Cooperative tasks aborted once `reap_grace` elapsed.
    pub(crate) aborted: usize,
    /// Finalizers run.
    pub(crate) finalizers: usize,
}

/// Cleans up what the entrypoint left behind on its scheduler.
pub(crate) struct Reaper<'a> {
    scheduler: &'a Scheduler,
    subs: &'a SubscriberSet,
    grace: Option<Duration>,
}

impl<'a> Reaper<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler, subs: &'a SubscriberSet) -> Self {
        Self {
            scheduler,
            subs,
            grace: None,
        }
    }

    /// Bounds the wait for cancelled cooperative tasks.
    pub(crate) fn grace(mut self, grace: Option<Duration>) -> Self {
        self.grace = grace;
        self
    }

    pub(crate) async fn reap(self) -> Reaped {
        let registry = self.scheduler.registry();
        registry.close();

        // A wrapper records its outcome before its exit guard unregisters it, so a
        // task that already concluded (e.g. the entrypoint on a multi-thread
        // runtime) can still be drained here. Its failure is not a shutdown failure.
        let mut entries: Vec<Entry> = registry
            .drain()
            .into_iter()
            .filter(|e| !e.cell.state().is_finished())
            .collect();
        let mut report = Reaped {
            tasks: entries.len(),
            ..Reaped::default()
        };

        for entry in &entries {
            entry.cancel.cancel();
        }
        report.aborted = self.join(&mut entries).await;

        for entry in &entries {
            if let Some(message) = entry.cell.failure() {
                report.failed += 1;
                self.subs.emit(
                    &Diagnostic::new(DiagnosticKind::ShutdownFailure)
                        .with_task(entry.id)
                        .with_task_name(Arc::clone(&entry.name))
                        .with_error(message),
                );
            }
        }

        report.finalizers = self.run_finalizers().await;
        self.release_executor().await;

        tracing::debug!(
            tasks = report.tasks,
            failed = report.failed,
            aborted = report.aborted,
            finalizers = report.finalizers,
            "reaping complete"
        );
        report
    }

    /// Awaits every entry; returns how many had to be aborted.
    async fn join(&self, entries: &mut [Entry]) -> usize {
        let all = join_all(entries.iter_mut().map(|e| &mut e.join));
        let Some(grace) = self.grace else {
            all.await;
            return 0;
        };
        if tokio::time::timeout(grace, all).await.is_ok() {
            return 0;
        }

        // handles already driven to completion must not be polled again
        let stragglers: Vec<&mut JoinHandle<()>> = entries
            .iter_mut()
            .map(|e| &mut e.join)
            .filter(|j| !j.is_finished())
            .collect();
        for join in &stragglers {
            join.abort();
        }
        let aborted = stragglers.len();
        tracing::debug!(aborted, grace = ?grace, "reap grace elapsed, aborting stragglers");
        join_all(stragglers).await;
        aborted
    }

    async fn run_finalizers(&self) -> usize {
        let finalizers = self.scheduler.registry().take_finalizers();
        let count = finalizers.len();

        let outcomes = join_all(finalizers.into_iter().map(|f| async move {
            let out = AssertUnwindSafe(f.fut).catch_unwind().await;
            (f.name, out)
        }))
        .await;

        for (name, out) in outcomes {
            if let Err(payload) = out {
                self.subs.emit(
                    &Diagnostic::new(DiagnosticKind::FinalizerFailure)
                        .with_task_name(name)
                        .with_error(panic_message(payload.as_ref())),
                );
            }
        }
        count
    }

    async fn release_executor(&self) {
        let Some(owned) = self.scheduler.executor_binding().release() else {
            return;
        };
        // Executor::shutdown joins worker threads
        match tokio::task::spawn_blocking(move || owned.shutdown()).await {
            Ok(()) => tracing::debug!("default executor shut down"),
            Err(e) => tracing::warn!(error = %e, "default executor shutdown failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecutorError, SpawnError};
    use crate::executor::{Executor, ExecutorBinding, ThreadPool};
    use crate::subscribers::Subscribe;
    use crate::tasks::TaskState;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::runtime::Handle;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Diagnostic>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_diagnostic(&self, d: &Diagnostic) {
            self.0.lock().unwrap().push(d.clone());
        }
    }

    fn subs() -> (Arc<Collect>, SubscriberSet) {
        let collect = Arc::new(Collect::default());
        let set = SubscriberSet::new(vec![collect.clone() as Arc<dyn Subscribe>]);
        (collect, set)
    }

    #[tokio::test]
    async fn leftovers_are_cancelled() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (collect, set) = subs();

        let orphan = s.spawn("orphan", std::future::pending::<()>()).unwrap();
        let coop = s
            .spawn_cancellable("coop", |token| async move {
                token.cancelled().await;
                "flushed"
            })
            .unwrap();
        let done = s.spawn("done", async { 1 }).unwrap();
        assert_eq!(done.await.unwrap(), 1);

        let report = Reaper::new(&s, &set).reap().await;
        assert_eq!(report.tasks, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(orphan.state(), TaskState::Cancelled);
        assert_eq!(coop.state(), TaskState::Completed);
        assert_eq!(coop.await.unwrap(), "flushed");
        assert_eq!(s.live_tasks(), 0);

        set.shutdown().await;
        assert!(collect.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_panic_is_reported() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (collect, set) = subs();

        let flusher = s
            .spawn_cancellable("flusher", |token| async move {
                token.cancelled().await;
                panic!("disk full");
            })
            .unwrap();

        let report = Reaper::new(&s, &set).reap().await;
        assert_eq!(report.failed, 1);
        assert_eq!(flusher.state(), TaskState::Failed);

        set.shutdown().await;
        let seen = collect.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::ShutdownFailure);
        assert_eq!(seen[0].message, "unhandled exception during shutdown");
        assert_eq!(seen[0].task, Some(flusher.id()));
        assert_eq!(seen[0].task_name.as_deref(), Some("flusher"));
        assert_eq!(seen[0].error.as_deref(), Some("disk full"));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_aborts_stragglers() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (_collect, set) = subs();

        let stubborn = s
            .spawn_cancellable("stubborn", |_token| std::future::pending::<()>())
            .unwrap();

        let report = Reaper::new(&s, &set)
            .grace(Some(Duration::from_millis(50)))
            .reap()
            .await;
        assert_eq!(report.aborted, 1);
        assert_eq!(stubborn.state(), TaskState::Cancelled);
        set.shutdown().await;
    }

    #[tokio::test]
    async fn finalizers_run_and_late_work_is_rejected() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (collect, set) = subs();

        let (tx, rx) = tokio::sync::oneshot::channel();
        s.on_shutdown("pool", async move {
            let _ = tx.send(());
        })
        .unwrap();
        s.on_shutdown("broken", async {
            panic!("close failed");
        })
        .unwrap();

        let report = Reaper::new(&s, &set).reap().await;
        assert_eq!(report.finalizers, 2);
        rx.await.unwrap();

        assert_eq!(s.spawn("late", async {}).unwrap_err(), SpawnError::Closed);
        assert_eq!(s.on_shutdown("late", async {}), Err(SpawnError::Closed));

        set.shutdown().await;
        let seen = collect.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::FinalizerFailure);
        assert_eq!(seen[0].task_name.as_deref(), Some("broken"));
        assert_eq!(seen[0].error.as_deref(), Some("close failed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concluded_tasks_are_not_reported() {
        for _ in 0..200 {
            let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
            let (collect, set) = subs();

            let bad = s
                .spawn("bad", async {
                    if true {
                        panic!("before shutdown");
                    }
                })
                .unwrap();
            assert_eq!(bad.await.unwrap_err().as_label(), "task_panicked");

            let report = Reaper::new(&s, &set).reap().await;
            assert_eq!(report.tasks, 0);
            assert_eq!(report.failed, 0);

            set.shutdown().await;
            assert!(collect.0.lock().unwrap().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_grace_aborts_right_away() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (_collect, set) = subs();

        let stubborn = s
            .spawn_cancellable("stubborn", |_token| std::future::pending::<()>())
            .unwrap();

        let report = Reaper::new(&s, &set)
            .grace(Some(Duration::ZERO))
            .reap()
            .await;
        assert_eq!(report.aborted, 1);
        assert_eq!(stubborn.state(), TaskState::Cancelled);
        set.shutdown().await;
    }

    #[tokio::test]
    async fn owned_executor_is_shut_down() {
        let s = Scheduler::new(Handle::current(), ExecutorBinding::lazy(1));
        let (_collect, set) = subs();

        let exec = s.executor().unwrap();
        Reaper::new(&s, &set).reap().await;

        assert!(exec.is_shutdown());
        assert_eq!(exec.execute(Box::new(|| {})), Err(ExecutorError::Shutdown));
        assert!(matches!(s.executor(), Err(ExecutorError::Unbound)));
        set.shutdown().await;
    }

    #[tokio::test]
    async fn external_executor_is_only_unbound() {
        let pool: Arc<dyn Executor> = Arc::new(ThreadPool::new(1).unwrap());
        let s = Scheduler::new(Handle::current(), ExecutorBinding::external(Arc::clone(&pool)));
        let (_collect, set) = subs();

        Reaper::new(&s, &set).reap().await;

        assert!(!pool.is_shutdown());
        let (tx, rx) = std::sync::mpsc::channel();
        pool.execute(Box::new(move || tx.send(3).unwrap())).unwrap();
        assert_eq!(rx.recv().unwrap(), 3);
        tokio::task::spawn_blocking(move || pool.shutdown())
            .await
            .unwrap();
        set.shutdown().await;
    }
}
