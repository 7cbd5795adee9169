mod common;

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use runvisor::{
    DiagnosticKind, Executor, ExecutorError, Runner, Scheduler, SpawnError, TaskState,
    Termination, ThreadPool,
};

use common::{builder, serial, Collect};

#[test]
fn early_return_forces_termination() {
    let _serial = serial();
    let out = runvisor::run(|termination: Termination, _s: Scheduler| async move {
        Ok::<_, Infallible>(termination)
    });
    let termination = out.unwrap().unwrap();
    assert!(termination.is_resolved());
}

#[test]
fn resolving_twice_is_harmless() {
    let _serial = serial();
    let out = runvisor::run(|termination: Termination, _s: Scheduler| async move {
        termination.resolve();
        termination.resolve();
        termination.resolved().await;
        Ok::<_, Infallible>(termination.is_resolved())
    });
    assert_eq!(out.unwrap(), Some(true));
}

#[test]
fn descendants_are_cancelled() {
    let _serial = serial();
    let out = runvisor::run(|_t: Termination, scheduler: Scheduler| async move {
        let orphan = scheduler
            .spawn("orphan", std::future::pending::<()>())
            .map_err(|e| e.as_label())?;
        Ok::<_, &'static str>(orphan)
    });

    let orphan = out.unwrap().unwrap();
    assert_eq!(orphan.name(), "orphan");
    assert_eq!(orphan.state(), TaskState::Cancelled);
    let awaited = futures::executor::block_on(orphan);
    assert!(awaited.unwrap_err().is_cancelled());
}

#[test]
fn cleanup_failure_is_a_diagnostic_not_an_error() {
    let _serial = serial();
    let collect = Collect::new();
    let runner = builder(&collect).build();

    let out = runner.run(|_t: Termination, scheduler: Scheduler| async move {
        let flusher = scheduler.spawn_cancellable("flusher", |token| async move {
            token.cancelled().await;
            panic!("flush failed");
        })?;
        Ok::<_, SpawnError>(flusher)
    });

    let flusher = out.unwrap().unwrap();
    assert_eq!(flusher.state(), TaskState::Failed);

    let seen = collect.snapshot();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, DiagnosticKind::ShutdownFailure);
    assert_eq!(seen[0].message, "unhandled exception during shutdown");
    assert_eq!(seen[0].task, Some(flusher.id()));
    assert_eq!(seen[0].error.as_deref(), Some("flush failed"));
}

#[test]
fn finalizers_run_after_reaping() {
    let _serial = serial();
    let collect = Collect::new();
    let runner = builder(&collect).build();
    let (tx, rx) = std::sync::mpsc::channel();

    let out = runner.run(move |_t: Termination, scheduler: Scheduler| async move {
        let sleeper = scheduler.spawn("sleeper", std::future::pending::<()>())?;
        scheduler.on_shutdown("report", async move {
            let _ = tx.send(sleeper.state());
        })?;
        scheduler.on_shutdown("broken", async {
            panic!("pool close failed");
        })?;
        Ok::<_, SpawnError>(())
    });

    assert!(out.is_ok());
    assert_eq!(rx.recv().unwrap(), TaskState::Cancelled);
    assert_eq!(collect.kinds(), vec![DiagnosticKind::FinalizerFailure]);
    assert_eq!(collect.snapshot()[0].task_name.as_deref(), Some("broken"));
}

#[test]
fn reap_grace_aborts_stubborn_tasks() {
    let _serial = serial();
    let runner = Runner::builder()
        .reap_grace(Duration::from_millis(100))
        .build();

    let out = runner.run(|_t: Termination, scheduler: Scheduler| async move {
        let stubborn = scheduler
            .spawn_cancellable("stubborn", |_token| std::future::pending::<()>())?;
        Ok::<_, SpawnError>(stubborn)
    });

    let stubborn = out.unwrap().unwrap();
    assert_eq!(stubborn.state(), TaskState::Cancelled);
}

#[test]
fn scheduler_rejects_work_after_return() {
    let _serial = serial();
    let out = runvisor::run(|_t: Termination, scheduler: Scheduler| async move {
        Ok::<_, Infallible>(scheduler)
    });

    let scheduler = out.unwrap().unwrap();
    assert!(scheduler.is_closed());
    assert_eq!(scheduler.live_tasks(), 0);
    assert_eq!(
        scheduler.spawn("late", async {}).unwrap_err(),
        SpawnError::Closed
    );
    let offload = futures::executor::block_on(scheduler.run_blocking(|| 1));
    assert_eq!(offload, Err(ExecutorError::Unbound));
}

#[test]
fn default_executor_is_shut_down() {
    let _serial = serial();
    let out = runvisor::run(|_t: Termination, scheduler: Scheduler| async move {
        let answer = scheduler.run_blocking(|| 6 * 7).await?;
        let executor = scheduler.executor()?;
        Ok::<_, ExecutorError>((answer, executor))
    });

    let (answer, executor) = out.unwrap().unwrap();
    assert_eq!(answer, 42);
    assert!(executor.is_shutdown());
    assert_eq!(
        executor.execute(Box::new(|| {})),
        Err(ExecutorError::Shutdown)
    );
}

#[test]
fn external_executor_is_only_unbound() {
    let _serial = serial();
    let pool = Arc::new(ThreadPool::new(2).unwrap());
    let runner = Runner::builder().executor(pool.clone()).build();

    let out = runner.run(|_t: Termination, scheduler: Scheduler| async move {
        scheduler.run_blocking(|| "offloaded").await
    });
    assert_eq!(out.unwrap(), Some("offloaded"));

    assert!(!pool.is_shutdown());
    let (tx, rx) = std::sync::mpsc::channel();
    pool.execute(Box::new(move || tx.send("still serving").unwrap()))
        .unwrap();
    assert_eq!(rx.recv().unwrap(), "still serving");
    pool.shutdown();
}

#[test]
fn entrypoint_panic_is_reraised_after_cleanup() {
    let _serial = serial();
    let runner = Runner::default();

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        runner.run(|_t: Termination, _s: Scheduler| async {
            if true {
                panic!("entrypoint exploded");
            }
            Ok::<_, Infallible>(())
        })
    }));
    let payload = caught.unwrap_err();
    assert_eq!(
        payload.downcast_ref::<&str>(),
        Some(&"entrypoint exploded")
    );

    // handlers and the scheduler were released: the next invocation works
    let out = runner.run(|_t: Termination, _s: Scheduler| async { Ok::<_, Infallible>(1) });
    assert_eq!(out.unwrap(), Some(1));
}

#[test]
fn entrypoint_panic_is_never_a_shutdown_failure() {
    let _serial = serial();
    for _ in 0..100 {
        let collect = Collect::new();
        let runner = builder(&collect)
            .scheduler_factory(|| {
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(4)
                    .enable_all()
                    .build()
            })
            .build();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            runner.run(|_t: Termination, _s: Scheduler| async {
                if true {
                    panic!("boom");
                }
                Ok::<_, Infallible>(())
            })
        }));
        assert!(caught.is_err());
        assert_eq!(collect.kinds(), Vec::<DiagnosticKind>::new());
    }
}

#[test]
fn zero_exit_timeout_abandons_immediately() {
    let _serial = serial();
    let collect = Collect::new();
    let runner = builder(&collect).exit_timeout(Duration::ZERO).build();

    let started = Instant::now();
    let out = runner.run(|termination: Termination, _s: Scheduler| async move {
        termination.resolve();
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok::<_, Infallible>("late")
    });
    let elapsed = started.elapsed();

    assert_eq!(out.unwrap(), None);
    assert!(elapsed < Duration::from_secs(1), "elapsed {elapsed:?}");
    let seen = collect.snapshot();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, DiagnosticKind::EntrypointTimeout);
    assert_eq!(seen[0].timeout_ms, Some(0));
}

#[test]
fn multi_thread_factory_is_supported() {
    let _serial = serial();
    let runner = Runner::builder()
        .scheduler_factory(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
        })
        .build();

    let out = runner.run(|_t: Termination, scheduler: Scheduler| async move {
        let mut handles = Vec::new();
        for n in 0..8u64 {
            handles.push(scheduler.spawn("square", async move { n * n })?);
        }
        let orphan = scheduler.spawn("orphan", std::future::pending::<()>())?;

        let mut sum = 0;
        for h in handles {
            sum += h.await.unwrap_or_default();
        }
        Ok::<_, SpawnError>((sum, orphan))
    });

    let (sum, orphan) = out.unwrap().unwrap();
    assert_eq!(sum, 140);
    assert_eq!(orphan.state(), TaskState::Cancelled);
}
