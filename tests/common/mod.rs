//! Common helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use runvisor::{Diagnostic, DiagnosticKind, RunnerBuilder, Subscribe};

/// Serializes invocations: signal handlers are process-wide and only one
/// invocation may own them at a time.
pub fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscriber that keeps every diagnostic it receives.
#[derive(Default)]
pub struct Collect {
    seen: Mutex<Vec<Diagnostic>>,
}

impl Collect {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.seen.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.snapshot().into_iter().map(|d| d.kind).collect()
    }
}

#[async_trait]
impl Subscribe for Collect {
    async fn on_diagnostic(&self, d: &Diagnostic) {
        self.seen.lock().unwrap().push(d.clone());
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}

/// Builder pre-wired with `collect` as the only subscriber.
pub fn builder(collect: &Arc<Collect>) -> RunnerBuilder {
    RunnerBuilder::default().with_subscribers(vec![collect.clone() as Arc<dyn Subscribe>])
}
