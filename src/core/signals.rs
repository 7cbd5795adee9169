//! # Termination signal bridge.
//!
//! Turns OS termination signals into a resolution of the invocation's
//! [`Termination`], and restores the previous handlers on exit.
//!
//! ## Unix
//! ```text
//! arm():
//!   socketpair(reader, writer) ── writer fd published in WAKE_FD
//!   for kind in signals:  sigaction(kind, on_signal) → previous  ──► restore stack
//!   spawn listener on the scheduler: reader.read() → termination.resolve()
//!
//! OS delivers signal (any thread):
//!   on_signal(signum) → write(WAKE_FD, signum)       async-signal-safe only
//!
//! disarm() / drop:
//!   abort listener
//!   pop restore stack (LIFO) → sigaction(kind, previous)
//!   WAKE_FD = -1, close writer
//! ```
//!
//! The handler never touches scheduler state; the listener task performs the
//! transition on the scheduler. Only one bridge can be armed per process.
//!
//! ## Other platforms
//! Only Ctrl-C is observed, through [`tokio::signal::ctrl_c`]; nothing needs restoring.

use std::fmt;
use std::io;

use tokio::task::JoinHandle;

use crate::core::Termination;

/// Termination signal kinds the bridge can intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// `SIGINT` (Ctrl-C in a terminal).
    Interrupt,
    /// `SIGTERM` (default kill signal, used by systemd/Kubernetes).
    Terminate,
    /// `SIGQUIT`.
    Quit,
}

impl SignalKind {
    /// Default set: interrupt and terminate.
    pub const DEFAULT: [SignalKind; 2] = [SignalKind::Interrupt, SignalKind::Terminate];

    /// Conventional signal name.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Interrupt => "SIGINT",
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why arming failed.
#[derive(Debug)]
pub(crate) enum ArmError {
    /// Another bridge is armed in this process.
    Busy,
    /// Installing the handler for `signal` failed.
    Install { signal: SignalKind, source: io::Error },
}

/// Armed bridge. Dropping it disarms.
pub(crate) struct SignalBridge {
    listener: Option<JoinHandle<()>>,
    #[cfg(unix)]
    handlers: Option<unix::Installed>,
}

impl SignalBridge {
    /// Installs handlers for `kinds` and starts the listener on the current runtime.
    #[cfg(unix)]
    pub(crate) fn arm(termination: &Termination, kinds: &[SignalKind]) -> Result<Self, ArmError> {
        let mut kinds = kinds.to_vec();
        dedup_in_order(&mut kinds);

        let (handlers, reader) = unix::Installed::install(&kinds)?;
        let listener = tokio::spawn(unix::listen(reader, termination.clone()));
        tracing::debug!(signals = ?kinds, "signal handlers armed");

        Ok(Self {
            listener: Some(listener),
            handlers: Some(handlers),
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn arm(termination: &Termination, kinds: &[SignalKind]) -> Result<Self, ArmError> {
        let termination = termination.clone();
        let listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(signal = %SignalKind::Interrupt, "termination signal received");
                termination.resolve();
            }
        });
        tracing::debug!(signals = ?kinds, "ctrl-c listener armed");
        Ok(Self {
            listener: Some(listener),
        })
    }

    /// Restores the previous handlers (LIFO) and stops the listener.
    pub(crate) fn disarm(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        #[cfg(unix)]
        if let Some(handlers) = self.handlers.take() {
            drop(handlers);
            tracing::debug!("signal handlers restored");
        }
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for SignalBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBridge")
            .field("armed", &self.listener.is_some())
            .finish()
    }
}

#[cfg_attr(not(unix), allow(dead_code))]
fn dedup_in_order(kinds: &mut Vec<SignalKind>) {
    let mut seen = Vec::with_capacity(kinds.len());
    kinds.retain(|k| {
        if seen.contains(k) {
            false
        } else {
            seen.push(*k);
            true
        }
    });
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream as StdUnixStream;
    use std::sync::atomic::{AtomicI32, Ordering};

    use nix::libc;
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixStream;

    use super::{ArmError, SignalKind};
    use crate::core::Termination;

    /// Write end of the wake-up socket; `-1` when no bridge is armed.
    static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

    impl SignalKind {
        fn to_signal(self) -> Signal {
            match self {
                SignalKind::Interrupt => Signal::SIGINT,
                SignalKind::Terminate => Signal::SIGTERM,
                SignalKind::Quit => Signal::SIGQUIT,
            }
        }

        fn from_raw(signum: u8) -> Option<Self> {
            match Signal::try_from(i32::from(signum)).ok()? {
                Signal::SIGINT => Some(SignalKind::Interrupt),
                Signal::SIGTERM => Some(SignalKind::Terminate),
                Signal::SIGQUIT => Some(SignalKind::Quit),
                _ => None,
            }
        }
    }

    extern "C" fn on_signal(signum: libc::c_int) {
        let fd = WAKE_FD.load(Ordering::Acquire);
        if fd < 0 {
            return;
        }
        // the listener reads one byte per signal; anything wider cannot be relayed
        let Ok(byte) = u8::try_from(signum) else {
            return;
        };
        // SAFETY: write(2) is async-signal-safe; `byte` outlives the call.
        unsafe {
            libc::write(fd, std::ptr::addr_of!(byte).cast(), 1);
        }
    }

    /// Installed handlers plus the wake-up writer.
    ///
    /// Dropping restores previous handlers in reverse installation order, then
    /// unpublishes and closes the writer.
    pub(super) struct Installed {
        restore: Vec<(SignalKind, SigAction)>,
        writer: Option<StdUnixStream>,
    }

    impl Installed {
        pub(super) fn install(kinds: &[SignalKind]) -> Result<(Self, UnixStream), ArmError> {
            let (reader, writer) = StdUnixStream::pair().map_err(|source| ArmError::Install {
                signal: kinds.first().copied().unwrap_or(SignalKind::Interrupt),
                source,
            })?;

            if WAKE_FD
                .compare_exchange(-1, writer.as_raw_fd(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(ArmError::Busy);
            }

            // from here on, every early return unwinds through Drop
            let mut installed = Installed {
                restore: Vec::with_capacity(kinds.len()),
                writer: Some(writer),
            };

            let wire = |kind: SignalKind, source: io::Error| ArmError::Install { signal: kind, source };
            if let Some(w) = &installed.writer {
                w.set_nonblocking(true).map_err(|e| wire(SignalKind::Interrupt, e))?;
            }
            reader
                .set_nonblocking(true)
                .map_err(|e| wire(SignalKind::Interrupt, e))?;
            let reader = UnixStream::from_std(reader).map_err(|e| wire(SignalKind::Interrupt, e))?;

            let action = SigAction::new(
                SigHandler::Handler(on_signal),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );
            for &kind in kinds {
                // SAFETY: `on_signal` only performs async-signal-safe operations.
                let previous = unsafe { sigaction(kind.to_signal(), &action) }
                    .map_err(|errno| wire(kind, io::Error::from(errno)))?;
                installed.restore.push((kind, previous));
            }

            Ok((installed, reader))
        }
    }

    impl Drop for Installed {
        fn drop(&mut self) {
            let mut failed = Vec::new();
            while let Some((kind, previous)) = self.restore.pop() {
                // SAFETY: `previous` was returned by sigaction for this very signal.
                if let Err(errno) = unsafe { sigaction(kind.to_signal(), &previous) } {
                    tracing::error!(signal = %kind, error = %errno, "failed to restore signal handler");
                    failed.push(kind);
                }
            }

            if let Some(writer) = self.writer.take() {
                let _ = WAKE_FD.compare_exchange(
                    writer.as_raw_fd(),
                    -1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                drop(writer);
            }

            if !failed.is_empty() && !std::thread::panicking() {
                panic!("could not restore signal handlers for {failed:?}");
            }
        }
    }

    /// Resolves `termination` for every signal byte read from `reader`.
    pub(super) async fn listen(mut reader: UnixStream, termination: Termination) {
        let mut buf = [0u8; 16];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for &signum in &buf[..n] {
                        match SignalKind::from_raw(signum) {
                            Some(kind) => {
                                tracing::info!(signal = %kind, "termination signal received")
                            }
                            None => tracing::info!(signum, "termination signal received"),
                        }
                    }
                    termination.resolve();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "signal listener stopped");
                    break;
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn every_kind_fits_the_wake_byte() {
            for kind in [SignalKind::Interrupt, SignalKind::Terminate, SignalKind::Quit] {
                let byte = u8::try_from(kind.to_signal() as i32).unwrap();
                assert_eq!(SignalKind::from_raw(byte), Some(kind));
            }
        }
    }
}

/// Serializes tests that arm the bridge; handlers are process-wide.
#[cfg(test)]
pub(crate) fn test_serial() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
