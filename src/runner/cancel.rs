//! Run cancellation tokens and process interrupts.
//!
//! Steps run in their own process groups, so a terminal Ctrl-C reaches
//! only conveyor. [`install_interrupt_handler`] turns SIGINT and SIGTERM
//! into a flag that the gate polls to cancel every run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Flag set when the process receives SIGINT or SIGTERM.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Route SIGINT and SIGTERM to [`interrupt_flag`].
///
/// The first signal only sets the flag; a second one terminates the
/// process as usual.
pub fn install_interrupt_handler() {
    #[cfg(unix)]
    {
        let handler = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only stores an atomic and resets the
        // disposition, both async-signal-safe.
        unsafe {
            libc::signal(libc::SIGINT, handler);
            libc::signal(libc::SIGTERM, handler);
        }
    }
}

#[cfg(unix)]
extern "C" fn on_interrupt(signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    // SAFETY: signal(2) is async-signal-safe.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
    }
}

/// Shared flag that tells a run to stop.
///
/// Clones observe the same flag. Cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
