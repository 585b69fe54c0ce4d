//! SIGINT/SIGTERM handling for the capture loop.
//!
//! The handler only flips the recorder's stop flag; the loop notices it at the
//! next chunk boundary, flushes, and closes the stream. A second signal while
//! the flag is already set exits immediately, since a stalled device never
//! reaches a chunk boundary.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static STOP_TARGET: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Exit status used when a second interrupt forces the process down.
const FORCED_EXIT_CODE: libc::c_int = 130;

extern "C" fn handle_interrupt(_: libc::c_int) {
    if let Some(flag) = STOP_TARGET.get() {
        if flag.swap(true, Ordering::SeqCst) {
            // SAFETY: _exit is async-signal-safe.
            unsafe { libc::_exit(FORCED_EXIT_CODE) };
        }
    }
}

/// Route SIGINT and SIGTERM to `flag`. Only the first call per process binds a
/// flag; later calls reuse it.
pub fn install_interrupt_handler(flag: Arc<AtomicBool>) -> Result<Arc<AtomicBool>> {
    let bound = STOP_TARGET.get_or_init(|| flag).clone();
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_interrupt only touches an already-initialized
            // OnceLock and an atomic, both async-signal-safe.
            let handler = handle_interrupt as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                debug!(signal, "failed to install signal handler");
                return Err(anyhow!("failed to install handler for signal {signal}"));
            }
        }
    }
    Ok(bound)
}

