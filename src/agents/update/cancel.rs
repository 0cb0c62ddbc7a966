use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Exit status for a user interrupt.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

#[derive(Debug, Default)]
struct Flags {
    cancelled: AtomicBool,
    armed: AtomicBool,
}

/// Interrupt state shared with the Ctrl-C handler.
///
/// While a transaction is armed an interrupt only sets the flag, so the
/// transaction can roll back before exiting. Outside a transaction the
/// handler exits immediately with [`INTERRUPT_EXIT_CODE`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flags: Arc<Flags>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_handler(&self) {
        let token = self.clone();
        let installed = ctrlc::set_handler(move || {
            if token.is_armed() {
                token.cancel();
            } else {
                eprintln!("\nInterrupted.");
                std::process::exit(INTERRUPT_EXIT_CODE);
            }
        });

        if let Err(e) = installed {
            warn!(error = %e, "could not install interrupt handler");
        }
    }

    pub fn cancel(&self) {
        self.flags.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::SeqCst)
    }

    /// Defers interrupts until the returned guard is dropped.
    pub(crate) fn arm(&self) -> Armed<'_> {
        self.flags.armed.store(true, Ordering::SeqCst);
        Armed { token: self }
    }

    pub(super) fn is_armed(&self) -> bool {
        self.flags.armed.load(Ordering::SeqCst)
    }
}

/// Keeps the token armed for as long as it lives.
#[must_use]
pub(crate) struct Armed<'a> {
    token: &'a CancelToken,
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.token.flags.armed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let handler_side = token.clone();
        let armed = token.arm();
        assert!(handler_side.is_armed());
        handler_side.cancel();
        assert!(token.is_cancelled());
        drop(armed);
        assert!(!handler_side.is_armed());
    }
}
