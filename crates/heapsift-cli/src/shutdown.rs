use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use heapsift_core::CancelToken;
use tracing::info;

/// What an interrupt should do, given how many came before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop the running scan at the next region boundary
    Cancel,
    /// Leave immediately
    Exit,
}

/// Bridges Ctrl+C to a [`CancelToken`].
///
/// The first interrupt cancels cooperatively; a second one exits.
pub struct ShutdownSignal {
    interrupts: AtomicUsize,
    cancel: CancelToken,
}

impl ShutdownSignal {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            interrupts: AtomicUsize::new(0),
            cancel,
        }
    }

    /// Record an interrupt and cancel the token on the first one.
    pub fn trigger(&self) -> InterruptAction {
        if self.interrupts.fetch_add(1, Ordering::SeqCst) == 0 {
            self.cancel.cancel();
            InterruptAction::Cancel
        } else {
            InterruptAction::Exit
        }
    }
}

/// Install the process-wide Ctrl+C handler for `cancel`.
pub fn install(cancel: CancelToken) -> Result<()> {
    let signal = ShutdownSignal::new(cancel);
    ctrlc::set_handler(move || match signal.trigger() {
        InterruptAction::Cancel => {
            info!("Received shutdown signal, stopping... (press Ctrl+C again to exit)")
        }
        InterruptAction::Exit => {
            eprintln!("\nCancelled.");
            std::process::exit(130);
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let cancel = CancelToken::new();
        let _signal = ShutdownSignal::new(cancel.clone());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_first_trigger_cancels() {
        let cancel = CancelToken::new();
        let signal = ShutdownSignal::new(cancel.clone());

        assert_eq!(signal.trigger(), InterruptAction::Cancel);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_second_trigger_exits() {
        let signal = ShutdownSignal::new(CancelToken::new());
        signal.trigger();
        assert_eq!(signal.trigger(), InterruptAction::Exit);
        assert_eq!(signal.trigger(), InterruptAction::Exit);
    }
}
