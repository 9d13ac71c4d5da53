//! Process signal bridge.
//!
//! Handlers only record the latest signal in an atomic; callers poll it with
//! [`take`], which keeps the handlers async-signal-safe.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ServiceError;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix_signals;
        use unix_signals as platform;
    } else if #[cfg(windows)] {
        mod console_ctrl;
        use console_ctrl as platform;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ctrl+C / SIGINT.
    Interrupt,
    /// SIGTERM, console close or system shutdown.
    Terminate,
    /// SIGHUP: reload configuration.
    Hangup,
}

impl Signal {
    const fn code(self) -> usize {
        match self {
            Self::Interrupt => 1,
            Self::Terminate => 2,
            Self::Hangup => 3,
        }
    }

    const fn from_code(code: usize) -> Option<Self> {
        match code {
            1 => Some(Self::Interrupt),
            2 => Some(Self::Terminate),
            3 => Some(Self::Hangup),
            _ => None,
        }
    }
}

static RECEIVED_SIGNAL: AtomicUsize = AtomicUsize::new(0);

fn record(signal: Signal) {
    RECEIVED_SIGNAL.store(signal.code(), Ordering::SeqCst);
}

/// Register the process-wide handlers. Safe to call more than once.
pub fn install() -> Result<(), ServiceError> {
    platform::install()
}

/// Non-blocking check; returns each received signal once.
pub fn take() -> Option<Signal> {
    Signal::from_code(RECEIVED_SIGNAL.swap(0, Ordering::AcqRel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_signal_is_taken_once() {
        record(Signal::Hangup);
        assert_eq!(take(), Some(Signal::Hangup));
        assert_eq!(take(), None);
    }
}
