use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet};

use super::{Signal, record};
use crate::error::ServiceError;

extern "C" fn handler(sig: i32) {
    let signal = if sig == signal::Signal::SIGHUP as i32 {
        Signal::Hangup
    } else if sig == signal::Signal::SIGTERM as i32 {
        Signal::Terminate
    } else {
        Signal::Interrupt
    };
    record(signal);
}

pub(super) fn install() -> Result<(), ServiceError> {
    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::empty(),
        SigSet::empty(),
    );

    for sig in [
        signal::Signal::SIGINT,
        signal::Signal::SIGTERM,
        signal::Signal::SIGHUP,
    ] {
        unsafe { signal::sigaction(sig, &action) }.map_err(|e| {
            ServiceError::Host(format!("Failed to register {sig} handler: {e}"))
        })?;
    }
    Ok(())
}
