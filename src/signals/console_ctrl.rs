use windows::Win32::System::Console::{
    CTRL_BREAK_EVENT, CTRL_C_EVENT, CTRL_CLOSE_EVENT, CTRL_SHUTDOWN_EVENT, SetConsoleCtrlHandler,
};
use windows::core::BOOL;

use super::{Signal, record};
use crate::error::ServiceError;

unsafe extern "system" fn handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT => record(Signal::Interrupt),
        CTRL_CLOSE_EVENT | CTRL_SHUTDOWN_EVENT => record(Signal::Terminate),
        _ => return false.into(),
    }
    true.into()
}

pub(super) fn install() -> Result<(), ServiceError> {
    unsafe { SetConsoleCtrlHandler(Some(handler), true) }
        .map_err(|e| ServiceError::Host(format!("Failed to register console control handler: {e}")))
}
