//! stderr redirection through `SetStdHandle`.

use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;

use windows::Win32::Foundation::{HANDLE, SetLastError, WIN32_ERROR};
use windows::Win32::System::Console::{GetStdHandle, STD_ERROR_HANDLE, SetStdHandle};

use super::FaultOutput;

/// The process's `STD_ERROR_HANDLE`.
#[derive(Debug, Default)]
pub struct StdError {
    saved: Option<HANDLE>,
}

// A HANDLE is a process-wide kernel object reference; it is only touched
// from whichever thread owns the capture.
unsafe impl Send for StdError {}

impl StdError {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The current stderr handle. Processes started by the SCM have none, which
/// `GetStdHandle` reports as NULL without setting a last error; only
/// `INVALID_HANDLE_VALUE` is a real failure.
fn current_stderr() -> io::Result<HANDLE> {
    // NULL leaves the last error untouched, so clear out any stale code.
    unsafe { SetLastError(WIN32_ERROR(0)) };
    match unsafe { GetStdHandle(STD_ERROR_HANDLE) } {
        Ok(handle) => Ok(handle),
        Err(e) if e.code().is_ok() => Ok(HANDLE::default()),
        Err(e) => Err(io::Error::from(e)),
    }
}

impl FaultOutput for StdError {
    fn redirect_to(&mut self, file: &File) -> io::Result<()> {
        let current = current_stderr()?;
        unsafe { SetStdHandle(STD_ERROR_HANDLE, HANDLE(file.as_raw_handle())) }
            .map_err(io::Error::from)?;
        self.saved = Some(current);
        Ok(())
    }

    /// Puts back the saved handle, NULL included.
    fn restore(&mut self) -> io::Result<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        unsafe { SetStdHandle(STD_ERROR_HANDLE, saved) }.map_err(io::Error::from)
    }
}
