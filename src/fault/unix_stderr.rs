//! stderr redirection through file descriptor duplication.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, RawFd};

use super::FaultOutput;

/// What `fd` pointed at before redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Saved {
    Dup(RawFd),
    /// The descriptor was not open (daemons started with fd 2 closed).
    Closed,
}

/// The process's `STDERR_FILENO`.
#[derive(Debug)]
pub struct StdError {
    fd: RawFd,
    saved: Option<Saved>,
}

impl Default for StdError {
    fn default() -> Self {
        Self::for_fd(libc::STDERR_FILENO)
    }
}

impl StdError {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_fd(fd: RawFd) -> Self {
        Self { fd, saved: None }
    }
}

impl FaultOutput for StdError {
    fn redirect_to(&mut self, file: &File) -> io::Result<()> {
        let saved = match unsafe { libc::dup(self.fd) } {
            fd if fd >= 0 => Saved::Dup(fd),
            _ => {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::EBADF) {
                    return Err(err);
                }
                Saved::Closed
            }
        };

        if unsafe { libc::dup2(file.as_raw_fd(), self.fd) } < 0 {
            let err = io::Error::last_os_error();
            if let Saved::Dup(fd) = saved {
                unsafe {
                    libc::close(fd);
                }
            }
            return Err(err);
        }

        self.saved = Some(saved);
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        let rc = match self.saved.take() {
            None => return Ok(()),
            Some(Saved::Closed) => unsafe { libc::close(self.fd) },
            Some(Saved::Dup(saved)) => {
                let rc = unsafe { libc::dup2(saved, self.fd) };
                let result = if rc < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(())
                };
                unsafe {
                    libc::close(saved);
                }
                return result;
            }
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
