//! Fault capture: point the process's low-level error output at a file.
//!
//! Panics and runtime aborts write straight to the stderr handle and bypass
//! the logging facade entirely, so the only way to keep them for a service
//! with no console is to redirect the handle itself. The capture is
//! installed once the daemon knows its data root and released on the normal
//! exit path; a non-empty file means something crashed and is left behind
//! for post-mortem inspection.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::ServiceError;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix_stderr;
        use unix_stderr as platform;
    } else if #[cfg(windows)] {
        mod windows_stderr;
        use windows_stderr as platform;
    }
}

pub use platform::StdError;

/// Suffix given to a previous, non-empty fault log.
const BACKUP_SUFFIX: &str = ".old";

/// A process-level output handle that can be pointed at a file and back.
pub trait FaultOutput: Send {
    /// Save the current handle, then redirect it to `file`.
    fn redirect_to(&mut self, file: &File) -> io::Result<()>;

    /// Put the saved handle back. A no-op if nothing was redirected.
    fn restore(&mut self) -> io::Result<()>;
}

/// Location a non-empty fault log is rotated to.
pub fn fault_log_backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// An installed fault log. Must be installed at most once per process.
pub struct FaultCapture {
    file: File,
    path: PathBuf,
    output: Box<dyn FaultOutput>,
}

impl FaultCapture {
    /// Open (or create) `path`, rotating away leftover content, and redirect
    /// `output` into it.
    pub fn install(
        path: impl Into<PathBuf>,
        mut output: Box<dyn FaultOutput>,
    ) -> Result<Self, ServiceError> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ServiceError::io(format!("opening fault log {}", path.display()), e))?;

        let len = file
            .metadata()
            .map_err(|e| ServiceError::io(format!("inspecting fault log {}", path.display()), e))?
            .len();

        if len > 0 {
            drop(file);
            let backup = fault_log_backup_path(&path);
            fs::rename(&path, &backup).map_err(|e| {
                ServiceError::io(format!("rotating fault log to {}", backup.display()), e)
            })?;
            info!(
                "previous fault log ({len} bytes) moved to {}",
                backup.display()
            );
            file = File::create(&path).map_err(|e| {
                ServiceError::io(format!("recreating fault log {}", path.display()), e)
            })?;
        }

        output
            .redirect_to(&file)
            .map_err(|e| ServiceError::io("redirecting fault output", e))?;
        debug!("fault output redirected to {}", path.display());

        Ok(Self { file, path, output })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Undo the redirection if nothing was written; otherwise keep everything.
    pub fn release(self) {
        let Self {
            file,
            path,
            mut output,
        } = self;

        match file.metadata() {
            Ok(meta) if meta.len() == 0 => {
                if let Err(e) = output.restore() {
                    warn!("failed to restore fault output handle: {e}");
                    // Still the live error handle.
                    mem::forget(file);
                    return;
                }
                drop(file);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("failed to remove fault log {}: {e}", path.display());
                }
            }
            Ok(meta) => {
                warn!(
                    "fault log {} holds {} bytes; leaving it in place",
                    path.display(),
                    meta.len()
                );
                // The redirected handle keeps pointing here for the rest of the process.
                mem::forget(file);
            }
            Err(e) => {
                warn!("failed to inspect fault log {}: {e}", path.display());
                mem::forget(file);
            }
        }
    }
}
