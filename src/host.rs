//! Service hosts: whatever drives a [`ServiceHandler`] with control requests
//! and consumes its status reports.
//!
//! - Windows SCM (`ScmHost`) when launched by the service manager
//! - Console (`ConsoleHost`) for interactive runs and non-Windows platforms
//! - Scripted (`ScriptedHost`) for exercising a daemon's lifecycle in tests

use crate::coordinator::ServiceHandler;
use crate::error::ServiceError;

mod console;
mod scripted;

#[cfg(windows)]
mod scm;

pub use console::ConsoleHost;
pub use scripted::{ScriptedHost, StatusLog};

#[cfg(windows)]
pub use scm::ScmHost;

/// A host service framework. `run` blocks for the whole service lifetime
/// and calls [`ServiceHandler::execute`] at most once.
pub trait ServiceHost: Send + 'static {
    fn run(self, name: &str, handler: ServiceHandler) -> Result<(), ServiceError>;
}

/// Whether the process was started from an interactive session rather than
/// by the service manager.
pub fn is_interactive() -> bool {
    #[cfg(windows)]
    {
        use windows::Win32::System::Console::GetConsoleWindow;
        // Services are started without a console.
        !unsafe { GetConsoleWindow() }.0.is_null()
    }

    #[cfg(not(windows))]
    {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}
