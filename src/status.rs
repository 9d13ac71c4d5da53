//! Status values exchanged with the host service manager.

use bitflags::bitflags;

/// Lifecycle states reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

bitflags! {
    /// Control requests the service is willing to receive.
    ///
    /// Bit values match the Windows `SERVICE_ACCEPT_*` constants so they can
    /// be handed to the SCM untouched.
    pub struct ControlAccept: u32 {
        const STOP = 0x0000_0001;
        const SHUTDOWN = 0x0000_0004;
        const PARAM_CHANGE = 0x0000_0008;
    }
}

/// Exit code carried by the final `Stopped` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceExit {
    /// `true` when `code` is service-specific rather than a Win32 error.
    pub service_specific: bool,
    pub code: u32,
}

impl ServiceExit {
    pub const SUCCESS: Self = Self {
        service_specific: false,
        code: 0,
    };

    pub const FAILURE: Self = Self {
        service_specific: true,
        code: 1,
    };

    pub fn from_failed(failed: bool) -> Self {
        if failed { Self::FAILURE } else { Self::SUCCESS }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// A single status report. Never persisted; rebuilt at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub state: ServiceState,
    pub accepts: ControlAccept,
    pub exit: ServiceExit,
}

impl Status {
    pub fn start_pending() -> Self {
        Self {
            state: ServiceState::StartPending,
            accepts: ControlAccept::empty(),
            exit: ServiceExit::SUCCESS,
        }
    }

    pub fn running() -> Self {
        Self {
            state: ServiceState::Running,
            accepts: ControlAccept::STOP | ControlAccept::SHUTDOWN | ControlAccept::PARAM_CHANGE,
            exit: ServiceExit::SUCCESS,
        }
    }

    pub fn stop_pending() -> Self {
        Self {
            state: ServiceState::StopPending,
            accepts: ControlAccept::empty(),
            exit: ServiceExit::SUCCESS,
        }
    }

    pub fn stopped(exit: ServiceExit) -> Self {
        Self {
            state: ServiceState::Stopped,
            accepts: ControlAccept::empty(),
            exit,
        }
    }
}

/// Control requests delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Re-report the current status unchanged.
    Interrogate,
    Stop,
    Shutdown,
    /// Configuration changed; reload it.
    ParamChange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_accepts_stop_shutdown_and_param_change() {
        let accepts = Status::running().accepts;
        assert_eq!(accepts.bits(), 0x1 | 0x4 | 0x8);
        assert!(Status::start_pending().accepts.is_empty());
        assert!(Status::stop_pending().accepts.is_empty());
    }

    #[test]
    fn failure_exit_is_service_specific_one() {
        assert_eq!(ServiceExit::from_failed(true), ServiceExit::FAILURE);
        assert!(ServiceExit::FAILURE.service_specific);
        assert!(!ServiceExit::FAILURE.is_success());
        assert!(ServiceExit::from_failed(false).is_success());
    }
}
