//! Windows implementation using the Service Control Manager and registry APIs.

use std::path::Path;

use log::{info, warn};
use windows::Win32::System::Services::{
    CloseServiceHandle, OpenSCManagerW, SC_HANDLE, SC_MANAGER_ALL_ACCESS,
};
use windows::core::PCWSTR;

use super::command_line;
use crate::error::ServiceError;

mod registry;
mod service_creation;

use registry::{register_event_source, unregister_event_source};
use service_creation::{create_service, delete_service, open_service};

/// An open SCM or service handle, closed on drop. Both kinds share
/// `CloseServiceHandle`.
struct ScHandle(SC_HANDLE);

impl ScHandle {
    fn connect() -> Result<Self, ServiceError> {
        unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_ALL_ACCESS) }
            .map(Self)
            .map_err(|e| ServiceError::Host(format!("Failed to open Service Control Manager: {e}")))
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseServiceHandle(self.0) } {
            warn!("failed to close service handle: {e}");
        }
    }
}

pub(super) fn register(
    name: &str,
    display_name: &str,
    program: &Path,
    args: &[String],
) -> Result<(), ServiceError> {
    let sc_manager = ScHandle::connect()?;
    let _service = create_service(&sc_manager, name, display_name, &command_line(program, args))?;
    register_event_source(name, program)?;
    info!("service {name} registered");
    Ok(())
}

pub(super) fn unregister(name: &str) -> Result<(), ServiceError> {
    let sc_manager = ScHandle::connect()?;
    let service = open_service(&sc_manager, name)?;

    if let Err(e) = unregister_event_source(name) {
        warn!("failed to remove event source {name}: {e}");
    }
    delete_service(&service)?;
    info!("service {name} removed");
    Ok(())
}
