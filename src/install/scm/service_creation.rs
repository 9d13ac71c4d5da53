//! Service creation and removal.

use windows::Win32::Foundation::ERROR_SERVICE_EXISTS;
use windows::Win32::System::Services::{
    CreateServiceW, DeleteService, OpenServiceW, SERVICE_ALL_ACCESS, SERVICE_AUTO_START,
    SERVICE_ERROR_NORMAL, SERVICE_WIN32_OWN_PROCESS,
};
use windows::core::PCWSTR;

use super::ScHandle;
use crate::error::ServiceError;
use crate::eventlog::encode_wide;

/// Create an own-process, auto-start service running `command_line`.
pub(super) fn create_service(
    sc_manager: &ScHandle,
    name: &str,
    display_name: &str,
    command_line: &str,
) -> Result<ScHandle, ServiceError> {
    let service_name = encode_wide(name)?;
    let display = encode_wide(display_name)?;
    let binary_path = encode_wide(command_line)?;

    let handle = unsafe {
        CreateServiceW(
            sc_manager.0,
            PCWSTR::from_raw(service_name.as_ptr()),
            PCWSTR::from_raw(display.as_ptr()),
            SERVICE_ALL_ACCESS,
            SERVICE_WIN32_OWN_PROCESS,
            SERVICE_AUTO_START,
            SERVICE_ERROR_NORMAL,
            PCWSTR::from_raw(binary_path.as_ptr()),
            PCWSTR::null(),
            None,
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
        )
    }
    .map_err(|e| {
        if e.code() == ERROR_SERVICE_EXISTS.to_hresult() {
            ServiceError::Host(format!("Service '{name}' already exists"))
        } else {
            ServiceError::Host(format!("Failed to create service: {e}"))
        }
    })?;

    Ok(ScHandle(handle))
}

/// Open an existing service by name
pub(super) fn open_service(
    sc_manager: &ScHandle,
    name: &str,
) -> Result<ScHandle, ServiceError> {
    let service_name = encode_wide(name)?;

    let handle = unsafe {
        OpenServiceW(
            sc_manager.0,
            PCWSTR::from_raw(service_name.as_ptr()),
            SERVICE_ALL_ACCESS,
        )
    }
    .map_err(|e| ServiceError::Host(format!("Failed to open service '{name}': {e}")))?;

    Ok(ScHandle(handle))
}

pub(super) fn delete_service(service: &ScHandle) -> Result<(), ServiceError> {
    unsafe { DeleteService(service.0) }
        .map_err(|e| ServiceError::Host(format!("Failed to delete service: {e}")))
}
