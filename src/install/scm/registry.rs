//! Event-source registry entries.

use std::path::Path;

use log::warn;
use windows::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SZ,
    REG_VALUE_TYPE, RegCloseKey, RegCreateKeyExW, RegDeleteKeyW, RegSetValueExW,
};
use windows::core::PCWSTR;

use crate::error::ServiceError;
use crate::eventlog::encode_wide;

/// Error, Warning, Information.
const TYPES_SUPPORTED: u32 = 7;

/// The `EventLog\Application\<name>` key, open for writing.
struct EventSourceKey(HKEY);

impl EventSourceKey {
    fn set(&self, name: &str, kind: REG_VALUE_TYPE, data: &[u8]) -> Result<(), ServiceError> {
        let name_w = encode_wide(name)?;
        unsafe { RegSetValueExW(self.0, PCWSTR::from_raw(name_w.as_ptr()), None, kind, Some(data)) }
            .ok()
            .map_err(|e| ServiceError::Host(format!("Failed to set registry value {name}: {e}")))
    }

    fn set_string(&self, name: &str, value: &str) -> Result<(), ServiceError> {
        let bytes: Vec<u8> = encode_wide(value)?
            .iter()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        self.set(name, REG_SZ, &bytes)
    }

    fn set_dword(&self, name: &str, value: u32) -> Result<(), ServiceError> {
        self.set(name, REG_DWORD, &value.to_le_bytes())
    }
}

impl Drop for EventSourceKey {
    fn drop(&mut self) {
        if let Err(e) = unsafe { RegCloseKey(self.0) }.ok() {
            warn!("failed to close event source key: {e}");
        }
    }
}

fn event_source_key(service_name: &str) -> String {
    format!("SYSTEM\\CurrentControlSet\\Services\\EventLog\\Application\\{service_name}")
}

/// Register Windows Event Log source
pub(super) fn register_event_source(service_name: &str, program: &Path) -> Result<(), ServiceError> {
    let key_path = encode_wide(&event_source_key(service_name))?;
    let mut key_handle = HKEY::default();

    unsafe {
        RegCreateKeyExW(
            HKEY_LOCAL_MACHINE,
            PCWSTR::from_raw(key_path.as_ptr()),
            None,
            PCWSTR::null(),
            REG_OPTION_NON_VOLATILE,
            KEY_WRITE,
            None,
            &mut key_handle,
            None,
        )
    }
    .ok()
    .map_err(|e| ServiceError::Host(format!("Failed to create event log registry key: {e}")))?;

    let key = EventSourceKey(key_handle);
    key.set_string("EventMessageFile", &program.to_string_lossy())?;
    key.set_dword("TypesSupported", TYPES_SUPPORTED)
}

/// Unregister event source
pub(super) fn unregister_event_source(service_name: &str) -> Result<(), ServiceError> {
    let key_path = encode_wide(&event_source_key(service_name))?;
    unsafe { RegDeleteKeyW(HKEY_LOCAL_MACHINE, PCWSTR::from_raw(key_path.as_ptr())) }
        .ok()
        .map_err(|e| ServiceError::Host(format!("Failed to delete event log registry key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_source_lives_under_application_log() {
        assert_eq!(
            event_source_key("svcbridge"),
            "SYSTEM\\CurrentControlSet\\Services\\EventLog\\Application\\svcbridge"
        );
    }
}
