//! Windows Event Log source.

use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::EventLog::{
    DeregisterEventSource, EVENTLOG_ERROR_TYPE, EVENTLOG_INFORMATION_TYPE,
    EVENTLOG_WARNING_TYPE, REPORT_EVENT_TYPE, RegisterEventSourceW, ReportEventW,
};
use windows::core::PCWSTR;

use super::{EventCategory, EventSink, encode_wide};
use crate::error::ServiceError;

/// RAII wrapper for an event source handle.
pub struct EventSource(HANDLE);

// Event source handles may be used from any thread.
unsafe impl Send for EventSource {}
unsafe impl Sync for EventSource {}

impl EventSource {
    pub fn open(name: &str) -> Result<Self, ServiceError> {
        let wide = encode_wide(name)?;
        let handle = unsafe { RegisterEventSourceW(PCWSTR::null(), PCWSTR::from_raw(wide.as_ptr())) }
            .map_err(|e| ServiceError::Host(format!("opening event source {name}: {e}")))?;
        Ok(Self(handle))
    }
}

fn event_type(category: EventCategory) -> REPORT_EVENT_TYPE {
    match category {
        EventCategory::Error => EVENTLOG_ERROR_TYPE,
        EventCategory::Warning => EVENTLOG_WARNING_TYPE,
        EventCategory::Information => EVENTLOG_INFORMATION_TYPE,
    }
}

impl EventSink for EventSource {
    fn submit(
        &self,
        category: EventCategory,
        event_id: u32,
        strings: &[Vec<u16>],
    ) -> Result<(), ServiceError> {
        let ptrs: Vec<PCWSTR> = strings
            .iter()
            .map(|s| PCWSTR::from_raw(s.as_ptr()))
            .collect();

        unsafe {
            ReportEventW(
                self.0,
                event_type(category),
                0,
                event_id,
                None,
                0,
                Some(&ptrs),
                None,
            )
        }
        .map_err(|e| ServiceError::Host(format!("reporting event {event_id}: {e}")))
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = DeregisterEventSource(self.0);
            }
        }
    }
}
