//! Windows Service Control Manager host.

use std::ffi::OsString;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use log::{error, warn};
use once_cell::sync::Lazy;
use windows_service::define_windows_service;
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState as NativeState,
    ServiceStatus, ServiceType,
};
use windows_service::service_control_handler::{self, ServiceControlHandlerResult};
use windows_service::service_dispatcher;

use super::ServiceHost;
use crate::coordinator::ServiceHandler;
use crate::error::ServiceError;
use crate::status::{ControlRequest, ServiceState, Status};

const SERVICE_TYPE: ServiceType = ServiceType::OWN_PROCESS;

// The dispatcher calls a plain function; the handler waits here for it.
static PENDING: Lazy<Mutex<Option<(String, ServiceHandler)>>> = Lazy::new(|| Mutex::new(None));

define_windows_service!(ffi_service_main, service_main);

#[derive(Debug, Default)]
pub struct ScmHost;

impl ScmHost {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceHost for ScmHost {
    fn run(self, name: &str, handler: ServiceHandler) -> Result<(), ServiceError> {
        PENDING
            .lock()
            .map_err(|e| ServiceError::Host(format!("dispatcher slot poisoned: {e}")))?
            .replace((name.to_string(), handler));

        // Blocks until the service reports Stopped.
        service_dispatcher::start(name, ffi_service_main).map_err(|e| {
            // Never picked up by `service_main`; drop it so a retry starts clean.
            take_pending();
            ServiceError::Host(format!("Failed to start service dispatcher: {e}"))
        })
    }
}

fn take_pending() -> Option<(String, ServiceHandler)> {
    PENDING
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

fn service_main(_args: Vec<OsString>) {
    let Some((name, handler)) = take_pending() else {
        error!("service dispatcher started without a pending handler");
        return;
    };
    if let Err(e) = run_service(&name, &handler) {
        error!("Service error: {e}");
    }
}

fn forward(tx: &Sender<ControlRequest>, request: ControlRequest) -> ServiceControlHandlerResult {
    match tx.send(request) {
        Ok(()) => ServiceControlHandlerResult::NoError,
        Err(_) => ServiceControlHandlerResult::Other(1),
    }
}

fn run_service(name: &str, handler: &ServiceHandler) -> Result<(), ServiceError> {
    let (request_tx, request_rx) = unbounded();

    let control = move |event: ServiceControl| -> ServiceControlHandlerResult {
        match event {
            ServiceControl::Interrogate => forward(&request_tx, ControlRequest::Interrogate),
            ServiceControl::Stop => forward(&request_tx, ControlRequest::Stop),
            ServiceControl::Shutdown => forward(&request_tx, ControlRequest::Shutdown),
            ServiceControl::Paramchange => forward(&request_tx, ControlRequest::ParamChange),
            other => {
                warn!("Unhandled control: {other:?}");
                ServiceControlHandlerResult::NotImplemented
            }
        }
    };

    let status_handle = service_control_handler::register(name, control)
        .map_err(|e| ServiceError::Host(format!("registering control handler: {e}")))?;

    let (status_tx, status_rx) = unbounded::<Status>();
    std::thread::scope(|s| {
        s.spawn(move || {
            for status in status_rx {
                if let Err(e) = status_handle.set_service_status(native_status(status)) {
                    warn!("failed to report {:?}: {e}", status.state);
                }
            }
        });
        handler.execute(&request_rx, &status_tx);
        drop(status_tx);
    });

    Ok(())
}

fn native_status(status: Status) -> ServiceStatus {
    let current_state = match status.state {
        ServiceState::StartPending => NativeState::StartPending,
        ServiceState::Running => NativeState::Running,
        ServiceState::StopPending => NativeState::StopPending,
        ServiceState::Stopped => NativeState::Stopped,
    };
    let exit_code = if status.exit.service_specific {
        ServiceExitCode::ServiceSpecific(status.exit.code)
    } else {
        ServiceExitCode::Win32(status.exit.code)
    };

    ServiceStatus {
        service_type: SERVICE_TYPE,
        current_state,
        controls_accepted: ServiceControlAccept::from_bits_truncate(status.accepts.bits()),
        exit_code,
        checkpoint: 0,
        wait_hint: Duration::default(),
        process_id: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coordinator::{Coordinator, DaemonControl};

    struct Idle;

    impl DaemonControl for Idle {
        fn initiate_shutdown(&self) {}
        fn reload_config(&self) {}
    }

    #[test]
    fn failed_dispatch_clears_pending_handler() {
        // A test process is not connected to the SCM, so the dispatcher refuses.
        let err = Coordinator::new("svcbridge-test", Arc::new(Idle))
            .begin(ScmHost::new())
            .err();

        assert!(matches!(err, Some(ServiceError::Host(_))));
        assert!(take_pending().is_none());
    }

    #[test]
    fn stopped_failure_maps_to_service_specific_exit() {
        let status = native_status(Status::stopped(crate::status::ServiceExit::FAILURE));
        assert_eq!(status.current_state, NativeState::Stopped);
        assert_eq!(status.exit_code, ServiceExitCode::ServiceSpecific(1));
        assert!(status.controls_accepted.is_empty());
    }
}
