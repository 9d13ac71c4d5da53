//! Lifecycle coordinator: the handshake between the host's control callback
//! and the daemon's own startup and shutdown.
//!
//! Two rendezvous channels (capacity zero) connect the contexts, so every
//! hand-off blocks until the other side takes it:
//!
//! ```text
//!  initiating context                    control-callback context
//!  ──────────────────                    ────────────────────────
//!  Coordinator::begin ──spawn host──►    StartPending
//!        ◄──────────── from-service ──── Ok(())            (handshake)
//!  ServiceSession::started
//!        ──────────── to-service ──────► Ready(capture)    Running
//!                                        … control requests …
//!  RunningSession::stopped
//!        ──────────── to-service ──────► Stopped{failed}   Stopped
//!        ◄──────────── from-service ──── host run result
//! ```
//!
//! The daemon side is a small type-state: `started` consumes the
//! [`ServiceSession`] and yields a [`RunningSession`], so neither call can
//! happen twice and `stopped` cannot follow a failed `started`.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, SendError, Sender, bounded, never, select};
use log::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::fault::{FaultCapture, FaultOutput, StdError};
use crate::host::ServiceHost;
use crate::status::{ControlRequest, ServiceExit, Status};

/// Capabilities the daemon hands to the coordinator at construction time.
pub trait DaemonControl: Send + Sync + 'static {
    /// Ask the daemon to begin an orderly shutdown. Must not block; the
    /// daemon reports completion through [`RunningSession::stopped`].
    fn initiate_shutdown(&self);

    /// Reload configuration. Runs synchronously on the control context.
    fn reload_config(&self);
}

/// Daemon → control context.
enum ToService {
    /// Startup finished; ownership of the fault capture moves across.
    Ready(FaultCapture),
    Stopped { failed: bool },
}

/// Control context → daemon: the handshake, then the host's run result.
type FromService = Result<(), ServiceError>;

static LIVE: AtomicBool = AtomicBool::new(false);

/// Holds the process-wide coordinator slot until dropped.
struct InstanceGuard;

impl InstanceGuard {
    fn claim() -> Result<Self, ServiceError> {
        LIVE.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| ServiceError::AlreadyActive)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        LIVE.store(false, Ordering::Release);
    }
}

/// Builder for the one service instance this process may host.
pub struct Coordinator {
    name: String,
    daemon: Arc<dyn DaemonControl>,
    fault_output: Box<dyn FaultOutput>,
}

impl Coordinator {
    pub fn new(name: impl Into<String>, daemon: Arc<dyn DaemonControl>) -> Self {
        Self {
            name: name.into(),
            daemon,
            fault_output: Box::new(StdError::new()),
        }
    }

    /// Replace the handle fault capture redirects (process stderr by default).
    pub fn fault_output(mut self, output: Box<dyn FaultOutput>) -> Self {
        self.fault_output = output;
        self
    }

    /// Start `host` on its own thread and wait for its run-loop to begin.
    ///
    /// Fails with [`ServiceError::AlreadyActive`] while another session is
    /// live, or with the host's error if it gives up before the handshake.
    pub fn begin<H: ServiceHost>(self, host: H) -> Result<ServiceSession, ServiceError> {
        let guard = InstanceGuard::claim()?;

        let (to_service_tx, to_service_rx) = bounded::<ToService>(0);
        let (from_service_tx, from_service_rx) = bounded::<FromService>(0);

        let handler = ServiceHandler {
            to_service: to_service_rx,
            from_service: from_service_tx.clone(),
            daemon: self.daemon,
        };

        let host_name = self.name.clone();
        thread::Builder::new()
            .name("service-control".to_string())
            .spawn(move || {
                let result = host.run(&host_name, handler);
                if let Err(e) = &result {
                    error!("service host for {host_name} failed: {e}");
                }
                // Received by `begin` if the host never started, else by `stopped`.
                let _ = from_service_tx.send(result);
            })
            .map_err(|e| ServiceError::io("spawning service control thread", e))?;

        // Wait for the first signal from the control context.
        from_service_rx
            .recv()
            .map_err(|_| ServiceError::Disconnected)??;
        debug!("service {} entered start-pending", self.name);

        Ok(ServiceSession {
            name: self.name,
            to_service: to_service_tx,
            from_service: from_service_rx,
            fault_output: self.fault_output,
            _guard: guard,
        })
    }
}

/// Daemon-side handle between the handshake and the end of startup.
pub struct ServiceSession {
    name: String,
    to_service: Sender<ToService>,
    from_service: Receiver<FromService>,
    fault_output: Box<dyn FaultOutput>,
    _guard: InstanceGuard,
}

impl ServiceSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Daemon configuration is available: install fault capture at
    /// `fault_log` and let the host see the service as running.
    ///
    /// On error the host has already been told startup failed; abort the
    /// daemon without serving.
    pub fn started(self, fault_log: &Path) -> Result<RunningSession, ServiceError> {
        let Self {
            name,
            to_service,
            from_service,
            fault_output,
            _guard: guard,
        } = self;

        let capture = match FaultCapture::install(fault_log, fault_output) {
            Ok(capture) => capture,
            Err(e) => {
                error!("aborting start of {name}: {e}");
                if let Err(report) = finish(&to_service, &from_service, true) {
                    warn!("failed to report aborted start of {name}: {report}");
                }
                return Err(e);
            }
        };

        if let Err(SendError(ToService::Ready(capture))) =
            to_service.send(ToService::Ready(capture))
        {
            capture.release();
            return Err(ServiceError::Disconnected);
        }
        info!("service {name} started");

        Ok(RunningSession {
            name,
            to_service,
            from_service,
            _guard: guard,
        })
    }

    /// The daemon gave up before its configuration was available.
    pub fn stopped<E: Display>(self, result: Result<(), E>) -> Result<(), ServiceError> {
        if let Err(e) = &result {
            debug!("Stopping service {} before start: {e}", self.name);
        }
        finish(&self.to_service, &self.from_service, result.is_err())
    }
}

/// Daemon-side handle while the service is serving.
pub struct RunningSession {
    name: String,
    to_service: Sender<ToService>,
    from_service: Receiver<FromService>,
    _guard: InstanceGuard,
}

impl RunningSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The daemon finished shutting down. Blocks until the host has seen the
    /// final status, and returns the host's own run result.
    pub fn stopped<E: Display>(self, result: Result<(), E>) -> Result<(), ServiceError> {
        match &result {
            Ok(()) => debug!("Stopping service {}", self.name),
            Err(e) => debug!("Stopping service {}: {e}", self.name),
        }
        finish(&self.to_service, &self.from_service, result.is_err())
    }
}

fn finish(
    to_service: &Sender<ToService>,
    from_service: &Receiver<FromService>,
    failed: bool,
) -> Result<(), ServiceError> {
    to_service
        .send(ToService::Stopped { failed })
        .map_err(|_| ServiceError::Disconnected)?;
    from_service.recv().map_err(|_| ServiceError::Disconnected)?
}

/// Control-callback side, handed to a [`ServiceHost`].
pub struct ServiceHandler {
    to_service: Receiver<ToService>,
    from_service: Sender<FromService>,
    daemon: Arc<dyn DaemonControl>,
}

impl ServiceHandler {
    /// The run-loop. `requests` come from the host; every status is sent on
    /// `status`, ending with `Stopped`. Returns the exit reported there.
    pub fn execute(&self, requests: &Receiver<ControlRequest>, status: &Sender<Status>) -> ServiceExit {
        report(status, Status::start_pending());

        // Unblock `Coordinator::begin`.
        if self.from_service.send(Ok(())).is_err() {
            warn!("initiating context is gone; abandoning start");
            return stop(status, true);
        }

        // Requests queued by the host stay queued until Running.
        let capture = match self.to_service.recv() {
            Ok(ToService::Ready(capture)) => capture,
            Ok(ToService::Stopped { failed }) => {
                debug!("Aborting service start due to failure during initialization");
                return stop(status, failed);
            }
            Err(_) => {
                debug!("Aborting service start: daemon dropped its session");
                return stop(status, true);
            }
        };

        let mut current = Status::running();
        report(status, current);
        debug!("Service running");

        let closed = never::<ControlRequest>();
        let mut requests_open = true;
        let failed = loop {
            let source = if requests_open { requests } else { &closed };
            select! {
                recv(self.to_service) -> msg => match msg {
                    Ok(ToService::Stopped { failed }) => break failed,
                    Ok(ToService::Ready(_)) => warn!("ignoring repeated start notification"),
                    Err(_) => break true,
                },
                recv(source) -> request => match request {
                    Ok(ControlRequest::ParamChange) => {
                        debug!("reloading configuration");
                        self.daemon.reload_config();
                    }
                    Ok(ControlRequest::Interrogate) => report(status, current),
                    Ok(ControlRequest::Stop | ControlRequest::Shutdown) => {
                        current = Status::stop_pending();
                        report(status, current);
                        self.daemon.initiate_shutdown();
                    }
                    Err(_) => {
                        debug!("control request channel closed");
                        requests_open = false;
                    }
                },
            }
        };

        capture.release();
        stop(status, failed)
    }
}

fn report(status: &Sender<Status>, value: Status) {
    if status.send(value).is_err() {
        warn!("status channel closed; dropped {:?}", value.state);
    }
}

fn stop(status: &Sender<Status>, failed: bool) -> ServiceExit {
    let exit = ServiceExit::from_failed(failed);
    report(status, Status::stopped(exit));
    exit
}
