//! Run a long-lived daemon under a host service manager without teaching the
//! daemon the host's control protocol.
//!
//! The daemon builds a [`Coordinator`] around its [`DaemonControl`]
//! capabilities, calls [`ServiceSession::started`] once configuration is
//! known and [`RunningSession::stopped`] when it has shut down. Everything
//! in between (status reports, control requests, crash output capture and
//! event-log routing) happens on the coordinator's side.

pub mod coordinator;
pub mod error;
pub mod eventlog;
pub mod fault;
pub mod host;
pub mod install;
pub mod service;
pub mod signals;
pub mod status;

pub use coordinator::{Coordinator, DaemonControl, RunningSession, ServiceHandler, ServiceSession};
pub use error::ServiceError;
pub use service::{Launch, ServiceOptions, init_service};
pub use status::{ControlAccept, ControlRequest, ServiceExit, ServiceState, Status};
