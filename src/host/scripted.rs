//! A host that replays a fixed list of control requests.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::unbounded;
use log::info;

use super::ServiceHost;
use crate::coordinator::ServiceHandler;
use crate::error::ServiceError;
use crate::status::{ControlRequest, ServiceExit, ServiceState, Status};

/// Statuses reported to a [`ScriptedHost`], shared with the test that owns it.
#[derive(Debug, Clone, Default)]
pub struct StatusLog(Arc<Mutex<Vec<Status>>>);

impl StatusLog {
    pub fn snapshot(&self) -> Vec<Status> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn states(&self) -> Vec<ServiceState> {
        self.snapshot().iter().map(|s| s.state).collect()
    }

    /// Exit code of the final `Stopped` status, if one was reported.
    pub fn exit(&self) -> Option<ServiceExit> {
        self.snapshot()
            .iter()
            .rev()
            .find(|s| s.state == ServiceState::Stopped)
            .map(|s| s.exit)
    }

    fn push(&self, status: Status) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status);
    }
}

/// Queues every request up front, before the run-loop starts. Requests
/// therefore model ones the host received while the service was still
/// starting.
pub struct ScriptedHost {
    requests: Vec<ControlRequest>,
    log: StatusLog,
}

impl ScriptedHost {
    pub fn new(requests: impl IntoIterator<Item = ControlRequest>) -> Self {
        Self {
            requests: requests.into_iter().collect(),
            log: StatusLog::default(),
        }
    }

    pub fn statuses(&self) -> StatusLog {
        self.log.clone()
    }
}

impl ServiceHost for ScriptedHost {
    fn run(self, name: &str, handler: ServiceHandler) -> Result<(), ServiceError> {
        let (request_tx, request_rx) = unbounded();
        for request in self.requests {
            request_tx
                .send(request)
                .map_err(|_| ServiceError::Disconnected)?;
        }

        let (status_tx, status_rx) = unbounded();
        let exit = std::thread::scope(|s| {
            let log = self.log.clone();
            s.spawn(move || {
                for status in status_rx {
                    log.push(status);
                }
            });
            let exit = handler.execute(&request_rx, &status_tx);
            drop(status_tx);
            exit
        });

        info!("{name} exited with {exit:?}");
        Ok(())
    }
}
