//! Console host for interactive runs: process signals stand in for the
//! service manager's control requests, and statuses go to the log.

use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, unbounded};
use log::{debug, info};

use super::ServiceHost;
use crate::coordinator::ServiceHandler;
use crate::error::ServiceError;
use crate::signals::{self, Signal};
use crate::status::{ControlRequest, Status};

/// Signal polling interval.
const SIGNAL_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Default)]
pub struct ConsoleHost;

impl ConsoleHost {
    pub fn new() -> Self {
        Self
    }
}

fn request_for(signal: Signal) -> ControlRequest {
    match signal {
        Signal::Interrupt | Signal::Terminate => ControlRequest::Stop,
        Signal::Hangup => ControlRequest::ParamChange,
    }
}

impl ServiceHost for ConsoleHost {
    fn run(self, name: &str, handler: ServiceHandler) -> Result<(), ServiceError> {
        signals::install()?;
        info!("running {name} in console mode; press Ctrl+C to stop");

        let (request_tx, request_rx) = unbounded();
        let (status_tx, status_rx) = unbounded::<Status>();
        let (done_tx, done_rx) = bounded::<()>(0);

        let exit = std::thread::scope(|s| {
            s.spawn(move || {
                let ticker = tick(SIGNAL_POLL);
                loop {
                    select! {
                        recv(done_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Some(signal) = signals::take() {
                                debug!("signal {signal:?} received");
                                if request_tx.send(request_for(signal)).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            });

            s.spawn(move || {
                for status in status_rx {
                    info!("{name}: {:?}", status.state);
                }
            });

            let exit = handler.execute(&request_rx, &status_tx);
            drop(status_tx);
            drop(done_tx);
            exit
        });

        info!("{name} exited with code {}", exit.code);
        Ok(())
    }
}
