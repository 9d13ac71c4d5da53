//! The hosted daemon: a heartbeat loop whose interval follows the config file.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use log::{error, info};
use svcbridge::DaemonControl;

use crate::config::DaemonConfig;

pub struct Daemon {
    config_path: PathBuf,
    config: Mutex<DaemonConfig>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
    reload_tx: Sender<()>,
    reload_rx: Receiver<()>,
}

impl Daemon {
    /// Starts from the defaults; call [`Daemon::load`] before serving.
    pub fn new(config_path: PathBuf) -> Self {
        // One pending notification of each kind is enough.
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let (reload_tx, reload_rx) = bounded(1);
        Self {
            config_path,
            config: Mutex::new(DaemonConfig::default()),
            shutdown_tx,
            shutdown_rx,
            reload_tx,
            reload_rx,
        }
    }

    pub fn config(&self) -> DaemonConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read (or create) the config file and adopt it.
    pub fn load(&self) -> Result<DaemonConfig> {
        let cfg = DaemonConfig::load_or_create(&self.config_path)?;
        info!("Using config from: {}", self.config_path.display());
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = cfg.clone();
        Ok(cfg)
    }

    fn heartbeat(&self) -> Receiver<std::time::Instant> {
        tick(Duration::from_secs(self.config().heartbeat_secs.max(1)))
    }

    /// Serve until shutdown is requested.
    pub fn run(&self) -> Result<()> {
        let mut heartbeat = self.heartbeat();
        info!("daemon started (pid {})", std::process::id());

        loop {
            select! {
                recv(self.shutdown_rx) -> _ => break,
                recv(self.reload_rx) -> _ => heartbeat = self.heartbeat(),
                recv(heartbeat) -> _ => {
                    info!("heartbeat {}", chrono::Utc::now().to_rfc3339());
                }
            }
        }

        info!("daemon exiting");
        Ok(())
    }
}

impl DaemonControl for Daemon {
    fn initiate_shutdown(&self) {
        info!("orderly shutdown requested");
        // Full means a shutdown is already pending.
        let _ = self.shutdown_tx.try_send(());
    }

    fn reload_config(&self) {
        match DaemonConfig::load(&self.config_path) {
            Ok(cfg) => {
                info!("reloaded configuration from {}", self.config_path.display());
                *self.config.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
                let _ = self.reload_tx.try_send(());
            }
            Err(e) => error!("keeping previous configuration: {e:#}"),
        }
    }
}
