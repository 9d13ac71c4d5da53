mod cli;
mod config;
mod daemon;

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, select, tick};
use log::{error, info};
use svcbridge::signals::{self, Signal};
use svcbridge::{DaemonControl, Launch, ServiceOptions, ServiceSession, init_service};

use crate::config::DaemonConfig;
use crate::daemon::Daemon;

fn main() {
    let args = cli::Args::parse();

    // In service mode the event-log backend is installed instead.
    if !args.run_service {
        env_logger::Builder::from_default_env()
            .format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "[{} {} {}:{}] {}",
                    buf.timestamp_millis(),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .filter_level(args.log_level)
            .init();
    }

    if let Err(e) = real_main(args) {
        error!("{e:#}");
        log::logger().flush();
        std::process::exit(1);
    }
}

fn real_main(args: cli::Args) -> Result<()> {
    let cfg_path = config::resolve_path(args.config.as_deref())?;

    // Only registration needs the display name before startup.
    let display_name = if args.register_service {
        DaemonConfig::load_or_create(&cfg_path)?.display_name
    } else {
        DaemonConfig::default().display_name
    };

    let opts = ServiceOptions {
        name: args.service_name,
        display_name,
        register: args.register_service,
        unregister: args.unregister_service,
        run_service: args.run_service,
        log_level: args.log_level,
    };

    let daemon = Arc::new(Daemon::new(cfg_path));
    let control: Arc<dyn DaemonControl> = daemon.clone();

    match init_service(&opts, control).context("Failed to initialise service mode")? {
        Launch::Exit => Ok(()),
        Launch::Standalone => run_standalone(&daemon),
        Launch::Service(session) => run_service(session, &daemon),
    }
}

fn prepare(daemon: &Daemon) -> Result<DaemonConfig> {
    let cfg = daemon.load()?;
    fs::create_dir_all(&cfg.root)
        .with_context(|| format!("Failed to create {}", cfg.root.display()))?;
    Ok(cfg)
}

fn run_service(session: ServiceSession, daemon: &Daemon) -> Result<()> {
    let cfg = match prepare(daemon) {
        Ok(cfg) => cfg,
        Err(e) => {
            if let Err(report) = session.stopped(Err::<(), _>(&e)) {
                error!("failed to report aborted start: {report}");
            }
            return Err(e);
        }
    };

    let running = session
        .started(&cfg.fault_log_path())
        .context("Failed to start service")?;

    let result = daemon.run();
    running.stopped(result.as_ref().map(|_| ()))?;
    result
}

fn run_standalone(daemon: &Daemon) -> Result<()> {
    prepare(daemon)?;
    signals::install()?;

    let (done_tx, done_rx) = bounded::<()>(0);
    thread::scope(|scope| {
        scope.spawn(|| {
            let sig_tick = tick(Duration::from_millis(200));
            loop {
                select! {
                    recv(done_rx) -> _ => break,
                    recv(sig_tick) -> _ => match signals::take() {
                        Some(Signal::Hangup) => daemon.reload_config(),
                        Some(sig) => {
                            info!("signal {sig:?}, orderly shutdown");
                            daemon.initiate_shutdown();
                        }
                        None => {}
                    },
                }
            }
        });

        let result = daemon.run();
        drop(done_tx);
        result
    })
}
