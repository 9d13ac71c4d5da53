//! Process entry decisions: install, uninstall, run standalone or run as a
//! hosted service.

use std::sync::Arc;

use log::{LevelFilter, debug};

use crate::coordinator::{Coordinator, DaemonControl, ServiceSession};
use crate::error::ServiceError;
use crate::eventlog::{EventLogger, EventReporter, install_panic_reporter, open_event_source};
use crate::host::{ConsoleHost, is_interactive};
use crate::install;

/// Flags relevant to service mode, usually straight from the command line.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub name: String,
    pub display_name: String,
    pub register: bool,
    pub unregister: bool,
    pub run_service: bool,
    pub log_level: LevelFilter,
}

/// What the process should do after [`init_service`].
pub enum Launch {
    /// Registration work is done; exit successfully.
    Exit,
    /// Run the daemon without a service host.
    Standalone,
    /// Run the daemon under a host; report through the session.
    Service(ServiceSession),
}

pub fn init_service(
    opts: &ServiceOptions,
    daemon: Arc<dyn DaemonControl>,
) -> Result<Launch, ServiceError> {
    if opts.register && opts.unregister {
        return Err(ServiceError::FlagConflict);
    }
    if opts.unregister {
        install::unregister(&opts.name)?;
        return Ok(Launch::Exit);
    }
    if opts.register {
        install::register(&opts.name, &opts.display_name)?;
        return Ok(Launch::Exit);
    }
    if !opts.run_service {
        return Ok(Launch::Standalone);
    }

    let interactive = is_interactive();
    let sink = if interactive {
        None
    } else {
        open_event_source(&opts.name)?
    };
    let reporter = Arc::new(EventReporter::new(sink));
    EventLogger::install(Arc::clone(&reporter), opts.log_level)?;
    install_panic_reporter(reporter);
    debug!("starting service {} (interactive: {interactive})", opts.name);

    let coordinator = Coordinator::new(opts.name.clone(), daemon);

    #[cfg(windows)]
    if !interactive {
        let session = coordinator.begin(crate::host::ScmHost::new())?;
        return Ok(Launch::Service(session));
    }

    coordinator.begin(ConsoleHost::new()).map(Launch::Service)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl DaemonControl for Idle {
        fn initiate_shutdown(&self) {}
        fn reload_config(&self) {}
    }

    fn options() -> ServiceOptions {
        ServiceOptions {
            name: "svcbridge-test".to_string(),
            display_name: "svcbridge test".to_string(),
            register: false,
            unregister: false,
            run_service: false,
            log_level: LevelFilter::Info,
        }
    }

    #[test]
    fn register_and_unregister_together_conflict() {
        let opts = ServiceOptions {
            register: true,
            unregister: true,
            ..options()
        };
        let err = init_service(&opts, Arc::new(Idle)).err();
        assert!(matches!(err, Some(ServiceError::FlagConflict)));
    }

    #[test]
    fn no_flags_runs_standalone() {
        let launch = init_service(&options(), Arc::new(Idle));
        assert!(matches!(launch, Ok(Launch::Standalone)));
    }

    #[cfg(not(windows))]
    #[test]
    fn registration_is_unsupported_off_windows() {
        let opts = ServiceOptions {
            unregister: true,
            ..options()
        };
        let err = init_service(&opts, Arc::new(Idle)).err();
        assert!(matches!(err, Some(ServiceError::Unsupported(_))));
    }
}
