//! Service and event-source registration with the host.
//!
//! The registered command line re-runs the current executable with
//! `--run-service` plus whatever arguments the installing invocation got,
//! minus the install flags themselves.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::ServiceError;

#[cfg(windows)]
mod scm;

pub const RUN_SERVICE_FLAG: &str = "--run-service";
pub const REGISTER_FLAG: &str = "--register-service";
pub const UNREGISTER_FLAG: &str = "--unregister-service";

/// Arguments the service manager should launch the daemon with.
pub fn service_arguments<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut forwarded = vec![RUN_SERVICE_FLAG.to_string()];
    forwarded.extend(
        args.into_iter()
            .map(Into::into)
            .filter(|a| a != REGISTER_FLAG && a != UNREGISTER_FLAG && a != RUN_SERVICE_FLAG),
    );
    forwarded
}

/// [`service_arguments`] over raw OS arguments; invalid Unicode is replaced
/// rather than rejected.
pub fn os_service_arguments(args: impl IntoIterator<Item = OsString>) -> Vec<String> {
    service_arguments(args.into_iter().map(|a| a.to_string_lossy().into_owned()))
}

/// Quote `program` and any argument containing whitespace into one command line.
pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut line = format!("\"{}\"", program.display());
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Absolute path of the running executable.
pub fn service_path() -> Result<PathBuf, ServiceError> {
    let exe = std::env::current_exe()
        .map_err(|e| ServiceError::io("locating current executable", e))?;
    exe.canonicalize()
        .map_err(|e| ServiceError::io(format!("resolving {}", exe.display()), e))
}

/// Create the service entry and its event source.
pub fn register(name: &str, display_name: &str) -> Result<(), ServiceError> {
    let program = service_path()?;
    let args = os_service_arguments(std::env::args_os().skip(1));
    log::info!("registering service {name}: {}", command_line(&program, &args));

    #[cfg(windows)]
    return scm::register(name, display_name, &program, &args);

    #[cfg(not(windows))]
    {
        let _ = display_name;
        Err(ServiceError::Unsupported("service registration"))
    }
}

/// Delete the service entry and its event source.
pub fn unregister(name: &str) -> Result<(), ServiceError> {
    log::info!("unregistering service {name}");

    #[cfg(windows)]
    return scm::unregister(name);

    #[cfg(not(windows))]
    Err(ServiceError::Unsupported("service removal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_flags_are_replaced_by_run_service() {
        let args = service_arguments([
            "--register-service",
            "--service-name",
            "edge",
            "-c",
            "/etc/edge.toml",
        ]);
        assert_eq!(
            args,
            vec!["--run-service", "--service-name", "edge", "-c", "/etc/edge.toml"]
        );
    }

    #[test]
    fn run_service_is_not_duplicated() {
        let args = service_arguments(["--run-service", "--unregister-service"]);
        assert_eq!(args, vec!["--run-service"]);
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_arguments_are_forwarded_lossily() {
        use std::os::unix::ffi::OsStringExt;

        let args = os_service_arguments([
            OsString::from("--register-service"),
            OsString::from("-c"),
            OsString::from_vec(b"/srv/conf\xff.toml".to_vec()),
        ]);
        assert_eq!(args, vec!["--run-service", "-c", "/srv/conf\u{FFFD}.toml"]);
    }

    #[test]
    fn command_line_quotes_program_and_spaced_arguments() {
        let line = command_line(
            Path::new("/opt/edge/bin/edge"),
            &["--run-service".to_string(), "-c".to_string(), "/opt/my config.toml".to_string()],
        );
        assert_eq!(
            line,
            "\"/opt/edge/bin/edge\" --run-service -c \"/opt/my config.toml\""
        );
    }
}
