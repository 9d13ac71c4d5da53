//! Error taxonomy for the service lifecycle.

use std::io;

use thiserror::Error;

/// Every failure in this crate is terminal to the operation that raised it.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Mutually exclusive install flags were combined.
    #[error("--register-service and --unregister-service cannot be used together")]
    FlagConflict,

    /// A coordinator is already live in this process.
    #[error("a service coordinator is already active in this process")]
    AlreadyActive,

    /// The host service manager (dispatcher, SCM, event log) rejected a call.
    #[error("service host: {0}")]
    Host(String),

    /// Filesystem or OS handle failure, with what we were doing at the time.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A string could not be encoded as a host-native wide string.
    #[error("string contains an interior NUL and cannot be encoded: {0:?}")]
    Encoding(String),

    /// The operation has no implementation on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// The other side of a lifecycle channel went away.
    #[error("service control context exited unexpectedly")]
    Disconnected,
}

impl ServiceError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
