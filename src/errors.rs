// src/errors.rs

//! Crate-wide error types.
//!
//! [`ExecError`] is what callers of the coordinator see. Every variant carries
//! a [`Severity`]: fatal errors are returned as the `Err` of an execution,
//! degraded ones are collected in the `ExecReport` of an otherwise successful
//! run.
//!
//! [`ServiceError`] is what a `RemoteExecService` backend reports; the
//! coordinator wraps it in `ExecError::Register` or `ExecError::Start`
//! depending on which call failed.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::StreamKind;

/// How much an error affects the execution it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The execution did not complete (or never started).
    Fatal,
    /// Some output or input was lost, but the execution itself completed.
    Degraded,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid exec request: {0}")]
    InvalidRequest(String),

    #[error("failed to register exec against '{target}': {source}")]
    Register {
        target: String,
        #[source]
        source: ServiceError,
    },

    #[error("exec '{exec_id}' failed: {source}")]
    Start {
        exec_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("exec cancelled")]
    Cancelled,

    #[error("exec timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{stream} stream read failed: {source}")]
    StreamRead {
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    #[error("writing stdin failed: {source}")]
    InputWrite {
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecError {
    pub fn severity(&self) -> Severity {
        match self {
            ExecError::StreamRead { .. } | ExecError::InputWrite { .. } => Severity::Degraded,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Errors reported by a remote execution backend.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("target '{0}' does not exist")]
    UnknownTarget(String),

    #[error("target '{0}' is not running")]
    NotRunning(String),

    #[error("unknown exec handle '{0}'")]
    UnknownHandle(String),

    #[error("failed to spawn exec process: {0}")]
    Spawn(#[source] io::Error),

    #[error("remote error: {0}")]
    Remote(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_and_input_errors_are_degraded() {
        let read = ExecError::StreamRead {
            stream: StreamKind::Stderr,
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        };
        let write = ExecError::InputWrite {
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };

        assert_eq!(read.severity(), Severity::Degraded);
        assert_eq!(write.severity(), Severity::Degraded);
        assert!(read.to_string().contains("stderr"));
    }

    #[test]
    fn setup_and_completion_errors_are_fatal() {
        let register = ExecError::Register {
            target: "ghost".to_string(),
            source: ServiceError::UnknownTarget("ghost".to_string()),
        };
        assert!(register.is_fatal());
        assert!(register.to_string().contains("ghost"));

        assert!(ExecError::Cancelled.is_fatal());
        assert!(ExecError::TimedOut(Duration::from_secs(1)).is_fatal());
    }
}
