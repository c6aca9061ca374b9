// src/exec/request.rs

use crate::errors::{ExecError, Result};
use crate::exec::pump::LineSink;

/// Which standard streams an execution attaches.
///
/// Always derived from an [`ExecRequest`]: stdin is attached iff a payload is
/// present, stdout/stderr iff a sink was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachFlags {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

/// What gets registered with the remote service: target, argv, attach flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecSpec {
    pub target: String,
    pub command: Vec<String>,
    pub attach: AttachFlags,
}

/// One command to run inside a target workload.
///
/// ```ignore
/// let (tx, rx) = tokio::sync::mpsc::channel(1);
/// let request = ExecRequest::new("web-1", ["cat", "-"])
///     .stdin(b"hello\n".to_vec())
///     .stdout(tx);
/// ```
#[derive(Debug)]
pub struct ExecRequest {
    target: String,
    command: Vec<String>,
    stdin: Option<Vec<u8>>,
    stdout: Option<LineSink>,
    stderr: Option<LineSink>,
}

impl ExecRequest {
    pub fn new<I, S>(target: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target: target.into(),
            command: command.into_iter().map(Into::into).collect(),
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }

    /// Attach stdin and feed it `payload`, followed by end-of-input.
    pub fn stdin(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Attach stdout and deliver its lines to `sink`.
    pub fn stdout(mut self, sink: impl Into<LineSink>) -> Self {
        self.stdout = Some(sink.into());
        self
    }

    /// Attach stderr and deliver its lines to `sink`.
    pub fn stderr(mut self, sink: impl Into<LineSink>) -> Self {
        self.stderr = Some(sink.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn attach(&self) -> AttachFlags {
        AttachFlags {
            stdin: self.stdin.is_some(),
            stdout: self.stdout.is_some(),
            stderr: self.stderr.is_some(),
        }
    }

    /// Local checks only; whether the target exists is up to the service.
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(ExecError::InvalidRequest(
                "target identifier cannot be empty".to_string(),
            ));
        }
        if self.command.is_empty() {
            return Err(ExecError::InvalidRequest(
                "command cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> RequestParts {
        let spec = ExecSpec {
            attach: self.attach(),
            target: self.target,
            command: self.command,
        };
        RequestParts {
            spec,
            stdin: self.stdin,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

pub(crate) struct RequestParts {
    pub spec: ExecSpec,
    pub stdin: Option<Vec<u8>>,
    pub stdout: Option<LineSink>,
    pub stderr: Option<LineSink>,
}
