// src/types.rs

use std::fmt;
use std::str::FromStr;

/// Which output stream of a remote command a line or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with bytes left after the last newline when a stream ends.
///
/// - `Drop` (default): only complete lines are delivered; a trailing fragment
///   is discarded silently.
/// - `Flush`: the fragment is delivered as a final line without delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingLinePolicy {
    Drop,
    Flush,
}

impl Default for TrailingLinePolicy {
    fn default() -> Self {
        TrailingLinePolicy::Drop
    }
}

impl FromStr for TrailingLinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(TrailingLinePolicy::Drop),
            "flush" => Ok(TrailingLinePolicy::Flush),
            other => Err(format!(
                "invalid trailing_line: {other} (expected \"drop\" or \"flush\")"
            )),
        }
    }
}

/// Which remote execution backend the binary talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// `docker exec` against a running container.
    Docker,
    /// Host processes; the target is the working directory.
    Local,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Docker
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(BackendKind::Docker),
            "local" => Ok(BackendKind::Local),
            other => Err(format!(
                "invalid backend: {other} (expected \"docker\" or \"local\")"
            )),
        }
    }
}

/// Lifecycle of a single execution.
///
/// `Created -> Registered -> Streaming -> AwaitingCompletion -> Completed`.
/// `Cancelled` is reachable from `Created` (still registering), `Streaming`
/// and `AwaitingCompletion` when a deadline or cancellation request fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Created,
    Registered,
    Streaming,
    AwaitingCompletion,
    Completed { success: bool },
    Cancelled,
}

impl ExecState {
    /// Whether moving from `self` to `next` is a legal single step.
    pub fn can_advance_to(self, next: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, next),
            (Created, Registered)
                | (Created, Cancelled)
                | (Registered, Streaming)
                | (Streaming, AwaitingCompletion)
                | (Streaming, Cancelled)
                | (AwaitingCompletion, Completed { .. })
                | (AwaitingCompletion, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecState::Completed { .. } | ExecState::Cancelled)
    }
}
