// src/exec/coordinator.rs

//! Exec coordinator: runs one remote command end to end.
//!
//! For every call to [`ExecCoordinator::execute`]:
//!
//! 1. the request is registered with the service (attach flags derived from
//!    which arguments were supplied);
//! 2. fresh pipes are allocated (stdin only when there is a payload);
//! 3. the service's `start` call is spawned on its own task, which fires a
//!    oneshot completion signal when it returns;
//! 4. the stream pump is attached to the stdout/stderr read ends;
//! 5. the stdin payload is written and the pipe closed;
//! 6. the caller waits for the completion signal, then gives the pumps a
//!    short grace period to drain.
//!
//! A deadline or a cancellation request covers the whole call. During
//! registration it just abandons the register future; later it also aborts
//! the start task and the pumps. Either way the call returns `Cancelled` /
//! `TimedOut` instead of a completion.

use std::future::{Future, pending};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::{ExecError, Result, ServiceError};
use crate::exec::pipe::{PipeWriter, pipe};
use crate::exec::pump::{PumpReport, StreamPump};
use crate::exec::request::ExecRequest;
use crate::exec::service::{ExecExit, ExecIo, RemoteExecService};
use crate::types::{ExecState, TrailingLinePolicy};

/// Knobs applied to every execution of a coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Upper bound for a whole execution; `None` waits forever.
    pub timeout: Option<Duration>,
    pub trailing_line: TrailingLinePolicy,
    /// How long pumps may keep draining after the remote process finished.
    pub drain_grace: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            trailing_line: TrailingLinePolicy::default(),
            drain_grace: Duration::from_millis(250),
        }
    }
}

/// Result of a completed execution.
#[derive(Debug)]
pub struct ExecReport {
    pub exec_id: String,
    /// Exit code of the remote command, when the backend knows it.
    pub exit_code: Option<i64>,
    pub stdout: PumpReport,
    pub stderr: PumpReport,
    /// Non-fatal problems: stream read failures, stdin write failures.
    pub degraded: Vec<ExecError>,
}

impl ExecReport {
    /// Completed with exit code 0 (or unknown) and nothing degraded.
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty() && self.exit_code.unwrap_or(0) == 0
    }
}

pub struct ExecCoordinator {
    service: Arc<dyn RemoteExecService>,
    options: ExecOptions,
}

impl ExecCoordinator {
    pub fn new(service: Arc<dyn RemoteExecService>) -> Self {
        Self {
            service,
            options: ExecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    /// Run `request` and wait until the remote side reports completion.
    pub async fn execute(&self, request: ExecRequest) -> Result<ExecReport> {
        self.run(request, pending()).await
    }

    /// Like [`execute`](Self::execute), but gives up as soon as `cancel`
    /// fires. A dropped sender is not a cancellation request.
    pub async fn execute_with_cancel(
        &self,
        request: ExecRequest,
        cancel: oneshot::Receiver<()>,
    ) -> Result<ExecReport> {
        let cancelled = async move {
            if cancel.await.is_err() {
                pending::<()>().await;
            }
        };
        self.run(request, cancelled).await
    }

    async fn run(
        &self,
        request: ExecRequest,
        cancelled: impl Future<Output = ()>,
    ) -> Result<ExecReport> {
        request.validate()?;
        let parts = request.into_parts();
        let spec = parts.spec;
        let mut lifecycle = Lifecycle::new(&spec.target);

        info!(
            workload = %spec.target,
            cmd = ?spec.command,
            attach = ?spec.attach,
            "registering exec"
        );

        let timeout = self.options.timeout;
        let interrupted = async move {
            tokio::select! {
                _ = cancelled => ExecError::Cancelled,
                elapsed = deadline(timeout) => ExecError::TimedOut(elapsed),
            }
        };
        tokio::pin!(interrupted);

        let registered = tokio::select! {
            registered = self.service.register(spec.clone()) => registered,
            err = &mut interrupted => {
                warn!(workload = %spec.target, error = %err, "exec interrupted during registration");
                lifecycle.advance(ExecState::Cancelled);
                return Err(err);
            }
        };
        let handle = registered.map_err(|source| {
            warn!(workload = %spec.target, error = %source, "exec registration failed");
            ExecError::Register {
                target: spec.target.clone(),
                source,
            }
        })?;
        let exec_id = handle.id().to_string();
        lifecycle.registered(&exec_id);

        let (stdout_rd, stdout_wr) = pipe();
        let (stderr_rd, stderr_wr) = pipe();
        let (stdin_rd, stdin) = match parts.stdin {
            Some(payload) => {
                let (rd, wr) = pipe();
                (Some(rd), Some((wr, payload)))
            }
            None => (None, None),
        };
        let io = ExecIo {
            stdin: stdin_rd,
            stdout: stdout_wr,
            stderr: stderr_wr,
        };

        let (done_tx, done_rx) = oneshot::channel::<std::result::Result<ExecExit, ServiceError>>();
        let service = Arc::clone(&self.service);
        let start_task = tokio::spawn(async move {
            let result = service.start(handle, io).await;
            let _ = done_tx.send(result);
        });

        let pump = StreamPump::start(
            stdout_rd,
            stderr_rd,
            parts.stdout,
            parts.stderr,
            self.options.trailing_line,
        );
        lifecycle.advance(ExecState::Streaming);

        let mut degraded = Vec::new();

        if let Some((writer, payload)) = stdin {
            tokio::select! {
                written = write_input(writer, &payload) => {
                    match written {
                        Ok(()) => debug!(exec_id = %exec_id, bytes = payload.len(), "stdin written and closed"),
                        Err(source) => {
                            warn!(exec_id = %exec_id, error = %source, "writing stdin failed");
                            degraded.push(ExecError::InputWrite { source });
                        }
                    }
                }
                err = &mut interrupted => {
                    return Err(abort(&mut lifecycle, &start_task, &pump, err));
                }
            }
        }
        lifecycle.advance(ExecState::AwaitingCompletion);

        let completion = tokio::select! {
            done = done_rx => done,
            err = &mut interrupted => {
                return Err(abort(&mut lifecycle, &start_task, &pump, err));
            }
        };

        let summary = pump.join(self.options.drain_grace).await;
        degraded.extend(summary.errors);

        let exit = match completion {
            Ok(Ok(exit)) => exit,
            Ok(Err(source)) => {
                lifecycle.advance(ExecState::Completed { success: false });
                warn!(exec_id = %exec_id, error = %source, "exec failed");
                return Err(ExecError::Start { exec_id, source });
            }
            Err(_) => {
                lifecycle.advance(ExecState::Completed { success: false });
                return Err(ExecError::Start {
                    exec_id,
                    source: ServiceError::Remote(
                        "start task ended without reporting a result".to_string(),
                    ),
                });
            }
        };
        lifecycle.advance(ExecState::Completed { success: true });

        info!(
            exec_id = %exec_id,
            exit_code = ?exit.code,
            stdout_lines = summary.stdout.lines,
            stderr_lines = summary.stderr.lines,
            degraded = degraded.len(),
            "exec completed"
        );

        Ok(ExecReport {
            exec_id,
            exit_code: exit.code,
            stdout: summary.stdout,
            stderr: summary.stderr,
            degraded,
        })
    }
}

/// Write the whole payload, then signal end-of-input.
async fn write_input(mut writer: PipeWriter, payload: &[u8]) -> io::Result<()> {
    let written = writer.write_all(payload).await;
    let closed = writer.close().await;
    written.and(closed)
}

async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            sleep(limit).await;
            limit
        }
        None => pending().await,
    }
}

fn abort(
    lifecycle: &mut Lifecycle,
    start_task: &tokio::task::JoinHandle<()>,
    pump: &StreamPump,
    err: ExecError,
) -> ExecError {
    warn!(exec_id = %lifecycle.label, error = %err, "exec interrupted; tearing down");
    // Dropping the start future releases the backend's pipe ends.
    start_task.abort();
    pump.abort();
    lifecycle.advance(ExecState::Cancelled);
    err
}

struct Lifecycle {
    label: String,
    state: ExecState,
}

impl Lifecycle {
    fn new(target: &str) -> Self {
        Self {
            label: target.to_string(),
            state: ExecState::Created,
        }
    }

    fn registered(&mut self, exec_id: &str) {
        self.label = exec_id.to_string();
        self.advance(ExecState::Registered);
    }

    fn advance(&mut self, next: ExecState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal exec transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(exec_id = %self.label, from = ?self.state, to = ?next, "exec state");
        self.state = next;
    }
}
