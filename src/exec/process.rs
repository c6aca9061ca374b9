// src/exec/process.rs

//! Running a host process on behalf of a backend and bridging its stdio to
//! the pipes of an execution.

use std::process::{ExitStatus, Stdio};

use tokio::io::{self, AsyncRead, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::exec::pipe::PipeWriter;
use crate::exec::request::AttachFlags;
use crate::exec::service::ExecIo;
use crate::types::StreamKind;

/// Spawn `cmd`, wire it to `io` and wait for it to exit.
///
/// - Unattached streams are connected to the null device and their pipe
///   writers are closed right away.
/// - If a pump goes away mid-run the child's output is drained into a sink,
///   so the child never blocks on a full pipe.
/// - The child is killed if this future is dropped before it exits.
pub async fn drive_child(
    mut cmd: Command,
    attach: AttachFlags,
    io: ExecIo,
) -> Result<ExitStatus, ServiceError> {
    let ExecIo {
        stdin,
        stdout,
        stderr,
    } = io;

    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(if attach.stdout { Stdio::piped() } else { Stdio::null() })
        .stderr(if attach.stderr { Stdio::piped() } else { Stdio::null() })
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(ServiceError::Spawn)?;
    debug!(pid = ?child.id(), "exec process spawned");

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let feed = async move {
        let (Some(mut src), Some(mut dst)) = (stdin, child_stdin) else {
            return;
        };
        match io::copy(&mut src, &mut dst).await {
            Ok(n) => debug!(bytes = n, "stdin forwarded"),
            // Usually the process exited without reading all of its input.
            Err(e) => debug!(error = %e, "stdin forwarding stopped"),
        }
        let _ = dst.shutdown().await;
    };

    let (_, _, _, status) = tokio::join!(
        feed,
        forward(StreamKind::Stdout, child_stdout, stdout),
        forward(StreamKind::Stderr, child_stderr, stderr),
        child.wait(),
    );

    status.map_err(|e| ServiceError::Remote(format!("waiting for exec process: {e}")))
}

async fn forward<R>(stream: StreamKind, src: Option<R>, mut dst: PipeWriter)
where
    R: AsyncRead + Unpin,
{
    if let Some(mut src) = src {
        if let Err(e) = io::copy(&mut src, &mut dst).await {
            warn!(%stream, error = %e, "output pipe closed early; discarding the rest");
            let _ = io::copy(&mut src, &mut io::sink()).await;
        }
    }
    if let Err(e) = dst.close().await {
        debug!(%stream, error = %e, "closing output pipe");
    }
}

pub fn exit_code(status: &ExitStatus) -> Option<i64> {
    status.code().map(i64::from)
}
