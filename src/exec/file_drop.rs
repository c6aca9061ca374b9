// src/exec/file_drop.rs

//! "Drop and run": copy a payload into a workload through stdin, then execute
//! it there.
//!
//! Both steps are ordinary executions through the coordinator:
//! - `/bin/sh -c "cat - > <dest>"` with the payload on stdin;
//! - `/bin/sh -c "chmod o+x <dest> && <dest>"` with caller-supplied sinks.

use anyhow::anyhow;
use tracing::info;

use crate::errors::{ExecError, Result};
use crate::exec::coordinator::{ExecCoordinator, ExecReport};
use crate::exec::pump::LineSink;
use crate::exec::request::ExecRequest;

const SHELL: &str = "/bin/sh";

/// Write `payload` to `dest` inside `target`.
///
/// A non-zero exit of the remote shell is an error here, since whatever
/// comes next would run a missing or partial file.
pub async fn drop_file(
    coordinator: &ExecCoordinator,
    target: &str,
    dest: &str,
    payload: Vec<u8>,
) -> Result<ExecReport> {
    validate_dest(dest)?;
    let script = format!("cat - > {}", shell_escape(dest));
    let bytes = payload.len();

    let report = coordinator
        .execute(ExecRequest::new(target, [SHELL, "-c", script.as_str()]).stdin(payload))
        .await?;

    if let Some(code) = report.exit_code.filter(|code| *code != 0) {
        return Err(ExecError::Other(anyhow!(
            "writing '{dest}' in '{target}' exited with code {code}"
        )));
    }

    info!(workload = %target, dest, bytes, "payload dropped");
    Ok(report)
}

/// Make `dest` executable and run it, streaming its output to the sinks.
pub async fn run_dropped(
    coordinator: &ExecCoordinator,
    target: &str,
    dest: &str,
    stdout: Option<LineSink>,
    stderr: Option<LineSink>,
) -> Result<ExecReport> {
    validate_dest(dest)?;
    let quoted = shell_escape(dest);
    let script = format!("chmod o+x {quoted} && {quoted}");

    let mut request = ExecRequest::new(target, [SHELL, "-c", script.as_str()]);
    if let Some(sink) = stdout {
        request = request.stdout(sink);
    }
    if let Some(sink) = stderr {
        request = request.stderr(sink);
    }

    coordinator.execute(request).await
}

fn validate_dest(dest: &str) -> Result<()> {
    if !dest.starts_with('/') {
        return Err(ExecError::InvalidRequest(format!(
            "drop destination '{dest}' must be an absolute path"
        )));
    }
    if dest.ends_with('/') {
        return Err(ExecError::InvalidRequest(format!(
            "drop destination '{dest}' names a directory"
        )));
    }
    Ok(())
}

pub fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}
