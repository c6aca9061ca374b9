// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, load_or_default, parse_duration};
use crate::errors::ExecError;
use crate::exec::file_drop::{drop_file, run_dropped};
use crate::exec::{
    DockerCliService, ExecCoordinator, ExecReport, ExecRequest, LineSink, LocalProcessService,
    RemoteExecService,
};
use crate::types::{BackendKind, StreamKind, TrailingLinePolicy};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the selected backend and the coordinator
/// - printers that copy delivered lines to our own stdout/stderr
/// - Ctrl-C handling
///
/// Returns the exit code the process should end with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let mut cfg = load_or_default(args.config.as_deref()).context("loading configuration")?;
    apply_overrides(&mut cfg, &args)?;

    let coordinator = ExecCoordinator::new(build_service(&cfg)).with_options(cfg.exec.clone());
    info!(backend = ?cfg.backend, options = ?coordinator.options(), "execpump starting");

    match args.command {
        Command::Exec {
            target,
            stdin_file,
            no_stdout,
            no_stderr,
            command,
        } => {
            let mut request = ExecRequest::new(target, command);
            if let Some(path) = stdin_file {
                let payload = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading stdin payload {}", path.display()))?;
                request = request.stdin(payload);
            }

            let mut printers = Vec::new();
            if !no_stdout {
                let (sink, handle) = spawn_printer(StreamKind::Stdout, cfg.line_buffer);
                request = request.stdout(sink);
                printers.push(handle);
            }
            if !no_stderr {
                let (sink, handle) = spawn_printer(StreamKind::Stderr, cfg.line_buffer);
                request = request.stderr(sink);
                printers.push(handle);
            }

            let result = coordinator
                .execute_with_cancel(request, cancel_on_ctrl_c())
                .await;
            finish_printers(printers).await;
            Ok(exit_code_for(result?))
        }

        Command::Drop {
            target,
            file,
            dest,
            run,
        } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;

            // Remote children are killed when the runtime shuts down.
            tokio::select! {
                code = drop_workflow(&coordinator, &target, &dest, payload, run, cfg.line_buffer) => code,
                _ = tokio::signal::ctrl_c() => Err(ExecError::Cancelled.into()),
            }
        }
    }
}

async fn drop_workflow(
    coordinator: &ExecCoordinator,
    target: &str,
    dest: &str,
    payload: Vec<u8>,
    run: bool,
    line_buffer: usize,
) -> Result<i32> {
    let dropped = drop_file(coordinator, target, dest, payload).await?;
    if !run {
        return Ok(exit_code_for(dropped));
    }

    let (out_sink, out_printer) = spawn_printer(StreamKind::Stdout, line_buffer);
    let (err_sink, err_printer) = spawn_printer(StreamKind::Stderr, line_buffer);
    let result = run_dropped(coordinator, target, dest, Some(out_sink), Some(err_sink)).await;
    finish_printers(vec![out_printer, err_printer]).await;

    Ok(exit_code_for(result?))
}

/// Apply CLI flags on top of the loaded configuration.
pub fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(backend) = args.backend {
        cfg.backend = backend;
    }
    if let Some(ref timeout) = args.timeout {
        let limit = parse_duration(timeout)
            .map_err(|e| ExecError::Config(format!("--timeout: {e}")))?;
        cfg.exec.timeout = Some(limit);
    }
    if args.flush_partial_line {
        cfg.exec.trailing_line = TrailingLinePolicy::Flush;
    }
    Ok(())
}

pub fn build_service(cfg: &ConfigFile) -> Arc<dyn RemoteExecService> {
    match cfg.backend {
        BackendKind::Docker => Arc::new(DockerCliService::new(cfg.docker_bin.clone())),
        BackendKind::Local => Arc::new(LocalProcessService::new()),
    }
}

fn cancel_on_ctrl_c() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = tx.send(());
    });
    rx
}

/// Channel sink plus a task that writes every received line to our own
/// stdout or stderr.
fn spawn_printer(stream: StreamKind, capacity: usize) -> (LineSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(capacity);

    let handle = tokio::spawn(async move {
        let mut out: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match stream {
            StreamKind::Stdout => Box::new(tokio::io::stdout()),
            StreamKind::Stderr => Box::new(tokio::io::stderr()),
        };
        while let Some(line) = rx.recv().await {
            if out.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = out.flush().await;
        }
    });

    (LineSink::Channel(tx), handle)
}

async fn finish_printers(printers: Vec<JoinHandle<()>>) {
    for printer in printers {
        let _ = printer.await;
    }
}

fn exit_code_for(report: ExecReport) -> i32 {
    for problem in &report.degraded {
        warn!(exec_id = %report.exec_id, error = %problem, "exec completed with degraded output");
    }
    report
        .exit_code
        .map(|code| i32::try_from(code).unwrap_or(1))
        .unwrap_or(0)
}
