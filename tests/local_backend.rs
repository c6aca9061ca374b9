#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use execpump::errors::{ExecError, ServiceError};
use execpump::exec::{ExecRequest, LocalProcessService};
use execpump_test_utils::builders::CoordinatorBuilder;
use execpump_test_utils::{collect_lines, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn workdir() -> std::io::Result<(tempfile::TempDir, String)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().to_string_lossy().into_owned();
    Ok((dir, path))
}

#[tokio::test]
async fn echo_output_is_delivered() -> TestResult {
    init_tracing();
    let (_dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new())).build();

    let (tx, rx) = mpsc::channel(1);
    let report =
        with_timeout(coordinator.execute(ExecRequest::new(&target, ["echo", "hi"]).stdout(tx))).await?;

    assert_eq!(collect_lines(rx).await, vec!["hi\n"]);
    assert_eq!(report.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn written_file_reads_back_with_flush() -> TestResult {
    init_tracing();
    let (dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new()))
        .flush_trailing_line()
        .build();

    let write = ExecRequest::new(&target, ["sh", "-c", "cat - > x"]).stdin(b"data".to_vec());
    let written = with_timeout(coordinator.execute(write)).await?;
    assert_eq!(written.exit_code, Some(0));
    assert_eq!(std::fs::read(dir.path().join("x"))?, b"data");

    let (tx, rx) = mpsc::channel(1);
    with_timeout(coordinator.execute(ExecRequest::new(&target, ["cat", "x"]).stdout(tx))).await?;
    assert_eq!(collect_lines(rx).await, vec!["data"]);
    Ok(())
}

#[tokio::test]
async fn stdout_and_stderr_are_kept_apart() -> TestResult {
    init_tracing();
    let (_dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new())).build();

    let (out_tx, out_rx) = mpsc::channel(4);
    let (err_tx, err_rx) = mpsc::channel(4);
    let request = ExecRequest::new(&target, ["sh", "-c", "echo out; echo err >&2; exit 4"])
        .stdout(out_tx)
        .stderr(err_tx);
    let report = with_timeout(coordinator.execute(request)).await?;

    assert_eq!(report.exit_code, Some(4));
    assert_eq!(collect_lines(out_rx).await, vec!["out\n"]);
    assert_eq!(collect_lines(err_rx).await, vec!["err\n"]);
    Ok(())
}

#[tokio::test]
async fn cat_without_stdin_exits() -> TestResult {
    init_tracing();
    let (_dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new())).build();

    let (tx, rx) = mpsc::channel(1);
    let report = with_timeout(coordinator.execute(ExecRequest::new(&target, ["cat"]).stdout(tx))).await?;

    assert_eq!(report.exit_code, Some(0));
    assert!(collect_lines(rx).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_directory_fails_registration() {
    init_tracing();
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new())).build();

    let err = coordinator
        .execute(ExecRequest::new("/definitely/not/here", ["true"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecError::Register {
            source: ServiceError::UnknownTarget(_),
            ..
        }
    ));
}

#[tokio::test]
async fn missing_program_is_a_start_failure() -> TestResult {
    init_tracing();
    let (_dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new())).build();

    let err = with_timeout(coordinator.execute(ExecRequest::new(&target, ["no-such-program-xyz"])))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecError::Start {
            source: ServiceError::Spawn(_),
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn slow_process_times_out() -> TestResult {
    init_tracing();
    let (_dir, target) = workdir()?;
    let coordinator = CoordinatorBuilder::new(Arc::new(LocalProcessService::new()))
        .timeout(Duration::from_millis(100))
        .build();

    let err = with_timeout(coordinator.execute(ExecRequest::new(&target, ["sleep", "5"])))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::TimedOut(_)));
    Ok(())
}
