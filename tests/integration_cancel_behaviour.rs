use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use execpump::errors::{ExecError, ServiceError};
use execpump::exec::service::ServiceFuture;
use execpump::exec::{ExecExit, ExecHandle, ExecIo, ExecRequest, ExecSpec, RemoteExecService};
use execpump_test_utils::builders::CoordinatorBuilder;
use execpump_test_utils::fake_service::{FakeExecService, FakeProcess};
use execpump_test_utils::{collect_lines, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// Prints one line, then never finishes.
async fn hang(mut p: FakeProcess) -> Result<ExecExit, ServiceError> {
    p.out("started\n").await;
    std::future::pending().await
}

/// A backend whose `register` never answers, like a wedged `docker inspect`.
#[derive(Default)]
struct StuckRegistration {
    starts: AtomicUsize,
}

impl RemoteExecService for StuckRegistration {
    fn register(&self, _spec: ExecSpec) -> ServiceFuture<'_, ExecHandle> {
        Box::pin(std::future::pending::<Result<ExecHandle, ServiceError>>())
    }

    fn start(&self, _handle: ExecHandle, _io: ExecIo) -> ServiceFuture<'_, ExecExit> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Box::pin(std::future::pending::<Result<ExecExit, ServiceError>>())
    }
}

fn hanging_service() -> Arc<FakeExecService> {
    Arc::new(
        FakeExecService::new()
            .with_target("web-1")
            .with_program("hang", hang),
    )
}

#[tokio::test]
async fn timeout_tears_down_a_hung_execution() -> TestResult {
    init_tracing();
    let coordinator = CoordinatorBuilder::new(hanging_service())
        .timeout(Duration::from_millis(100))
        .build();

    let (tx, rx) = mpsc::channel(4);
    let started = Instant::now();
    let err = with_timeout(coordinator.execute(ExecRequest::new("web-1", ["hang"]).stdout(tx)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::TimedOut(limit) if limit == Duration::from_millis(100)));
    assert!(started.elapsed() < Duration::from_secs(2));
    // Pumps are aborted, so the sink is released and the channel closes.
    let lines = with_timeout(collect_lines(rx)).await;
    assert!(lines.len() <= 1);
    Ok(())
}

#[tokio::test]
async fn cancel_signal_stops_execution() -> TestResult {
    init_tracing();
    let coordinator = CoordinatorBuilder::new(hanging_service()).build();

    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(());
    });

    let err = with_timeout(
        coordinator.execute_with_cancel(ExecRequest::new("web-1", ["hang"]), cancel_rx),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::Cancelled));
    assert!(err.is_fatal());
    Ok(())
}

#[tokio::test]
async fn dropped_cancel_sender_is_not_a_cancellation() -> TestResult {
    init_tracing();
    let service = Arc::new(FakeExecService::new().with_target("web-1"));
    let coordinator = CoordinatorBuilder::new(service).build();

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    drop(cancel_tx);

    let (tx, rx) = mpsc::channel(1);
    let request = ExecRequest::new("web-1", ["echo", "still", "here"]).stdout(tx);
    let report = with_timeout(coordinator.execute_with_cancel(request, cancel_rx)).await?;

    assert_eq!(report.exit_code, Some(0));
    assert_eq!(collect_lines(rx).await, vec!["still here\n"]);
    Ok(())
}

#[tokio::test]
async fn cancel_while_stdin_is_blocked() -> TestResult {
    init_tracing();
    let coordinator = CoordinatorBuilder::new(hanging_service()).build();

    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(());
    });

    // `hang` never reads stdin, so this write can't complete on its own.
    let request = ExecRequest::new("web-1", ["hang"]).stdin(vec![0u8; 1024 * 1024]);
    let err = with_timeout(coordinator.execute_with_cancel(request, cancel_rx))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Cancelled));
    Ok(())
}

#[tokio::test]
async fn timeout_leaves_coordinator_usable() -> TestResult {
    init_tracing();
    let coordinator = CoordinatorBuilder::new(hanging_service())
        .timeout(Duration::from_millis(50))
        .build();

    let first = with_timeout(coordinator.execute(ExecRequest::new("web-1", ["hang"]))).await;
    assert!(matches!(first, Err(ExecError::TimedOut(_))));

    let (tx, rx) = mpsc::channel(1);
    let report =
        with_timeout(coordinator.execute(ExecRequest::new("web-1", ["echo", "ok"]).stdout(tx))).await?;
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(collect_lines(rx).await, vec!["ok\n"]);
    Ok(())
}

#[tokio::test]
async fn timeout_covers_a_hung_registration() -> TestResult {
    init_tracing();
    let service = Arc::new(StuckRegistration::default());
    let coordinator = CoordinatorBuilder::new(service.clone())
        .timeout(Duration::from_millis(50))
        .build();

    let (tx, rx) = mpsc::channel(1);
    let err = with_timeout(coordinator.execute(ExecRequest::new("web-1", ["echo", "hi"]).stdout(tx)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::TimedOut(limit) if limit == Duration::from_millis(50)));
    assert_eq!(service.starts.load(Ordering::SeqCst), 0);
    // Nothing was attached, so the sink is released with the request.
    assert!(with_timeout(collect_lines(rx)).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_covers_a_hung_registration() -> TestResult {
    init_tracing();
    let service = Arc::new(StuckRegistration::default());
    let coordinator = CoordinatorBuilder::new(service.clone()).build();

    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(());
    });

    let err = with_timeout(
        coordinator.execute_with_cancel(ExecRequest::new("web-1", ["echo", "hi"]), cancel_rx),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecError::Cancelled));
    assert_eq!(service.starts.load(Ordering::SeqCst), 0);
    Ok(())
}
