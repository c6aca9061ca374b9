// src/exec/pump.rs

//! Stream pump: turns the raw stdout/stderr byte streams of an execution into
//! lines and hands them to per-stream destinations.
//!
//! Each stream gets its own Tokio task, so a slow destination on one stream
//! never holds up the other one. A pump task ends when its reader reaches EOF
//! or fails; a failure is logged and reported but does not affect the sibling
//! task.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::errors::ExecError;
use crate::types::{StreamKind, TrailingLinePolicy};

/// Where the lines of one stream go.
///
/// A stream without a sink (`None` at the call sites) is not attached at all;
/// should bytes still show up they are logged at debug and dropped.
pub enum LineSink {
    /// Attach the stream, log every line at debug, keep nothing.
    Log,
    /// Hand every line to a channel. `send` waits for capacity, so a consumer
    /// that stops receiving stalls this stream only.
    Channel(mpsc::Sender<String>),
    /// Call a closure for every line, inline on the pump task.
    Consumer(Box<dyn FnMut(String) + Send>),
}

impl LineSink {
    pub fn consumer(f: impl FnMut(String) + Send + 'static) -> Self {
        LineSink::Consumer(Box::new(f))
    }
}

impl From<mpsc::Sender<String>> for LineSink {
    fn from(tx: mpsc::Sender<String>) -> Self {
        LineSink::Channel(tx)
    }
}

impl fmt::Debug for LineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSink::Log => f.write_str("Log"),
            LineSink::Channel(_) => f.write_str("Channel"),
            LineSink::Consumer(_) => f.write_str("Consumer"),
        }
    }
}

/// What one pump task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub stream: StreamKind,
    /// Lines handed to the destination (or logged, for unattached streams).
    pub lines: usize,
    /// Raw bytes read from the stream, including any dropped fragment.
    pub bytes: u64,
    /// The task was still running when the drain grace period ran out.
    pub truncated: bool,
}

impl PumpReport {
    fn new(stream: StreamKind) -> Self {
        Self {
            stream,
            lines: 0,
            bytes: 0,
            truncated: false,
        }
    }
}

/// Output of a single pump task.
#[derive(Debug)]
pub struct PumpOutput {
    pub report: PumpReport,
    pub error: Option<io::Error>,
}

/// Both pump reports plus any degraded stream errors.
#[derive(Debug)]
pub struct PumpSummary {
    pub stdout: PumpReport,
    pub stderr: PumpReport,
    pub errors: Vec<ExecError>,
}

/// Handles to the two pump tasks of one execution.
#[derive(Debug)]
pub struct StreamPump {
    stdout: JoinHandle<PumpOutput>,
    stderr: JoinHandle<PumpOutput>,
}

impl StreamPump {
    /// Start pumping both streams, each on its own task.
    pub fn start<O, E>(
        stdout: O,
        stderr: E,
        stdout_sink: Option<LineSink>,
        stderr_sink: Option<LineSink>,
        policy: TrailingLinePolicy,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            stdout: spawn_pump(StreamKind::Stdout, stdout, stdout_sink, policy),
            stderr: spawn_pump(StreamKind::Stderr, stderr, stderr_sink, policy),
        }
    }

    /// Wait for both tasks, giving them at most `grace` to finish.
    ///
    /// A task still running at the deadline is aborted and its report is
    /// marked `truncated`.
    pub async fn join(self, grace: Duration) -> PumpSummary {
        let deadline = Instant::now() + grace;
        let (out, err) = tokio::join!(
            finish(StreamKind::Stdout, self.stdout, deadline),
            finish(StreamKind::Stderr, self.stderr, deadline),
        );

        let mut errors = Vec::new();
        for (stream, error) in [(StreamKind::Stdout, out.error), (StreamKind::Stderr, err.error)] {
            if let Some(source) = error {
                errors.push(ExecError::StreamRead { stream, source });
            }
        }

        PumpSummary {
            stdout: out.report,
            stderr: err.report,
            errors,
        }
    }

    /// Stop both tasks immediately.
    pub fn abort(&self) {
        self.stdout.abort();
        self.stderr.abort();
    }
}

async fn finish(
    stream: StreamKind,
    mut handle: JoinHandle<PumpOutput>,
    deadline: Instant,
) -> PumpOutput {
    let truncated = |stream| PumpOutput {
        report: PumpReport {
            truncated: true,
            ..PumpReport::new(stream)
        },
        error: None,
    };

    match timeout_at(deadline, &mut handle).await {
        Ok(Ok(output)) => output,
        Ok(Err(join_err)) => {
            warn!(%stream, error = %join_err, "pump task did not complete");
            truncated(stream)
        }
        Err(_) => {
            warn!(%stream, "pump still draining after grace period; aborting");
            handle.abort();
            truncated(stream)
        }
    }
}

/// Spawn a pump task for a single stream.
pub fn spawn_pump<R>(
    stream: StreamKind,
    reader: R,
    sink: Option<LineSink>,
    policy: TrailingLinePolicy,
) -> JoinHandle<PumpOutput>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut delivery = Delivery { stream, sink };
        let mut report = PumpReport::new(stream);
        let mut buf = Vec::with_capacity(1024);

        debug!(%stream, "pump started");

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    report.bytes += n as u64;
                    let complete = buf.last() == Some(&b'\n');

                    // Without a delimiter we are at EOF with a fragment.
                    if !complete && policy == TrailingLinePolicy::Drop {
                        debug!(%stream, bytes = n, "dropping unterminated trailing fragment");
                        break;
                    }

                    delivery
                        .deliver(String::from_utf8_lossy(&buf).into_owned())
                        .await;
                    report.lines += 1;

                    if !complete {
                        break;
                    }
                }
                Err(e) => {
                    warn!(%stream, error = %e, "pump read failed; stopping this stream");
                    return PumpOutput {
                        report,
                        error: Some(e),
                    };
                }
            }
        }

        debug!(%stream, lines = report.lines, "pump ended");
        PumpOutput {
            report,
            error: None,
        }
    })
}

struct Delivery {
    stream: StreamKind,
    sink: Option<LineSink>,
}

impl Delivery {
    async fn deliver(&mut self, line: String) {
        let stream = self.stream;
        let receiver_gone = match &mut self.sink {
            None => {
                debug!(%stream, "unattached stream: {}", line.trim_end());
                false
            }
            Some(LineSink::Log) => {
                debug!(%stream, "{}", line.trim_end());
                false
            }
            Some(LineSink::Consumer(consume)) => {
                consume(line);
                false
            }
            Some(LineSink::Channel(tx)) => match tx.send(line).await {
                Ok(()) => false,
                Err(mpsc::error::SendError(line)) => {
                    debug!(%stream, "undelivered: {}", line.trim_end());
                    true
                }
            },
        };

        if receiver_gone {
            // Keep draining so the remote writer is never stuck on us.
            warn!(%stream, "line receiver dropped; logging remaining lines instead");
            self.sink = Some(LineSink::Log);
        }
    }
}
