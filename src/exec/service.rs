// src/exec/service.rs

//! Remote execution service abstraction.
//!
//! The coordinator talks to a `RemoteExecService` instead of a concrete
//! container runtime. Production backends live in [`super::docker`] and
//! [`super::local`]; tests plug in a scripted fake.
//!
//! A backend has two jobs:
//! - `register` an execution against a target and hand back an opaque handle;
//! - `start` that handle, wiring the process to the given pipe ends, and
//!   resolve only once the process has exited.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::ServiceError;
use crate::exec::pipe::{PipeReader, PipeWriter};
use crate::exec::request::ExecSpec;

pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Opaque identifier of one registered execution.
///
/// Moved into `start`, so a handle is used at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ExecHandle {
    id: String,
}

impl ExecHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Pipe ends handed to the backend for one execution.
///
/// The backend must drop every end it holds before `start` resolves; that is
/// what delivers EOF to the pumps.
#[derive(Debug)]
pub struct ExecIo {
    /// Present only when stdin is attached.
    pub stdin: Option<PipeReader>,
    pub stdout: PipeWriter,
    pub stderr: PipeWriter,
}

/// How the remote process ended, as far as the backend can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecExit {
    pub code: Option<i64>,
}

impl ExecExit {
    pub fn code(code: i64) -> Self {
        Self { code: Some(code) }
    }
}

/// Trait abstracting the remote side of an execution.
pub trait RemoteExecService: Send + Sync {
    /// Register an execution. Fails if the target is unknown or not running.
    fn register(&self, spec: ExecSpec) -> ServiceFuture<'_, ExecHandle>;

    /// Run a registered execution to completion.
    fn start(&self, handle: ExecHandle, io: ExecIo) -> ServiceFuture<'_, ExecExit>;
}

/// Book-keeping shared by backends: hands out handle ids and remembers the
/// spec registered under each until it is started.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next: AtomicU64,
    pending: Mutex<HashMap<String, ExecSpec>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, spec: ExecSpec) -> ExecHandle {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ExecHandle::new(format!("exec-{n}"));
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(handle.id().to_string(), spec);
        handle
    }

    /// Remove and return the spec for `handle`.
    pub fn take(&self, handle: &ExecHandle) -> Result<ExecSpec, ServiceError> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(handle.id())
            .ok_or_else(|| ServiceError::UnknownHandle(handle.id().to_string()))
    }
}
