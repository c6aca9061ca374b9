// src/exec/local.rs

//! Host-process backend.
//!
//! The "workload" is a directory on the host: registering checks that it
//! exists, starting runs the command directly (no shell) with that directory
//! as its working directory.

use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::errors::ServiceError;
use crate::exec::process::{drive_child, exit_code};
use crate::exec::request::ExecSpec;
use crate::exec::service::{
    ExecExit, ExecHandle, ExecIo, HandleRegistry, RemoteExecService, ServiceFuture,
};

#[derive(Debug, Default)]
pub struct LocalProcessService {
    registry: HandleRegistry,
}

impl LocalProcessService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteExecService for LocalProcessService {
    fn register(&self, spec: ExecSpec) -> ServiceFuture<'_, ExecHandle> {
        Box::pin(async move {
            let dir = Path::new(&spec.target);
            if !tokio::fs::metadata(dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                return Err(ServiceError::UnknownTarget(spec.target));
            }
            Ok(self.registry.insert(spec))
        })
    }

    fn start(&self, handle: ExecHandle, io: ExecIo) -> ServiceFuture<'_, ExecExit> {
        Box::pin(async move {
            let spec = self.registry.take(&handle)?;
            let (program, args) = spec
                .command
                .split_first()
                .ok_or_else(|| ServiceError::Remote("empty command".to_string()))?;

            let mut cmd = Command::new(program);
            cmd.args(args).current_dir(&spec.target);

            let status = drive_child(cmd, spec.attach, io).await?;
            info!(
                exec_id = handle.id(),
                exit_code = ?status.code(),
                success = status.success(),
                "local exec process exited"
            );

            Ok(ExecExit {
                code: exit_code(&status),
            })
        })
    }
}
