// src/exec/docker.rs

//! `docker exec` backend.
//!
//! - `register` asks `docker inspect` whether the container exists and is
//!   running, then records the spec under a fresh handle.
//! - `start` runs `docker exec [-i] <container> <cmd...>` and bridges its
//!   stdio to the execution pipes. No `-t`: output stays a plain byte stream.
//!
//! Exit status 125 means the docker CLI itself failed (daemon unreachable,
//! container gone); every other status is the remote command's own.

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::exec::process::{drive_child, exit_code};
use crate::exec::request::ExecSpec;
use crate::exec::service::{
    ExecExit, ExecHandle, ExecIo, HandleRegistry, RemoteExecService, ServiceFuture,
};

const DOCKER_CLI_FAILURE: i32 = 125;

#[derive(Debug)]
pub struct DockerCliService {
    docker_bin: String,
    registry: HandleRegistry,
}

impl DockerCliService {
    pub fn new(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            registry: HandleRegistry::new(),
        }
    }

    fn inspect_command(&self, container: &str) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.kill_on_drop(true).args([
            "inspect",
            "--type",
            "container",
            "--format",
            "{{.State.Running}}",
            container,
        ]);
        cmd
    }

    fn exec_command(&self, spec: &ExecSpec) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.arg("exec");
        if spec.attach.stdin {
            cmd.arg("-i");
        }
        // Arguments after the container name belong to the remote command.
        cmd.arg(&spec.target).args(&spec.command);
        cmd
    }
}

impl Default for DockerCliService {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl RemoteExecService for DockerCliService {
    fn register(&self, spec: ExecSpec) -> ServiceFuture<'_, ExecHandle> {
        Box::pin(async move {
            let output = self
                .inspect_command(&spec.target)
                .output()
                .await
                .map_err(ServiceError::Spawn)?;

            if !output.status.success() {
                debug!(
                    container = %spec.target,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "docker inspect failed"
                );
                return Err(ServiceError::UnknownTarget(spec.target));
            }

            if String::from_utf8_lossy(&output.stdout).trim() != "true" {
                return Err(ServiceError::NotRunning(spec.target));
            }

            Ok(self.registry.insert(spec))
        })
    }

    fn start(&self, handle: ExecHandle, io: ExecIo) -> ServiceFuture<'_, ExecExit> {
        Box::pin(async move {
            let spec = self.registry.take(&handle)?;
            let status = drive_child(self.exec_command(&spec), spec.attach, io).await?;

            if status.code() == Some(DOCKER_CLI_FAILURE) {
                return Err(ServiceError::Remote(format!(
                    "docker exec into '{}' failed (exit {DOCKER_CLI_FAILURE})",
                    spec.target
                )));
            }

            info!(
                exec_id = handle.id(),
                container = %spec.target,
                exit_code = ?status.code(),
                "docker exec finished"
            );

            Ok(ExecExit {
                code: exit_code(&status),
            })
        })
    }
}
