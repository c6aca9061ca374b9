#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use execpump::config::{ConfigFile, ExecSection, RawConfigFile, ServiceSection};
use execpump::exec::{ExecCoordinator, ExecOptions, RemoteExecService};
use execpump::types::TrailingLinePolicy;

/// Builder for `ConfigFile` that goes through the same validation as a
/// TOML file does.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                service: ServiceSection::default(),
                exec: ExecSection::default(),
            },
        }
    }

    pub fn backend(mut self, backend: &str) -> Self {
        self.config.service.backend = backend.to_string();
        self
    }

    pub fn docker_bin(mut self, bin: &str) -> Self {
        self.config.service.docker_bin = bin.to_string();
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.exec.timeout = Some(timeout.to_string());
        self
    }

    pub fn trailing_line(mut self, policy: &str) -> Self {
        self.config.exec.trailing_line = policy.to_string();
        self
    }

    pub fn drain_grace(mut self, grace: &str) -> Self {
        self.config.exec.drain_grace = grace.to_string();
        self
    }

    pub fn line_buffer(mut self, capacity: usize) -> Self {
        self.config.exec.line_buffer = capacity;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a coordinator over any service, with test-friendly options.
pub struct CoordinatorBuilder {
    service: Arc<dyn RemoteExecService>,
    options: ExecOptions,
}

impl CoordinatorBuilder {
    pub fn new(service: Arc<dyn RemoteExecService>) -> Self {
        Self {
            service,
            options: ExecOptions::default(),
        }
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.options.timeout = Some(limit);
        self
    }

    pub fn flush_trailing_line(mut self) -> Self {
        self.options.trailing_line = TrailingLinePolicy::Flush;
        self
    }

    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.options.drain_grace = grace;
        self
    }

    pub fn build(self) -> ExecCoordinator {
        ExecCoordinator::new(self.service).with_options(self.options)
    }
}
