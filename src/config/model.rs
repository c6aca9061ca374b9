// src/config/model.rs

use serde::Deserialize;

use crate::exec::ExecOptions;
use crate::types::BackendKind;

/// Configuration exactly as read from a TOML file.
///
/// ```toml
/// [service]
/// backend = "docker"
/// docker_bin = "docker"
///
/// [exec]
/// timeout = "30s"
/// trailing_line = "drop"
/// drain_grace = "250ms"
/// line_buffer = 1
/// ```
///
/// All sections are optional. Strings are only interpreted when converting
/// into a [`ConfigFile`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub exec: ExecSection,
}

/// `[service]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    /// `"docker"` (default) or `"local"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Docker CLI to invoke for the docker backend.
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
}

fn default_backend() -> String {
    "docker".to_string()
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            docker_bin: default_docker_bin(),
        }
    }
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    /// Deadline for a whole execution (e.g. `"30s"`). Unset means none.
    #[serde(default)]
    pub timeout: Option<String>,

    /// `"drop"` (default) or `"flush"`: what happens to an unterminated last
    /// line when a stream ends.
    #[serde(default = "default_trailing_line")]
    pub trailing_line: String,

    /// How long output may keep draining after the command finished.
    #[serde(default = "default_drain_grace")]
    pub drain_grace: String,

    /// Capacity of the line channels the CLI hands to the pumps.
    #[serde(default = "default_line_buffer")]
    pub line_buffer: usize,
}

fn default_trailing_line() -> String {
    "drop".to_string()
}

fn default_drain_grace() -> String {
    "250ms".to_string()
}

fn default_line_buffer() -> usize {
    1
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            timeout: None,
            trailing_line: default_trailing_line(),
            drain_grace: default_drain_grace(),
            line_buffer: default_line_buffer(),
        }
    }
}

/// Validated configuration used by the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub backend: BackendKind,
    pub docker_bin: String,
    pub exec: ExecOptions,
    pub line_buffer: usize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            docker_bin: default_docker_bin(),
            exec: ExecOptions::default(),
            line_buffer: default_line_buffer(),
        }
    }
}
