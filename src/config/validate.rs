// src/config/validate.rs

use std::str::FromStr;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ExecError, Result};
use crate::exec::ExecOptions;
use crate::types::{BackendKind, TrailingLinePolicy};

/// Check a raw config and turn it into a [`ConfigFile`].
///
/// This checks:
/// - `service.backend` is `"docker"` or `"local"`
/// - `service.docker_bin` is not blank
/// - `exec.timeout` (if set) and `exec.drain_grace` are valid, non-zero
///   durations
/// - `exec.trailing_line` is `"drop"` or `"flush"`
/// - `exec.line_buffer >= 1`
pub fn validate_config(raw: RawConfigFile) -> Result<ConfigFile> {
    let backend = BackendKind::from_str(&raw.service.backend)
        .map_err(|e| ExecError::Config(format!("[service].backend: {e}")))?;

    if raw.service.docker_bin.trim().is_empty() {
        return Err(ExecError::Config(
            "[service].docker_bin cannot be empty".to_string(),
        ));
    }

    let timeout = raw
        .exec
        .timeout
        .as_deref()
        .map(|s| non_zero_duration("[exec].timeout", s))
        .transpose()?;

    let drain_grace = non_zero_duration("[exec].drain_grace", &raw.exec.drain_grace)?;

    let trailing_line = TrailingLinePolicy::from_str(&raw.exec.trailing_line)
        .map_err(|e| ExecError::Config(format!("[exec].trailing_line: {e}")))?;

    if raw.exec.line_buffer == 0 {
        return Err(ExecError::Config(
            "[exec].line_buffer must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(ConfigFile {
        backend,
        docker_bin: raw.service.docker_bin,
        exec: ExecOptions {
            timeout,
            trailing_line,
            drain_grace,
        },
        line_buffer: raw.exec.line_buffer,
    })
}

fn non_zero_duration(key: &str, value: &str) -> Result<std::time::Duration> {
    let parsed = parse_duration(value).map_err(|e| ExecError::Config(format!("{key}: {e}")))?;
    if parsed.is_zero() {
        return Err(ExecError::Config(format!("{key} must be greater than zero")));
    }
    Ok(parsed)
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ExecError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        validate_config(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_validate_to_default_config() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg, ConfigFile::default());
        assert_eq!(cfg.exec.drain_grace, Duration::from_millis(250));
        assert_eq!(cfg.exec.timeout, None);
    }

    #[test]
    fn bad_values_name_the_offending_key() {
        let mut raw = RawConfigFile::default();
        raw.exec.trailing_line = "keep".to_string();
        match validate_config(raw) {
            Err(ExecError::Config(msg)) => assert!(msg.contains("trailing_line")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut raw = RawConfigFile::default();
        raw.exec.timeout = Some("0s".to_string());
        match validate_config(raw) {
            Err(ExecError::Config(msg)) => assert!(msg.contains("[exec].timeout")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut raw = RawConfigFile::default();
        raw.service.backend = "podman".to_string();
        assert!(matches!(validate_config(raw), Err(ExecError::Config(_))));

        let mut raw = RawConfigFile::default();
        raw.exec.line_buffer = 0;
        assert!(matches!(validate_config(raw), Err(ExecError::Config(_))));
    }
}
