use std::error::Error;
use std::io::Write;
use std::time::Duration;

use execpump::config::{load_and_validate, load_from_path, load_or_default};
use execpump::errors::ExecError;
use execpump::types::{BackendKind, TrailingLinePolicy};
use execpump_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn full_config_file_is_interpreted() -> TestResult {
    let file = write_config(
        r#"
[service]
backend = "local"
docker_bin = "/usr/local/bin/podman"

[exec]
timeout = "30s"
trailing_line = "flush"
drain_grace = "1s"
line_buffer = 16
"#,
    )?;

    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.backend, BackendKind::Local);
    assert_eq!(cfg.docker_bin, "/usr/local/bin/podman");
    assert_eq!(cfg.exec.timeout, Some(Duration::from_secs(30)));
    assert_eq!(cfg.exec.trailing_line, TrailingLinePolicy::Flush);
    assert_eq!(cfg.exec.drain_grace, Duration::from_secs(1));
    assert_eq!(cfg.line_buffer, 16);
    Ok(())
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    let file = write_config("")?;

    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg, ConfigFileBuilder::new().build());
    assert_eq!(cfg.backend, BackendKind::Docker);
    assert_eq!(cfg.exec.timeout, None);
    assert_eq!(cfg.exec.trailing_line, TrailingLinePolicy::Drop);
    Ok(())
}

#[test]
fn raw_loading_keeps_strings_uninterpreted() -> TestResult {
    let file = write_config("[exec]\ntimeout = \"soon\"\n")?;

    let raw = load_from_path(file.path())?;
    assert_eq!(raw.exec.timeout.as_deref(), Some("soon"));

    let err = load_and_validate(file.path()).unwrap_err();
    match err {
        ExecError::Config(msg) => assert!(msg.contains("[exec].timeout"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let file = write_config("[service\nbackend = ")?;

    assert!(matches!(load_from_path(file.path()), Err(ExecError::Toml(_))));
    Ok(())
}

#[test]
fn explicit_missing_path_is_an_error() {
    let err = load_or_default(Some(std::path::Path::new("/no/such/Execpump.toml"))).unwrap_err();
    assert!(matches!(err, ExecError::Io(_)));
}

#[test]
fn unknown_backend_is_rejected() {
    let raw = ConfigFileBuilder::new().backend("kubernetes").raw();
    let err = execpump::config::validate_config(raw).unwrap_err();
    assert!(err.to_string().contains("[service].backend"));
}

#[test]
fn builder_values_go_through_validation() {
    let cfg = ConfigFileBuilder::new()
        .timeout("500ms")
        .trailing_line("flush")
        .line_buffer(4)
        .build();

    assert_eq!(cfg.exec.timeout, Some(Duration::from_millis(500)));
    assert_eq!(cfg.exec.trailing_line, TrailingLinePolicy::Flush);
    assert_eq!(cfg.line_buffer, 4);
}

#[test]
fn oversized_timeout_is_a_config_error() {
    let raw = ConfigFileBuilder::new().timeout("400000000000000000m").raw();
    let err = execpump::config::validate_config(raw).unwrap_err();
    match err {
        ExecError::Config(msg) => assert!(msg.contains("[exec].timeout"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}
