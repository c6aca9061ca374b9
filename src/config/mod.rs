// src/config/mod.rs

//! Configuration loading and validation for execpump.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and interpret raw values (`validate.rs`, `duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ExecSection, RawConfigFile, ServiceSection};
pub use validate::validate_config;
