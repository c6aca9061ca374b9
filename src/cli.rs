// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::BackendKind;

/// Command-line arguments for `execpump`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execpump",
    version,
    about = "Run a command inside a running container and stream its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Execpump.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECPUMP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Execution backend; overrides `[service].backend`.
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// Give up after this long (e.g. `30s`); overrides `[exec].timeout`.
    #[arg(long, value_name = "DURATION", global = true)]
    pub timeout: Option<String>,

    /// Deliver an unterminated last line instead of dropping it.
    #[arg(long, global = true)]
    pub flush_partial_line: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a command in the target and stream its output.
    Exec {
        /// Container name or id (directory for the local backend).
        #[arg(long)]
        target: String,

        /// Feed this file to the command's stdin.
        #[arg(long, value_name = "PATH")]
        stdin_file: Option<PathBuf>,

        /// Do not attach stdout.
        #[arg(long)]
        no_stdout: bool,

        /// Do not attach stderr.
        #[arg(long)]
        no_stderr: bool,

        /// The command and its arguments.
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "CMD"
        )]
        command: Vec<String>,
    },

    /// Copy a local file into the target, optionally running it afterwards.
    Drop {
        #[arg(long)]
        target: String,

        /// Local file to copy.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// Absolute destination path inside the target.
        #[arg(long, value_name = "PATH")]
        dest: String,

        /// Make the dropped file executable and run it.
        #[arg(long)]
        run: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_collects_trailing_command_with_hyphens() {
        let args = CliArgs::try_parse_from([
            "execpump", "--backend", "local", "exec", "--target", "/srv", "--", "ls", "-la", "/",
        ])
        .unwrap();

        assert_eq!(args.backend, Some(BackendKind::Local));
        match args.command {
            Command::Exec {
                target, command, ..
            } => {
                assert_eq!(target, "/srv");
                assert_eq!(command, vec!["ls", "-la", "/"]);
            }
            other => panic!("unexpected subcommand: {other:?}"),
        }
    }

    #[test]
    fn exec_requires_a_command() {
        assert!(CliArgs::try_parse_from(["execpump", "exec", "--target", "web"]).is_err());
    }

    #[test]
    fn drop_accepts_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "execpump", "drop", "--target", "web", "--file", "payload.sh", "--dest",
            "/shizzle", "--run", "--timeout", "10s",
        ])
        .unwrap();

        assert_eq!(args.timeout.as_deref(), Some("10s"));
        assert!(matches!(args.command, Command::Drop { run: true, .. }));
    }
}
