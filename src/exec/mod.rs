// src/exec/mod.rs

//! Remote execution layer.
//!
//! - [`coordinator`] runs one command end to end against a service.
//! - [`pump`] splits stdout/stderr into lines and delivers them.
//! - [`pipe`] provides the in-process byte pipes between the two sides.
//! - [`service`] defines the `RemoteExecService` seam; [`docker`] and
//!   [`local`] implement it, sharing the child driver in [`process`].
//! - [`file_drop`] builds the "write a file, then run it" workflow on top.

pub mod coordinator;
pub mod docker;
pub mod file_drop;
pub mod local;
pub mod pipe;
pub mod process;
pub mod pump;
pub mod request;
pub mod service;

pub use coordinator::{ExecCoordinator, ExecOptions, ExecReport};
pub use docker::DockerCliService;
pub use local::LocalProcessService;
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use pump::{LineSink, PumpReport, StreamPump};
pub use request::{AttachFlags, ExecRequest, ExecSpec};
pub use service::{ExecExit, ExecHandle, ExecIo, HandleRegistry, RemoteExecService};
