// ABOUTME: Capability traits a container engine binding implements.
// ABOUTME: ContainerOps, ExecOps, LogOps, ImageOps, RuntimeInfo, and the Runtime bundle.

mod container;
mod exec;
mod image;
mod logs;
mod runtime_info;
mod shared_types;

pub use container::{ContainerError, ContainerOps};
pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogOps, LogOptions, LogStream, collect_logs};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Everything the orchestrator, handles and wait strategies need from an engine.
///
/// Implemented automatically for any type with all four capabilities, and
/// object safe so handles can hold an `Arc<dyn Runtime>`.
pub trait Runtime: ContainerOps + ExecOps + LogOps + ImageOps {}

impl<T: ContainerOps + ExecOps + LogOps + ImageOps + ?Sized> Runtime for T {}
