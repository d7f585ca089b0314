// ABOUTME: Crate-level error type for spec files and the CLI.
// ABOUTME: Wraps the per-concern errors so callers can use one Result.

use crate::container::{SpecError, StartError};
use crate::runtime::{ContainerError, RuntimeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("spec file not found: {0}")]
    SpecFileNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid spec file: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
