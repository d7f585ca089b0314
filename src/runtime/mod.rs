// ABOUTME: Container engine access for Docker and Podman.
// ABOUTME: Detects the local engine and connects through its API or its CLI.

mod bollard;
mod cli;
mod detection;
mod error;
mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use cli::CliRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{
    ClientKind, ENV_BINARY, ENV_CLIENT, ENV_RUNTIME, ENV_SOCKET, RuntimeConfig, RuntimeType,
};
/// Detection result; named apart from the `RuntimeInfo` capability trait.
pub use types::RuntimeInfo as DetectedRuntime;

use std::sync::Arc;

/// The `CAIRN_*` environment overrides, validated.
pub fn config_from_env() -> Result<RuntimeConfig, RuntimeError> {
    RuntimeConfig::from_env().map_err(|message| RuntimeError::InvalidConfig { message })
}

/// Connect to the local engine using `CAIRN_*` environment overrides.
pub fn connect_from_env() -> Result<Arc<dyn Runtime>, RuntimeError> {
    connect(&config_from_env()?)
}

/// Detect the engine and build the binding `config.client` asks for.
pub fn connect(config: &RuntimeConfig) -> Result<Arc<dyn Runtime>, RuntimeError> {
    match config.client {
        ClientKind::Api => {
            let detected = detect_local(Some(config))?;
            tracing::debug!(
                runtime = %detected.runtime_type,
                socket = %detected.socket_path,
                "connecting through engine API"
            );
            Ok(Arc::new(BollardRuntime::connect(&detected)?))
        }
        ClientKind::Cli => {
            // Without a socket to look at, the CLI defaults to docker.
            let runtime_type = match config.runtime {
                Some(runtime_type) => runtime_type,
                None => detect_local(Some(config))
                    .map(|d| d.runtime_type)
                    .unwrap_or(RuntimeType::Docker),
            };
            let runtime = match config.binary {
                Some(ref binary) => CliRuntime::with_binary(runtime_type, binary.clone()),
                None => CliRuntime::new(runtime_type),
            };
            tracing::debug!(runtime = %runtime_type, "connecting through engine CLI");
            Ok(Arc::new(runtime))
        }
    }
}
