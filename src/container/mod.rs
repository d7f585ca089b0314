// ABOUTME: Container specs, the orchestrator that starts them, and started handles.
// ABOUTME: Address and port resolution over inspection snapshots lives here too.

mod error;
mod orchestrator;
mod resolve;
mod spec;
mod started;

pub use error::StartError;
pub use orchestrator::{LABEL_MANAGED, LABEL_SESSION, Orchestrator};
pub use resolve::{resolve_address, resolve_host_port};
pub use spec::{
    ContainerBuilder, ContainerSpec, DEFAULT_HEALTHCHECK_INTERVAL, DEFAULT_STOP_TIMEOUT,
    HealthcheckSpec, PortStrategy, SpecError,
};
pub use started::StartedContainer;
