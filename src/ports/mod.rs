// ABOUTME: Host port allocation for container port bindings.
// ABOUTME: Fixed lists for well-known ports, random-unique ports for everything else.

mod fixed;
mod random;

pub use fixed::FixedPortGenerator;
pub use random::{AssignedPorts, DEFAULT_PORT_RANGE, RandomPortGenerator, RandomUniquePortGenerator};

/// Produces host ports, one per call.
pub trait PortGenerator: Send {
    fn generate_port(&mut self) -> Result<u16, PortError>;
}

impl<G: PortGenerator + ?Sized> PortGenerator for Box<G> {
    fn generate_port(&mut self) -> Result<u16, PortError> {
        (**self).generate_port()
    }
}

/// Errors from port generators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("no more ports available in the fixed list")]
    Exhausted,

    #[error("port {0} is already in use")]
    InUse(u16),
}
