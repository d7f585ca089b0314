// ABOUTME: Random host ports with bindability probing and process-wide uniqueness.
// ABOUTME: The shared assigned set keeps independent generators from colliding.

use super::{PortError, PortGenerator};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Range random ports are drawn from; stays clear of well-known and most
/// registered ports.
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 10000..=65535;

/// Draws one random port per call and checks it can be bound locally.
///
/// A port that is already bound yields `PortError::InUse`; retrying is the
/// caller's business.
#[derive(Debug)]
pub struct RandomPortGenerator {
    range: RangeInclusive<u16>,
    rng: fastrand::Rng,
}

impl RandomPortGenerator {
    pub fn new() -> Self {
        Self::with_range(DEFAULT_PORT_RANGE)
    }

    pub fn with_range(range: RangeInclusive<u16>) -> Self {
        Self {
            range,
            rng: fastrand::Rng::new(),
        }
    }

    /// Seeded generator, for reproducible tests.
    pub fn with_seed(range: RangeInclusive<u16>, seed: u64) -> Self {
        Self {
            range,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Default for RandomPortGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortGenerator for RandomPortGenerator {
    fn generate_port(&mut self) -> Result<u16, PortError> {
        let port = self.rng.u16(self.range.clone());
        if is_bindable(port) {
            Ok(port)
        } else {
            Err(PortError::InUse(port))
        }
    }
}

fn is_bindable(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}

/// Ports handed out so far, shared by every generator of one context.
#[derive(Debug, Clone, Default)]
pub struct AssignedPorts(Arc<Mutex<HashSet<u16>>>);

impl AssignedPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `port` as assigned. Returns false if it was already taken.
    pub fn claim(&self, port: u16) -> bool {
        self.0.lock().insert(port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.0.lock().contains(&port)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Wraps another generator and never returns a port twice across all
/// generators sharing the same `AssignedPorts`.
///
/// In-use and already-assigned candidates are retried without bound: with
/// 55k candidates the odds of a long streak of collisions vanish quickly.
/// `PortError::Exhausted` from the inner generator is returned as is, since
/// retrying could never succeed.
#[derive(Debug)]
pub struct RandomUniquePortGenerator<G = RandomPortGenerator> {
    inner: G,
    assigned: AssignedPorts,
}

impl RandomUniquePortGenerator<RandomPortGenerator> {
    pub fn new(assigned: AssignedPorts) -> Self {
        Self::wrap(RandomPortGenerator::new(), assigned)
    }
}

impl<G: PortGenerator> RandomUniquePortGenerator<G> {
    pub fn wrap(inner: G, assigned: AssignedPorts) -> Self {
        Self { inner, assigned }
    }

    pub fn assigned(&self) -> &AssignedPorts {
        &self.assigned
    }
}

impl<G: PortGenerator> PortGenerator for RandomUniquePortGenerator<G> {
    fn generate_port(&mut self) -> Result<u16, PortError> {
        loop {
            match self.inner.generate_port() {
                Ok(port) if self.assigned.claim(port) => return Ok(port),
                Ok(port) => tracing::trace!(port, "port already assigned, drawing again"),
                Err(PortError::InUse(port)) => {
                    tracing::trace!(port, "port in use, drawing again")
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedPortGenerator;

    #[test]
    fn random_port_stays_in_range() {
        let mut generator = RandomPortGenerator::with_seed(20000..=20100, 7);
        for _ in 0..20 {
            match generator.generate_port() {
                Ok(port) | Err(PortError::InUse(port)) => assert!((20000..=20100).contains(&port)),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[test]
    fn bound_port_is_reported_in_use() {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut generator = RandomPortGenerator::with_range(port..=port);
        assert_eq!(generator.generate_port(), Err(PortError::InUse(port)));
    }

    #[test]
    fn unique_skips_ports_assigned_elsewhere() {
        let assigned = AssignedPorts::new();
        assert!(assigned.claim(40001));

        let inner = FixedPortGenerator::new([40001, 40002]);
        let mut generator = RandomUniquePortGenerator::wrap(inner, assigned.clone());

        assert_eq!(generator.generate_port(), Ok(40002));
        assert!(assigned.contains(40002));
        assert_eq!(generator.generate_port(), Err(PortError::Exhausted));
    }

    #[test]
    fn generators_sharing_a_set_never_collide() {
        let assigned = AssignedPorts::new();
        let mut a = RandomUniquePortGenerator::wrap(FixedPortGenerator::new([1, 2, 3]), assigned.clone());
        let mut b = RandomUniquePortGenerator::wrap(FixedPortGenerator::new([2, 3, 4]), assigned.clone());

        assert_eq!(a.generate_port(), Ok(1));
        assert_eq!(b.generate_port(), Ok(2));
        assert_eq!(a.generate_port(), Ok(3));
        assert_eq!(b.generate_port(), Ok(4));
        assert_eq!(assigned.len(), 4);
    }
}
