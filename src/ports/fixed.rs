// ABOUTME: Deterministic port generator over a caller-supplied list.
// ABOUTME: Hands ports out in order and fails once the list is used up.

use super::{PortError, PortGenerator};

/// Returns the configured ports in order, then `PortError::Exhausted`.
#[derive(Debug, Clone)]
pub struct FixedPortGenerator {
    ports: Vec<u16>,
    next: usize,
}

impl FixedPortGenerator {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
            next: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.ports.len() - self.next
    }
}

impl PortGenerator for FixedPortGenerator {
    fn generate_port(&mut self) -> Result<u16, PortError> {
        let port = *self.ports.get(self.next).ok_or(PortError::Exhausted)?;
        self.next += 1;
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_in_order_then_exhausts() {
        let mut generator = FixedPortGenerator::new([6379, 5432, 3306]);
        assert_eq!(generator.generate_port(), Ok(6379));
        assert_eq!(generator.generate_port(), Ok(5432));
        assert_eq!(generator.remaining(), 1);
        assert_eq!(generator.generate_port(), Ok(3306));
        assert_eq!(generator.generate_port(), Err(PortError::Exhausted));
        assert_eq!(generator.generate_port(), Err(PortError::Exhausted));
    }

    #[test]
    fn empty_list_is_exhausted_immediately() {
        let mut generator = FixedPortGenerator::new([]);
        assert_eq!(generator.generate_port(), Err(PortError::Exhausted));
    }
}
