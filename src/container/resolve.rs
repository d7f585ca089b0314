// ABOUTME: Address and mapped-port lookups over an inspection snapshot.
// ABOUTME: Pure functions, so they are testable without an engine.

use crate::runtime::{ContainerError, ContainerInfo};
use crate::types::ExposedPort;

/// The container's IP address.
///
/// With a named network, that network's address; otherwise the default
/// bridge address. A missing or empty address is `AddressUnavailable`.
pub fn resolve_address(info: &ContainerInfo, network: Option<&str>) -> Result<String, ContainerError> {
    let settings = &info.network_settings;
    let address = match network {
        Some(name) => settings.networks.get(name).map(|n| n.ip_address.clone()),
        None => settings
            .ip_address
            .clone()
            .filter(|ip| !ip.is_empty())
            .or_else(|| settings.networks.get("bridge").map(|n| n.ip_address.clone())),
    };

    address
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| ContainerError::AddressUnavailable(info.id.to_string()))
}

/// The first host port bound to `port`.
pub fn resolve_host_port(info: &ContainerInfo, port: &ExposedPort) -> Result<u16, ContainerError> {
    info.network_settings
        .ports
        .get(&port.key())
        .and_then(|bindings| bindings.iter().find_map(|b| b.host_port))
        .ok_or_else(|| ContainerError::PortNotExposed {
            id: info.id.to_string(),
            port: port.key(),
        })
}
