use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::config::model::StackConfig;
use crate::error::StackError;

/// True when nothing is listening on `port` locally.
pub fn check_port_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// A port counts as in use when we cannot bind it or something accepts a
/// connection on it (covers services bound to 0.0.0.0 or ::).
pub fn is_port_in_use(port: u16) -> bool {
    if !check_port_available(port) {
        return true;
    }
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok()
}

/// Identify which process owns a given port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    crate::platform::identify_port_owner(port)
}

/// The conflict for `service` on `port`, if the port is already taken.
pub fn port_conflict(service: &str, port: u16) -> Option<StackError> {
    if !is_port_in_use(port) {
        return None;
    }
    Some(StackError::PortConflict {
        service: service.to_string(),
        port,
        owner: identify_port_owner(port),
    })
}

/// Every configured port that is currently bound.
pub fn check_all_ports(config: &StackConfig) -> Vec<StackError> {
    config
        .services
        .iter()
        .filter_map(|svc| svc.port.and_then(|port| port_conflict(&svc.name, port)))
        .collect()
}
