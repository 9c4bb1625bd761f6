use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Check that something is listening on the JMX endpoint
pub fn check_reachable(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| MonitorError::unreachable(format!("{}:{}: {}", host, port, e)))?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => {
                log::info!("JMX endpoint {} is reachable", addr);
                return Ok(addr);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(MonitorError::unreachable(match last_error {
        Some(e) => format!("{}:{}: {}", host, port, e),
        None => format!("{}:{}: no address resolved", host, port),
    }))
}
