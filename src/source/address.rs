//! Connection address parsing.
//!
//! Accepts URL-style addresses (`udp://:14540`, `tcp://host:5760`,
//! `serial:///dev/ttyUSB0:57600`) and the `mavlink` crate's native forms
//! (`udpin:`, `udpout:`, `udpbcast:`, `tcpin:`, `tcpout:`, `serial:`).

use crate::error::{DashboardError, Result};

/// Default baud rate when a serial address omits one
pub const DEFAULT_SERIAL_BAUD: u32 = 57600;

const NATIVE_PREFIXES: &[&str] = &["udpin:", "udpout:", "udpbcast:", "tcpin:", "tcpout:"];

/// Translate a connection address into a `mavlink::connect` address
///
/// # Examples
///
/// ```
/// use drone_dashboard::source::address::normalize_address;
///
/// assert_eq!(normalize_address("udp://:14540").unwrap(), "udpin:0.0.0.0:14540");
/// assert_eq!(normalize_address("tcp://10.0.0.2:5760").unwrap(), "tcpout:10.0.0.2:5760");
/// ```
pub fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim();

    if let Some(rest) = address.strip_prefix("udp://") {
        let (host, port) = split_host_port(address, rest)?;
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        return Ok(format!("udpin:{}:{}", host, port));
    }

    if let Some(rest) = address.strip_prefix("tcp://") {
        let (host, port) = split_host_port(address, rest)?;
        let host = if host.is_empty() { "127.0.0.1" } else { host };
        return Ok(format!("tcpout:{}:{}", host, port));
    }

    if let Some(rest) = address.strip_prefix("serial://") {
        return serial_address(address, rest);
    }

    if NATIVE_PREFIXES.iter().any(|prefix| address.starts_with(prefix)) {
        return Ok(address.to_string());
    }

    if let Some(rest) = address.strip_prefix("serial:") {
        return serial_address(address, rest);
    }

    Err(unsupported(address))
}

fn split_host_port<'a>(address: &str, rest: &'a str) -> Result<(&'a str, u16)> {
    let (host, port) = rest.rsplit_once(':').ok_or_else(|| unsupported(address))?;
    let port = port.parse::<u16>().map_err(|_| {
        DashboardError::Connection(format!("invalid port in connection address '{}'", address))
    })?;
    Ok((host, port))
}

fn serial_address(address: &str, rest: &str) -> Result<String> {
    let (device, baud) = match rest.rsplit_once(':') {
        Some((device, baud)) => {
            let baud = baud.parse::<u32>().map_err(|_| {
                DashboardError::Connection(format!("invalid baud rate in connection address '{}'", address))
            })?;
            (device, baud)
        }
        None => (rest, DEFAULT_SERIAL_BAUD),
    };

    if device.is_empty() {
        return Err(unsupported(address));
    }

    let device = if device.starts_with('/') {
        device.to_string()
    } else {
        format!("/{}", device)
    };
    Ok(format!("serial:{}:{}", device, baud))
}

fn unsupported(address: &str) -> DashboardError {
    DashboardError::Connection(format!("unsupported connection address '{}'", address))
}
