//! Ephemeral port allocation for sidecar listeners.

use std::net::TcpListener;

use crate::sidecar::error::{Result, SidecarError};

/// Ask the OS for a free loopback port.
///
/// The listener is dropped before returning so the sidecar can bind the port.
/// Another process may grab it in between; that window is accepted.
pub fn reserve() -> Result<u16> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|e| SidecarError::PortExhausted {
            reason: format!("failed to bind: {}", e),
        })?;

    let port = listener
        .local_addr()
        .map_err(|e| SidecarError::PortExhausted {
            reason: format!("failed to get local addr: {}", e),
        })?
        .port();

    drop(listener);
    Ok(port)
}

/// Reserve the API and admin ports for one sidecar.
pub fn reserve_pair() -> Result<(u16, u16)> {
    let port = reserve()?;
    let mut admin_port = reserve()?;
    if admin_port == port {
        admin_port = reserve()?;
    }
    if admin_port == port {
        return Err(SidecarError::PortExhausted {
            reason: format!("OS returned port {} twice", port),
        });
    }
    Ok((port, admin_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_returns_bindable_port() {
        let port = reserve().unwrap();
        assert_ne!(port, 0);
        // Released, so binding it again must succeed.
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }

    #[test]
    fn test_reserve_pair_is_distinct() {
        let (port, admin_port) = reserve_pair().unwrap();
        assert_ne!(port, admin_port);
    }
}
