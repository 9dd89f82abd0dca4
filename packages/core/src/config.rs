//! Harness Configuration
//!
//! Well-known addresses for the control and registry endpoints, plus the
//! timing knobs the lifecycle driver uses for readiness polling and shutdown.
//!
//! Ports can be overridden through environment variables so several harness
//! instances can coexist on one machine:
//!
//! - `HARNESS_CONTROL_PORT` - pinned-connection control endpoint (default 4710)
//! - `HARNESS_REGISTRY_PORT` - fixture registry endpoint (default 4711)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port for the pinned-connection control endpoint
pub const DEFAULT_CONTROL_PORT: u16 = 4710;

/// Default port for the fixture registry endpoint
pub const DEFAULT_REGISTRY_PORT: u16 = 4711;

/// Configuration for one harness run
///
/// Both the server side (which binds the endpoints) and the driver side
/// (which resolves them) are built from the same config, so the well-known
/// addresses only need to agree once.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Well-known address of the pinned-connection control endpoint
    pub control_addr: SocketAddr,

    /// Well-known address of the fixture registry endpoint
    pub registry_addr: SocketAddr,

    /// How long the driver polls for the server to accept connections
    pub readiness_timeout: Duration,

    /// Interval between readiness probes
    pub readiness_poll_interval: Duration,

    /// Grace period before the supervisor forcibly terminates the server
    pub shutdown_grace: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            control_addr: loopback(default_control_port()),
            registry_addr: loopback(default_registry_port()),
            readiness_timeout: Duration::from_secs(10),
            readiness_poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl HarnessConfig {
    /// Config with both endpoints on the given loopback ports
    ///
    /// Useful in tests where fixed default ports would collide across
    /// concurrently running suites.
    pub fn on_ports(control_port: u16, registry_port: u16) -> Self {
        Self {
            control_addr: loopback(control_port),
            registry_addr: loopback(registry_port),
            ..Self::default()
        }
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Get the control endpoint port from `HARNESS_CONTROL_PORT` or the default
///
/// Standalone function (not a method) so callers don't need a config instance
/// just to learn the port.
pub fn default_control_port() -> u16 {
    std::env::var("HARNESS_CONTROL_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_CONTROL_PORT)
}

/// Get the registry endpoint port from `HARNESS_REGISTRY_PORT` or the default
pub fn default_registry_port() -> u16 {
    std::env::var("HARNESS_REGISTRY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_REGISTRY_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_loopback() {
        let config = HarnessConfig::default();
        assert!(config.control_addr.ip().is_loopback());
        assert!(config.registry_addr.ip().is_loopback());
        assert_ne!(config.control_addr.port(), config.registry_addr.port());
    }

    #[test]
    fn test_on_ports_overrides_defaults() {
        let config = HarnessConfig::on_ports(15000, 15001);
        assert_eq!(config.control_addr.port(), 15000);
        assert_eq!(config.registry_addr.port(), 15001);
    }
}
