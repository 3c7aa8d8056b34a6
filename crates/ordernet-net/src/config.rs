//! Network-level configuration.

use ordernet_types::{OrdernetError, Result};

/// Maximum allowed gossip message size (64 KiB).
pub const MAX_GOSSIP_SIZE: usize = 65_536;

// ---------------------------------------------------------------------------
// NetConfig
// ---------------------------------------------------------------------------

/// Configuration of the transport adapter.
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// Local TCP listen port. 0 picks an ephemeral port.
    pub listen_port: u16,
    /// Enable mDNS LAN discovery.
    pub enable_mdns: bool,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            listen_port: 0,
            enable_mdns: false,
            idle_timeout_secs: 60,
        }
    }
}

impl NetConfig {
    /// Returns the listen multiaddr for the configured port.
    pub fn listen_addr(&self) -> String {
        format!("/ip4/0.0.0.0/tcp/{}", self.listen_port)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            return Err(OrdernetError::ConfigError {
                reason: "idle timeout must be at least 1 second".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(NetConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_rejected() {
        let config = NetConfig {
            idle_timeout_secs: 0,
            ..NetConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn listen_addr_includes_port() {
        let config = NetConfig {
            listen_port: 9000,
            ..NetConfig::default()
        };
        assert_eq!(config.listen_addr(), "/ip4/0.0.0.0/tcp/9000");
    }
}
