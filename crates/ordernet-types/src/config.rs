//! Node-level configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{OrdernetError, Result};

/// Passphrase used when none is configured.
pub const DEFAULT_PASSPHRASE: &str = "ordernet-default";

/// Directory under the user's home that holds the database.
pub const DATA_DIR_NAME: &str = ".ordernet";

/// Database file name.
pub const DB_FILE_NAME: &str = "ordernet.db";

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// Configuration for a single OrderNet node.
///
/// Constructed by the daemon from CLI flags and handed to the node
/// façade. All fields have working defaults; `validate()` catches the
/// combinations that cannot work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Nickname to use when no stored identity exists yet.
    pub nickname: Option<String>,
    /// Local TCP listen port. 0 picks an ephemeral port.
    pub listen_port: u16,
    /// Database path override. `None` resolves to
    /// `<home>/.ordernet/ordernet.db`.
    pub db_path: Option<PathBuf>,
    /// Bootstrap peers to dial at startup (multiaddr strings).
    pub bootstrap: Vec<String>,
    /// Enable LAN mDNS discovery. Off by default.
    pub enable_mdns: bool,
    /// Passphrase protecting the identity's private key at rest.
    /// `None` means [`DEFAULT_PASSPHRASE`].
    pub passphrase: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            nickname: None,
            listen_port: 0,
            db_path: None,
            bootstrap: Vec::new(),
            enable_mdns: false,
            passphrase: None,
        }
    }
}

impl NodeConfig {
    /// Returns the effective passphrase.
    pub fn effective_passphrase(&self) -> &str {
        self.passphrase.as_deref().unwrap_or(DEFAULT_PASSPHRASE)
    }

    /// Resolves the database path, falling back to the default
    /// location under the user's home directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let home = dirs_home().ok_or_else(|| OrdernetError::ConfigError {
            reason: "cannot determine home directory for default db path".into(),
        })?;
        Ok(home.join(DATA_DIR_NAME).join(DB_FILE_NAME))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(nick) = &self.nickname {
            if nick.trim().is_empty() {
                return Err(OrdernetError::ConfigError {
                    reason: "nickname must not be empty".into(),
                });
            }
        }
        if let Some(pass) = &self.passphrase {
            if pass.is_empty() {
                return Err(OrdernetError::ConfigError {
                    reason: "passphrase must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

/// Home directory lookup, split out so it stays in one place.
fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(NodeConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_nickname_rejected() {
        let config = NodeConfig {
            nickname: Some("   ".into()),
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_passphrase_rejected() {
        let config = NodeConfig {
            passphrase: Some(String::new()),
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_passphrase_falls_back_to_default() {
        let config = NodeConfig::default();
        assert_eq!(config.effective_passphrase(), DEFAULT_PASSPHRASE);

        let config = NodeConfig {
            passphrase: Some("hunter2".into()),
            ..NodeConfig::default()
        };
        assert_eq!(config.effective_passphrase(), "hunter2");
    }

    #[test]
    fn explicit_db_path_wins() -> crate::Result<()> {
        let config = NodeConfig {
            db_path: Some(PathBuf::from("/tmp/custom.db")),
            ..NodeConfig::default()
        };
        assert_eq!(config.resolved_db_path()?, PathBuf::from("/tmp/custom.db"));
        Ok(())
    }

    #[test]
    fn default_db_path_ends_with_expected_suffix() -> crate::Result<()> {
        let path = NodeConfig::default().resolved_db_path()?;
        assert!(path.ends_with(PathBuf::from(DATA_DIR_NAME).join(DB_FILE_NAME)));
        Ok(())
    }
}
