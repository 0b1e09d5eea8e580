//! Configuration file support for a Meridian node.
//!
//! Loads optional `meridian.toml` from the data directory. If no config file
//! exists, defaults are used. The `[consensus]` section carries the
//! network-wide parameters every node must agree on; they are part of the
//! genesis agreement and must not differ between nodes.

use serde::Deserialize;
use std::path::Path;

/// Config file name looked up inside the data directory.
const CONFIG_FILE: &str = "meridian.toml";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("group threshold {threshold} out of range for group size {size}")]
    ThresholdOutOfRange { threshold: usize, size: usize },
    #[error("group size must be non-zero")]
    EmptyGroup,
}

/// Consensus parameters shared by every node in the network.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Members per signing group.
    pub group_size: usize,
    /// Shares required to recover a group signature.
    pub group_threshold: usize,
    /// Nominal round duration in milliseconds. Used by the wider system to
    /// pace block proposal; the beacon itself is event-driven.
    pub block_time_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            group_size: crate::constants::DEFAULT_GROUP_SIZE,
            group_threshold: crate::constants::DEFAULT_GROUP_THRESHOLD,
            block_time_ms: crate::constants::DEFAULT_BLOCK_TIME_MS,
        }
    }
}

impl ConsensusConfig {
    /// Check `1 <= group_threshold <= group_size`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_size == 0 {
            return Err(ConfigError::EmptyGroup);
        }
        if self.group_threshold == 0 || self.group_threshold > self.group_size {
            return Err(ConfigError::ThresholdOutOfRange {
                threshold: self.group_threshold,
                size: self.group_size,
            });
        }
        Ok(())
    }
}

/// Node configuration section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: String,
    /// Seed peer to bootstrap from. `None` for the first node of a network.
    pub seed_addr: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            listen_addr: format!("127.0.0.1:{}", crate::constants::DEFAULT_P2P_PORT),
            seed_addr: None,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MeridianConfig {
    pub node: NodeConfig,
    pub consensus: ConsensusConfig,
}

impl MeridianConfig {
    /// Load configuration from `meridian.toml` in the given directory.
    /// A missing file yields the defaults silently; an unreadable or
    /// malformed one yields the defaults with a warning.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        Self::parse_file(&path).unwrap_or_else(|err| {
            tracing::warn!(file = %path.display(), %err, "ignoring bad config file");
            Self::default()
        })
    }

    fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        tracing::info!(file = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_valid() {
        let config = MeridianConfig::default();
        assert_eq!(
            config.consensus.group_size,
            crate::constants::DEFAULT_GROUP_SIZE
        );
        assert!(config.consensus.validate().is_ok());
        assert!(config.node.seed_addr.is_none());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[node]
listen_addr = "0.0.0.0:11001"
seed_addr = "10.0.0.1:11001"

[consensus]
group_size = 5
group_threshold = 3
block_time_ms = 500
"#;
        let config: MeridianConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node.seed_addr.as_deref(), Some("10.0.0.1:11001"));
        assert_eq!(config.consensus.group_size, 5);
        assert_eq!(config.consensus.group_threshold, 3);
        assert_eq!(config.consensus.block_time_ms, 500);
        assert!(config.consensus.validate().is_ok());
    }

    #[test]
    fn missing_config_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = MeridianConfig::load(dir.path());
        assert_eq!(
            config.consensus.group_threshold,
            crate::constants::DEFAULT_GROUP_THRESHOLD
        );
    }

    #[test]
    fn threshold_bounds_rejected() {
        let mut config = ConsensusConfig::default();
        config.group_threshold = 0;
        assert!(config.validate().is_err());
        config.group_threshold = config.group_size + 1;
        assert!(config.validate().is_err());
        config.group_threshold = config.group_size;
        assert!(config.validate().is_ok());
    }
}
