use alloy_primitives::{Address, U256};
use config::{FinalizerTimings, NetworkConfig, NetworkConfigBuilder, NetworkType, TimingError};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid timings: {0}")]
    Timing(#[from] TimingError),

    #[error("{field} must not be zero")]
    Zero { field: &'static str },
}

/// Address overrides for forks and devnets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    pub portal: Option<Address>,
    pub standard_bridge: Option<Address>,
    pub l1_chain_id: Option<u64>,
    pub l2_chain_id: Option<u64>,
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// L1 RPC endpoint url
    pub l1_rpc_url: String,

    /// L2 RPC endpoint url
    pub l2_rpc_url: String,

    #[serde(default = "default_network")]
    pub network: NetworkType,

    #[serde(default)]
    pub overrides: Overrides,

    /// Account that proves and finalizes
    pub eoa_address: Address,

    /// Total wei the orchestrator may spend on gas; unlimited when absent
    #[serde(default)]
    pub gas_budget_wei: Option<U256>,

    /// How far back from the L2 head to look for withdrawals
    #[serde(default = "default_scan_lookback_blocks")]
    pub scan_lookback_blocks: u64,

    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Prometheus exporter port; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub timings: FinalizerTimings,
}

const fn default_network() -> NetworkType {
    NetworkType::Testnet
}

const fn default_scan_lookback_blocks() -> u64 {
    // a little over a week of 1s blocks
    700_000
}

const fn default_scan_interval_secs() -> u64 {
    300
}

const fn default_receipt_timeout_secs() -> u64 {
    300
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timings.validate()?;
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "scan_interval_secs",
            });
        }
        if self.receipt_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "receipt_timeout_secs",
            });
        }
        Ok(())
    }

    /// Network preset with any configured overrides applied.
    pub fn network_config(&self) -> NetworkConfig {
        let mut builder = NetworkConfigBuilder::new(self.network);
        if let Some(portal) = self.overrides.portal {
            builder = builder.portal(portal);
        }
        if let Some(bridge) = self.overrides.standard_bridge {
            builder = builder.standard_bridge(bridge);
        }
        let preset = NetworkConfig::from_network_type(self.network);
        builder
            .chain_ids(
                self.overrides.l1_chain_id.unwrap_or(preset.l1.chain_id),
                self.overrides.l2_chain_id.unwrap_or(preset.l2.chain_id),
            )
            .build()
    }

    pub const fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const MINIMAL: &str = r#"
        l1_rpc_url = "http://localhost:8545"
        l2_rpc_url = "http://localhost:9545"
        eoa_address = "0x5CFFA347b0aE99cc01E5c01714cA5658e54a23D1"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.network, NetworkType::Testnet);
        assert_eq!(config.gas_budget_wei, None);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.timings, FinalizerTimings::default());
        assert_eq!(config.network_config(), NetworkConfig::sepolia());
    }

    #[test]
    fn test_overrides_apply_to_network() {
        let toml = format!(
            r#"{MINIMAL}
            network = "mainnet"
            gas_budget_wei = "0x2386f26fc10000"

            [overrides]
            portal = "0x1111111111111111111111111111111111111111"
            l1_chain_id = 31337
            "#
        );
        let config = Config::from_toml(&toml).unwrap();
        let network = config.network_config();

        assert_eq!(network.l1.portal, address!("1111111111111111111111111111111111111111"));
        assert_eq!(network.l1.chain_id, 31337);
        assert_eq!(network.l2.chain_id, NetworkConfig::mainnet().l2.chain_id);
        assert_eq!(
            network.l1.standard_bridge,
            NetworkConfig::mainnet().l1.standard_bridge
        );
        assert_eq!(
            config.gas_budget_wei,
            Some(U256::from(10_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_partial_timings() {
        let toml = format!(
            r#"{MINIMAL}
            [timings.proving]
            poll_interval_secs = 2
            timeout_secs = 60
            "#
        );
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.timings.proving.poll_interval_secs, 2);
        assert_eq!(config.timings.publication, FinalizerTimings::default().publication);
    }

    #[test]
    fn test_invalid_timings_rejected() {
        let toml = format!(
            r#"{MINIMAL}
            [timings.resolution]
            poll_interval_secs = 0
            timeout_secs = 60
            "#
        );
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::Timing(_))
        ));
    }

    #[test]
    fn test_zero_scan_interval_rejected() {
        let toml = format!("{MINIMAL}\nscan_interval_secs = 0\n");
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::Zero { .. })
        ));
    }
}
