//! Network configuration for withdrawals.
//!
//! Provides chain-specific addresses and parameters for different networks
//! (mainnet, testnet, etc.).

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Network type (mainnet or testnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

/// Settlement layer (L1) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Config {
    /// Chain ID
    pub chain_id: u64,
    /// OptimismPortal2 proxy address
    pub portal: Address,
    /// L1StandardBridge proxy address
    pub standard_bridge: Address,
    /// Block time in seconds (12 for Ethereum mainnet)
    pub block_time_secs: u64,
}

impl L1Config {
    /// Ethereum mainnet, Unichain contracts.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 1,
            // https://etherscan.io/address/0x0bd48f6B86a26D3a217d0Fa6FfE2B491B956A7a2
            portal: address!("0x0bd48f6B86a26D3a217d0Fa6FfE2B491B956A7a2"),
            standard_bridge: address!("0x81014F44b0a345033bB2b3B21C7a1A308B35fEeA"),
            block_time_secs: 12,
        }
    }

    /// Ethereum Sepolia, Unichain Sepolia contracts.
    pub const fn sepolia() -> Self {
        Self {
            chain_id: 11155111,
            // https://sepolia.etherscan.io/address/0x0d83dab629f0e0F9d36c0Cbc89B69a489f0751bD
            portal: address!("0x0d83dab629f0e0F9d36c0Cbc89B69a489f0751bD"),
            standard_bridge: address!("0xea58fcA6849d79EAd1f26608855c2D6407d54Ce2"),
            block_time_secs: 12,
        }
    }
}

/// Withdrawal origin (L2) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Config {
    /// Chain ID
    pub chain_id: u64,
    /// L2ToL1MessagePasser predeploy
    pub message_passer: Address,
    /// Block time in seconds (1 for Unichain)
    pub block_time_secs: u64,
}

impl L2Config {
    /// Unichain mainnet configuration.
    pub const fn mainnet() -> Self {
        Self {
            chain_id: 130,
            message_passer: address!("0x4200000000000000000000000000000000000016"),
            block_time_secs: 1,
        }
    }

    /// Unichain Sepolia testnet configuration.
    pub const fn sepolia() -> Self {
        Self {
            chain_id: 1301,
            message_passer: address!("0x4200000000000000000000000000000000000016"),
            block_time_secs: 1,
        }
    }
}

/// Complete network configuration for a settlement/origin chain pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network type (mainnet or testnet)
    pub network_type: NetworkType,
    /// Settlement layer configuration
    pub l1: L1Config,
    /// Origin layer configuration
    pub l2: L2Config,
}

impl NetworkConfig {
    /// Create mainnet configuration.
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            l1: L1Config::mainnet(),
            l2: L2Config::mainnet(),
        }
    }

    /// Create testnet (Sepolia) configuration.
    pub const fn sepolia() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            l1: L1Config::sepolia(),
            l2: L2Config::sepolia(),
        }
    }

    /// Create configuration from network type.
    pub const fn from_network_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::sepolia(),
        }
    }
}

/// Builder for custom network configurations (devnets, forks).
#[derive(Debug, Clone)]
pub struct NetworkConfigBuilder {
    config: NetworkConfig,
}

impl NetworkConfigBuilder {
    /// Start from the defaults of a network type.
    pub const fn new(network_type: NetworkType) -> Self {
        Self {
            config: NetworkConfig::from_network_type(network_type),
        }
    }

    /// Start with mainnet defaults.
    pub const fn mainnet() -> Self {
        Self::new(NetworkType::Mainnet)
    }

    /// Start with testnet defaults.
    pub const fn testnet() -> Self {
        Self::new(NetworkType::Testnet)
    }

    /// Override the OptimismPortal2 address.
    pub const fn portal(mut self, address: Address) -> Self {
        self.config.l1.portal = address;
        self
    }

    /// Override the L1StandardBridge address.
    pub const fn standard_bridge(mut self, address: Address) -> Self {
        self.config.l1.standard_bridge = address;
        self
    }

    /// Override both chain ids.
    pub const fn chain_ids(mut self, l1: u64, l2: u64) -> Self {
        self.config.l1.chain_id = l1;
        self.config.l2.chain_id = l2;
        self
    }

    /// Build the network configuration.
    pub const fn build(self) -> NetworkConfig {
        self.config
    }
}
