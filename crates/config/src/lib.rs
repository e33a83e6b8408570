//! Configuration types for the withdrawal finalizer.
//!
//! This crate provides:
//! - Network configurations (mainnet, testnet) with OP Stack contract addresses
//! - Per-phase polling intervals and deadlines for the finalization state machine

pub mod network;
pub mod timing;

pub use network::{L1Config, L2Config, NetworkConfig, NetworkConfigBuilder, NetworkType};
pub use timing::{FinalizerTimings, PhaseTiming, TimingError};
