//! Contract bindings for all external contracts.
//!
//! This crate consolidates the Solidity interfaces the finalizer talks to:
//! - OP Stack L2 predeploys (L2ToL1MessagePasser)
//! - OP Stack L1 contracts (OptimismPortal2, DisputeGameFactory, FaultDisputeGame,
//!   L1StandardBridge)
//!
//! All bindings are generated using alloy's `sol!` macro.

pub mod opstack;
