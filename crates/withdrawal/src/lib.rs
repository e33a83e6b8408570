pub mod chain;
pub mod error;
pub mod game;
pub mod hash;
pub mod params;
pub mod rpc;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod verify;

pub use chain::{DisputeGame, GameFactory, L1Chain, L1Clock, L2Chain, Portal};
pub use error::WithdrawalError;
pub use game::GameLocator;
pub use params::WithdrawalParamBuilder;
pub use rpc::{RpcL1, RpcL2};
pub use types::*;
