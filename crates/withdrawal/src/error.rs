use alloy_primitives::{B256, U256};
use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum WithdrawalError {
    /// A trie proof did not verify against its root.
    #[error("invalid proof ({field}): {reason}")]
    ProofInvalid { field: &'static str, reason: String },

    /// The recomputed withdrawal hash differs from the one the event carried.
    #[error("withdrawal hash mismatch: computed {computed}, emitted {emitted}")]
    HashMismatch { computed: B256, emitted: B256 },

    /// The proof response does not have the expected shape.
    #[error("malformed proof response: {reason}")]
    MalformedProof { reason: String },

    /// The output root built from the L2 block differs from the game's claim.
    #[error("output root mismatch: computed {computed}, game claims {claimed}")]
    OutputRootMismatch { computed: B256, claimed: B256 },

    #[error("malformed dispute game {index}: {reason}")]
    MalformedGame { index: U256, reason: String },

    #[error("no dispute games exist")]
    NoGames,

    #[error("no dispute games of type {game_type} found")]
    NoGameFound { game_type: u32 },

    #[error("timed out after {waited:?} waiting for a game covering L2 block {target} (latest seen: {last_seen:?})")]
    Timeout {
        target: u64,
        last_seen: Option<u64>,
        waited: Duration,
    },

    #[error("rpc error: {0}")]
    Rpc(#[source] BoxError),
}

impl WithdrawalError {
    /// Errors caused by the inputs themselves; retrying cannot help.
    pub const fn is_deterministic(&self) -> bool {
        matches!(
            self,
            Self::ProofInvalid { .. }
                | Self::HashMismatch { .. }
                | Self::MalformedProof { .. }
                | Self::OutputRootMismatch { .. }
                | Self::MalformedGame { .. }
        )
    }
}

impl From<eyre::Report> for WithdrawalError {
    fn from(err: eyre::Report) -> Self {
        Self::Rpc(err.into())
    }
}
