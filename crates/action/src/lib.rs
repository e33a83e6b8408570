pub mod deposit;
pub mod finalize;
pub mod prove;
pub mod resolve;
pub mod withdraw;

pub use client::{IncludedTx, SubmitError, TxCandidate, TxSubmitter};
use std::future::Future;
use thiserror::Error;
use withdrawal::WithdrawalError;

/// Trait for executable onchain actions.
pub trait Action: Send + Sync {
    /// Check to see if the action is ready to be executed.
    ///
    /// Returns true if all preconditions are met.
    fn is_ready(&self) -> impl Future<Output = eyre::Result<bool>> + Send;

    /// Check if the action has already been completed, by us or anyone else.
    fn is_completed(&self) -> impl Future<Output = eyre::Result<bool>> + Send;

    /// Execute the action and wait for its inclusion.
    fn execute(&self) -> impl Future<Output = Result<IncludedTx, ActionError>> + Send;

    /// Get a human-readable description of this action.
    fn description(&self) -> String;
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} already completed")]
    AlreadyCompleted(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error(transparent)]
    Withdrawal(#[from] WithdrawalError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// A chain read failed.
    #[error("read failed: {0:#}")]
    Read(#[from] eyre::Report),
}
