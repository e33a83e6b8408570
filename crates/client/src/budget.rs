use alloy_primitives::{TxHash, U256};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// Debit rejected because the budget holds less than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gas budget overdraft: requested {requested} wei, available {available} wei")]
pub struct Overdraft {
    pub requested: U256,
    pub available: U256,
}

/// Process-wide gas allowance shared by every in-flight withdrawal.
///
/// Cloning yields another handle to the same balance. Debits reserve the
/// worst-case cost of a transaction before it is sent; the unused part is
/// credited back once the receipt is known. A transaction whose receipt
/// never arrived is held until [`GasBudget::settle`] sees it mined.
#[derive(Debug, Clone)]
pub struct GasBudget {
    remaining: Arc<Mutex<U256>>,
    held: Arc<Mutex<HashMap<TxHash, U256>>>,
}

impl GasBudget {
    pub fn new(amount: U256) -> Self {
        Self {
            remaining: Arc::new(Mutex::new(amount)),
            held: Arc::default(),
        }
    }

    /// A budget that never overdraws.
    pub fn unlimited() -> Self {
        Self::new(U256::MAX)
    }

    pub fn remaining(&self) -> U256 {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credit(&self, amount: U256) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_add(amount);
    }

    pub fn debit(&self, amount: U256) -> Result<(), Overdraft> {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining < amount {
            return Err(Overdraft {
                requested: amount,
                available: *remaining,
            });
        }
        *remaining -= amount;
        Ok(())
    }

    /// Keep `reserved` debited for a broadcast transaction with unknown fee.
    pub fn hold(&self, tx_hash: TxHash, reserved: U256) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tx_hash, reserved);
    }

    /// Transactions still waiting for a receipt.
    pub fn held(&self) -> Vec<TxHash> {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Release a held reservation once its fee is known. Returns false if
    /// nothing was held for `tx_hash`.
    pub fn settle(&self, tx_hash: TxHash, fee: U256) -> bool {
        let reserved = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tx_hash);
        match reserved {
            Some(reserved) => {
                self.credit(reserved.saturating_sub(fee));
                true
            }
            None => false,
        }
    }
}
