//! Merkle-Patricia proof verification for `eth_getProof` responses.
//!
//! Both checks walk the proof from the root down, comparing each node's hash
//! with the reference held by its parent, and finally compare the leaf with
//! the RLP encoding of the claimed value. Nothing here touches the network.

use crate::{error::WithdrawalError, types::AccountProof};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_trie::{proof::verify_proof, Nibbles, TrieAccount};

/// Verify that `account` is stored under `address` in the state trie rooted at `state_root`.
pub fn verify_account_proof(
    state_root: B256,
    address: Address,
    account: &TrieAccount,
    proof: &[Bytes],
) -> Result<(), WithdrawalError> {
    let key = Nibbles::unpack(keccak256(address));
    let expected = alloy_rlp::encode(account);

    verify_proof(state_root, key, Some(expected), proof).map_err(|e| {
        WithdrawalError::ProofInvalid {
            field: "accountProof",
            reason: e.to_string(),
        }
    })
}

/// Verify that `slot` holds `value` in the storage trie rooted at `storage_root`.
///
/// A zero value is checked as an exclusion proof, matching how the EVM
/// deletes zeroed slots.
pub fn verify_storage_proof(
    storage_root: B256,
    slot: B256,
    value: U256,
    proof: &[Bytes],
) -> Result<(), WithdrawalError> {
    let key = Nibbles::unpack(keccak256(slot));
    let expected = (!value.is_zero()).then(|| alloy_rlp::encode(value));

    verify_proof(storage_root, key, expected, proof).map_err(|e| WithdrawalError::ProofInvalid {
        field: "storageProof",
        reason: e.to_string(),
    })
}

/// Verify a full `eth_getProof` response against a state root: the account
/// itself and every storage entry against the account's storage root.
pub fn verify_account_and_storage(
    state_root: B256,
    response: &AccountProof,
) -> Result<(), WithdrawalError> {
    let account = TrieAccount {
        nonce: response.nonce,
        balance: response.balance,
        storage_root: response.storage_hash,
        code_hash: response.code_hash,
    };
    verify_account_proof(state_root, response.address, &account, &response.account_proof)?;

    for entry in &response.storage_proof {
        verify_storage_proof(response.storage_hash, entry.key, entry.value, &entry.proof)?;
    }

    Ok(())
}
