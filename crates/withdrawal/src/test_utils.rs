//! Trie fixtures: a message passer account holding a sent withdrawal,
//! embedded in a small state trie, with real proofs for both.

use crate::{
    hash::{compute_output_root, compute_storage_slot, compute_withdrawal_hash},
    types::{AccountProof, BlockRef, StorageProof, WithdrawalEvent},
};
use alloy_primitives::{keccak256, Address, Bytes, B256, KECCAK256_EMPTY, U256};
use alloy_trie::{proof::ProofRetainer, HashBuilder, Nibbles, TrieAccount, EMPTY_ROOT_HASH};
use binding::opstack::{
    OutputRootProof, WithdrawalTransaction, MESSAGE_PASSER_ADDRESS, OUTPUT_VERSION_V0,
};

/// A block whose state contains `withdrawal_hash` in `sentMessages`.
#[derive(Debug, Clone)]
pub struct MessagePasserFixture {
    pub block: BlockRef,
    pub proof: AccountProof,
    pub output_root: B256,
}

/// Build a trie from `(hashed key, rlp value)` leaves and return its root
/// together with the proof for `target`.
pub fn build_trie(mut leaves: Vec<(B256, Vec<u8>)>, target: B256) -> (B256, Vec<Bytes>) {
    leaves.sort_by_key(|(key, _)| *key);

    let mut builder =
        HashBuilder::default().with_proof_retainer(ProofRetainer::new(vec![Nibbles::unpack(target)]));
    for (key, value) in &leaves {
        builder.add_leaf(Nibbles::unpack(key), value);
    }

    let root = builder.root();
    let proof = builder
        .take_proof_nodes()
        .into_nodes_sorted()
        .into_iter()
        .map(|(_, node)| node)
        .collect();
    (root, proof)
}

pub fn message_passer_fixture(withdrawal_hash: B256, block_number: u64) -> MessagePasserFixture {
    let slot = compute_storage_slot(withdrawal_hash);

    // a handful of unrelated sent messages around ours
    let mut storage: Vec<(B256, Vec<u8>)> = (1u8..=6)
        .map(|i| {
            let mut other = withdrawal_hash.0;
            other[0] ^= i;
            let other = compute_storage_slot(B256::from(other));
            (keccak256(other), alloy_rlp::encode(U256::from(1)))
        })
        .collect();
    storage.push((keccak256(slot), alloy_rlp::encode(U256::from(1))));
    let (storage_root, storage_proof) = build_trie(storage, keccak256(slot));

    let passer = TrieAccount {
        nonce: 0,
        balance: U256::ZERO,
        storage_root,
        code_hash: keccak256(b"L2ToL1MessagePasser"),
    };
    let mut accounts: Vec<(B256, Vec<u8>)> = (1u8..=8)
        .map(|i| {
            let account = TrieAccount {
                nonce: u64::from(i),
                balance: U256::from(u64::from(i) * 1_000_000_000_000_000_000),
                storage_root: EMPTY_ROOT_HASH,
                code_hash: KECCAK256_EMPTY,
            };
            (keccak256(Address::repeat_byte(i)), alloy_rlp::encode(&account))
        })
        .collect();
    accounts.push((keccak256(MESSAGE_PASSER_ADDRESS), alloy_rlp::encode(&passer)));
    let (state_root, account_proof) = build_trie(accounts, keccak256(MESSAGE_PASSER_ADDRESS));

    let block = BlockRef {
        number: block_number,
        hash: keccak256(block_number.to_be_bytes()),
        state_root,
        timestamp: 1_700_000_000 + block_number,
    };
    let output_root = compute_output_root(&OutputRootProof {
        version: OUTPUT_VERSION_V0,
        stateRoot: state_root,
        messagePasserStorageRoot: storage_root,
        latestBlockhash: block.hash,
    });

    MessagePasserFixture {
        block,
        proof: AccountProof {
            address: MESSAGE_PASSER_ADDRESS,
            balance: passer.balance,
            nonce: passer.nonce,
            code_hash: passer.code_hash,
            storage_hash: storage_root,
            account_proof,
            storage_proof: vec![StorageProof {
                key: slot,
                value: U256::from(1),
                proof: storage_proof,
            }],
        },
        output_root,
    }
}

/// A 0.1 ETH withdrawal back to its own sender.
pub fn sample_withdrawal(nonce: u64) -> WithdrawalTransaction {
    let account = Address::repeat_byte(0x5c);
    WithdrawalTransaction {
        nonce: U256::from(nonce) | (U256::from(1) << 240),
        sender: account,
        target: account,
        value: U256::from(100_000_000_000_000_000u64),
        gasLimit: U256::from(100_000),
        data: Bytes::new(),
    }
}

pub fn sample_event(nonce: u64, l2_block: u64) -> WithdrawalEvent {
    let transaction = sample_withdrawal(nonce);
    WithdrawalEvent {
        hash: compute_withdrawal_hash(&transaction),
        transaction,
        l2_block,
    }
}
