use crate::{error::WithdrawalError, types::WithdrawalHash};
use alloy_primitives::{keccak256, B256};
use alloy_sol_types::SolValue;
use binding::opstack::{OutputRootProof, WithdrawalTransaction};

pub fn compute_withdrawal_hash(tx: &WithdrawalTransaction) -> WithdrawalHash {
    // Solidity's Hashing.hashWithdrawal uses:
    // keccak256(abi.encode(_tx.nonce, _tx.sender, _tx.target, _tx.value, _tx.gasLimit, _tx.data))
    // We need to use abi_encode_sequence to encode the fields directly without a wrapper offset
    let encoded = (
        &tx.nonce,
        &tx.sender,
        &tx.target,
        &tx.value,
        &tx.gasLimit,
        &tx.data,
    )
        .abi_encode_sequence();

    keccak256(encoded)
}

/// Recompute the hash of `tx` and require it to equal the hash the event emitted.
pub fn verify_withdrawal_hash(
    tx: &WithdrawalTransaction,
    emitted: WithdrawalHash,
) -> Result<WithdrawalHash, WithdrawalError> {
    let computed = compute_withdrawal_hash(tx);
    if computed != emitted {
        return Err(WithdrawalError::HashMismatch { computed, emitted });
    }
    Ok(computed)
}

/// Compute the storage slot for a withdrawal hash in the L2ToL1MessagePasser contract.
///
/// The storage layout is: `mapping(bytes32 => bool) public sentMessages`
/// Solidity storage slot = keccak256(key || slot_index)
/// For our mapping at slot 0: keccak256(withdrawalHash || 0)
pub fn compute_storage_slot(withdrawal_hash: B256) -> B256 {
    let mut data = [0u8; 64];
    data[0..32].copy_from_slice(withdrawal_hash.as_slice());
    keccak256(data)
}

/// keccak256(version || stateRoot || messagePasserStorageRoot || latestBlockhash)
pub fn compute_output_root(proof: &OutputRootProof) -> B256 {
    let mut data = [0u8; 128];
    data[0..32].copy_from_slice(proof.version.as_slice());
    data[32..64].copy_from_slice(proof.stateRoot.as_slice());
    data[64..96].copy_from_slice(proof.messagePasserStorageRoot.as_slice());
    data[96..128].copy_from_slice(proof.latestBlockhash.as_slice());
    keccak256(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, Bytes, U256};

    fn base_tx() -> WithdrawalTransaction {
        WithdrawalTransaction {
            nonce: U256::from(100),
            sender: Address::from([0x01; 20]),
            target: Address::from([0x02; 20]),
            value: U256::from(1_000_000),
            gasLimit: U256::from(100_000),
            data: Bytes::new(),
        }
    }

    #[test]
    fn test_compute_withdrawal_hash_deterministic() {
        let tx = WithdrawalTransaction {
            data: Bytes::from(vec![0xaa, 0xbb, 0xcc]),
            ..base_tx()
        };

        let hash1 = compute_withdrawal_hash(&tx);
        let hash2 = compute_withdrawal_hash(&tx.clone());

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, B256::ZERO);
    }

    #[test]
    fn test_compute_withdrawal_hash_known_value() {
        // Real withdrawal from Unichain Mainnet
        // TX: 0x91b374b5403401198a892f62db8843b60125cfb3e28ec1664089d9158424dc4a
        // Block: 23969114
        let tx = WithdrawalTransaction {
            nonce: U256::from_be_bytes(hex!(
                "0001000000000000000000000000000000000000000000000000000000000818"
            )),
            sender: Address::from_slice(&hex!("000040D6c85A13a1AA74565FDe87e499dC023C6f")),
            target: Address::from_slice(&hex!("B03eEF386A61b5b462051636001485FFfdD3d843")),
            value: U256::ZERO,
            gasLimit: U256::from(200_000),
            data: Bytes::from(hex!(
                "095ea7b3000000000000000000000000000040d6c85a13a1aa74565fde87e499dc023c6fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
            )),
        };

        // Expected hash from the MessagePassed event on chain
        let expected = B256::from_slice(&hex!(
            "49c43b60ec99e99046b54aec4c90419ff194300e567de63423c3b974ae46bd28"
        ));

        assert_eq!(compute_withdrawal_hash(&tx), expected);
        assert_eq!(verify_withdrawal_hash(&tx, expected).unwrap(), expected);
    }

    #[test]
    fn test_every_field_changes_hash() {
        let base = compute_withdrawal_hash(&base_tx());

        let variants = [
            WithdrawalTransaction {
                nonce: U256::from(101),
                ..base_tx()
            },
            WithdrawalTransaction {
                sender: Address::from([0x03; 20]),
                ..base_tx()
            },
            WithdrawalTransaction {
                target: Address::from([0x04; 20]),
                ..base_tx()
            },
            WithdrawalTransaction {
                value: U256::from(1_000_001),
                ..base_tx()
            },
            WithdrawalTransaction {
                gasLimit: U256::from(100_001),
                ..base_tx()
            },
            WithdrawalTransaction {
                data: Bytes::from(vec![0x00]),
                ..base_tx()
            },
        ];

        let mut hashes = std::collections::HashSet::from([base]);
        for tx in &variants {
            assert!(hashes.insert(compute_withdrawal_hash(tx)), "collision for {tx:?}");
        }
    }

    #[test]
    fn test_hash_mismatch_reports_both_hashes() {
        let tx = base_tx();
        let emitted = B256::repeat_byte(0x42);

        match verify_withdrawal_hash(&tx, emitted) {
            Err(WithdrawalError::HashMismatch {
                computed,
                emitted: reported,
            }) => {
                assert_eq!(computed, compute_withdrawal_hash(&tx));
                assert_eq!(reported, emitted);
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_storage_slot_format() {
        // keccak256(withdrawalHash || 0x00...00)
        let slot = compute_storage_slot(B256::ZERO);
        assert_eq!(slot, keccak256([0u8; 64]));

        let other = compute_storage_slot(B256::from([1u8; 32]));
        assert_ne!(slot, other);
        assert_eq!(other, compute_storage_slot(B256::from([1u8; 32])));
    }

    #[test]
    fn test_output_root_layout() {
        let proof = OutputRootProof {
            version: B256::ZERO,
            stateRoot: B256::repeat_byte(0x11),
            messagePasserStorageRoot: B256::repeat_byte(0x22),
            latestBlockhash: B256::repeat_byte(0x33),
        };

        let mut preimage = vec![0u8; 32];
        preimage.extend_from_slice(&[0x11; 32]);
        preimage.extend_from_slice(&[0x22; 32]);
        preimage.extend_from_slice(&[0x33; 32]);
        let expected = keccak256(&preimage);
        assert_eq!(compute_output_root(&proof), expected);
    }
}
