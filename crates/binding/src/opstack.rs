//! OP Stack contract bindings.
//!
//! Includes contracts for L2→L1 withdrawals:
//! - L2ToL1MessagePasser (L2 predeploy)
//! - OptimismPortal2 (L1 contract)
//! - DisputeGameFactory (L1 contract)
//! - FaultDisputeGame (L1 game instances)
//! - L1StandardBridge (L1 contract, used to fund the bridge)

use alloy_primitives::{address, Address, B256};
use alloy_sol_types::sol;

/// L2ToL1MessagePasser predeploy address (same on all OP Stack chains).
pub const MESSAGE_PASSER_ADDRESS: Address = address!("4200000000000000000000000000000000000016");

/// Output root encoding version used by the current proof system.
pub const OUTPUT_VERSION_V0: B256 = B256::ZERO;

sol! {
    /// L2ToL1MessagePasser - L2 predeploy contract for initiating withdrawals
    /// Address: 0x4200000000000000000000000000000000000016 (on all OP Stack chains)
    #[sol(rpc)]
    interface IL2ToL1MessagePasser {
        /// Emitted when a withdrawal is initiated on L2
        event MessagePassed(
            uint256 indexed nonce,
            address indexed sender,
            address indexed target,
            uint256 value,
            uint256 gasLimit,
            bytes data,
            bytes32 withdrawalHash
        );

        /// Initiate a withdrawal from L2 to L1
        function initiateWithdrawal(
            address _target,
            uint256 _gasLimit,
            bytes calldata _data
        ) external payable;
    }

    /// OptimismPortal2 - Main L1 contract for withdrawal proving and finalization
    #[sol(rpc)]
    interface IOptimismPortal2 {
        /// Proven withdrawal data stored on L1
        #[derive(Debug)]
        struct ProvenWithdrawal {
            address disputeGameProxy;
            uint64 timestamp;
        }

        /// Emitted when a withdrawal is proven on L1
        event WithdrawalProven(
            bytes32 indexed withdrawalHash,
            address indexed from,
            address indexed to
        );

        /// Emitted alongside WithdrawalProven, keyed by the proof submitter
        event WithdrawalProvenExtension1(
            bytes32 indexed withdrawalHash,
            address indexed proofSubmitter
        );

        /// Emitted when a withdrawal is finalized on L1
        event WithdrawalFinalized(
            bytes32 indexed withdrawalHash,
            bool success
        );

        /// Address of the DisputeGameFactory the portal trusts
        function disputeGameFactory() external view returns (address);

        /// Query proven withdrawals by hash and proof submitter
        function provenWithdrawals(bytes32 withdrawalHash, address proofSubmitter)
            external view returns (ProvenWithdrawal memory);

        /// Query if a withdrawal has been finalized
        function finalizedWithdrawals(bytes32 withdrawalHash)
            external view returns (bool);

        /// Get the proof maturity delay (usually 7 days = 604800 seconds)
        function proofMaturityDelaySeconds()
            external view returns (uint256);

        /// Delay between a game resolving and its result being usable for finalization
        function disputeGameFinalityDelaySeconds()
            external view returns (uint256);

        /// Get the respected game type for filtering dispute games
        function respectedGameType()
            external view returns (uint32);

        /// Prove a withdrawal transaction (requires merkle proof)
        function proveWithdrawalTransaction(
            WithdrawalTransaction calldata _tx,
            uint256 _disputeGameIndex,
            OutputRootProof calldata _outputRootProof,
            bytes[] calldata _withdrawalProof
        ) external;

        /// Finalize a withdrawal proven by msg.sender
        function finalizeWithdrawalTransaction(
            WithdrawalTransaction calldata _tx
        ) external;

        /// Finalize a withdrawal transaction using external proof
        function finalizeWithdrawalTransactionExternalProof(
            WithdrawalTransaction calldata _tx,
            address _proofSubmitter
        ) external;
    }

    /// DisputeGameFactory - Used to find dispute games for proof generation
    #[sol(rpc)]
    interface IDisputeGameFactory {
        /// Dispute game search result
        #[derive(Debug)]
        struct GameSearchResult {
            uint256 index;
            bytes32 metadata;
            uint64 timestamp;
            bytes32 rootClaim;
            bytes extraData;
        }

        /// Get the total number of dispute games created
        function gameCount() external view returns (uint256 gameCount_);

        /// Find latest games of a given type, searching backwards from `_start`
        function findLatestGames(
            uint32 _gameType,
            uint256 _start,
            uint256 _n
        ) external view returns (GameSearchResult[] memory);
    }

    /// IFaultDisputeGame - Standard interface for fault dispute games
    #[sol(rpc)]
    interface IFaultDisputeGame {
        /// Emitted when the game is resolved
        event Resolved(uint8 indexed status);

        /// Get the game status
        function status() external view returns (uint8);

        /// Timestamp the game was resolved (zero while in progress)
        function resolvedAt() external view returns (uint64);

        /// Maximum time either side's chess clock may run
        function maxClockDuration() external view returns (uint64);

        /// Time accumulated on the challenger's clock for a claim
        function getChallengerDuration(uint256 _claimIndex) external view returns (uint64);

        /// Whether the subgame rooted at a claim has been resolved
        function resolvedSubgames(uint256 _claimIndex) external view returns (bool);

        /// Resolve the subgame rooted at a claim
        function resolveClaim(uint256 _claimIndex, uint256 _numToResolve) external;

        /// Resolve the game once the root subgame is resolved
        function resolve() external returns (uint8 status_);
    }

    /// L1StandardBridge - ETH deposits into the L2
    #[sol(rpc)]
    interface IL1StandardBridge {
        /// Deposit ETH to msg.sender on L2
        function depositETH(uint32 _minGasLimit, bytes calldata _extraData) external payable;
    }

    /// Output root proof structure (used in proving withdrawals)
    #[derive(Debug)]
    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    /// Withdrawal transaction structure (shared across contracts)
    #[derive(Debug, PartialEq, Eq)]
    struct WithdrawalTransaction {
        uint256 nonce;
        address sender;
        address target;
        uint256 value;
        uint256 gasLimit;
        bytes data;
    }
}
