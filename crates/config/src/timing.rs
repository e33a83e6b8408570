//! Polling intervals and deadlines for each finalization phase.
//!
//! Proving, waiting for a game clock and waiting out the finality delays
//! operate on very different time scales, so every phase is tuned on its own.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    #[error("{phase}: poll interval must be non-zero")]
    ZeroInterval { phase: &'static str },

    #[error("{phase}: timeout ({timeout_secs}s) shorter than poll interval ({poll_interval_secs}s)")]
    TimeoutShorterThanInterval {
        phase: &'static str,
        poll_interval_secs: u64,
        timeout_secs: u64,
    },
}

/// How often a phase re-reads chain state and how long it may keep trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl PhaseTiming {
    pub const fn new(poll_interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            poll_interval_secs,
            timeout_secs,
        }
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self, phase: &'static str) -> Result<(), TimingError> {
        if self.poll_interval_secs == 0 {
            return Err(TimingError::ZeroInterval { phase });
        }
        if self.timeout_secs < self.poll_interval_secs {
            return Err(TimingError::TimeoutShorterThanInterval {
                phase,
                poll_interval_secs: self.poll_interval_secs,
                timeout_secs: self.timeout_secs,
            });
        }
        Ok(())
    }
}

/// Timing for every phase of the finalization state machine.
///
/// Defaults target mainnet: games are published roughly hourly, the game
/// clock runs 3.5 days and the proof maturity delay is 7 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizerTimings {
    /// Waiting for a game whose claimed block covers the withdrawal
    pub publication: PhaseTiming,
    /// Building and submitting the proof, including revert retries
    pub proving: PhaseTiming,
    /// Waiting for the root claim's clock to expire
    pub resolvable: PhaseTiming,
    /// Submitting resolveClaim and resolve
    pub resolution: PhaseTiming,
    /// Waiting out maturity/finality delays and submitting finalize
    pub finalization: PhaseTiming,
}

impl Default for FinalizerTimings {
    fn default() -> Self {
        Self {
            publication: PhaseTiming::new(60, 4 * 60 * 60),
            proving: PhaseTiming::new(12, 30 * 60),
            resolvable: PhaseTiming::new(5 * 60, 8 * 24 * 60 * 60),
            resolution: PhaseTiming::new(12, 30 * 60),
            finalization: PhaseTiming::new(5 * 60, 8 * 24 * 60 * 60),
        }
    }
}

impl FinalizerTimings {
    /// Tight timings for local devnets with short clocks and delays.
    pub const fn devnet() -> Self {
        Self {
            publication: PhaseTiming::new(1, 10 * 60),
            proving: PhaseTiming::new(1, 2 * 60),
            resolvable: PhaseTiming::new(1, 10 * 60),
            resolution: PhaseTiming::new(1, 2 * 60),
            finalization: PhaseTiming::new(1, 10 * 60),
        }
    }

    pub fn validate(&self) -> Result<(), TimingError> {
        self.publication.validate("publication")?;
        self.proving.validate("proving")?;
        self.resolvable.validate("resolvable")?;
        self.resolution.validate("resolution")?;
        self.finalization.validate("finalization")
    }
}
