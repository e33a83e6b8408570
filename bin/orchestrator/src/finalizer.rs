//! Per-withdrawal finalization state machine.
//!
//! A [`Finalizer`] drives one withdrawal from "emitted on L2" to "finalized on
//! L1". Every phase re-reads chain state before acting, and every step is
//! permissionless, so a transaction that fails because another party already
//! performed the step counts as progress rather than an error.

use crate::metrics::Metrics;
use action::{
    finalize::{FinalizeAction, Readiness},
    prove::ProveAction,
    resolve::{ResolveClaimAction, ResolveGameAction, ROOT_CLAIM},
    Action, ActionError, IncludedTx, SubmitError, TxSubmitter,
};
use alloy_primitives::Address;
use config::{FinalizerTimings, PhaseTiming};
use std::{fmt, future::Future, time::Duration};
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};
use withdrawal::{
    state::query_withdrawal_status, GameLocator, GameStatus, L1Chain, L2Chain, WithdrawalError,
    WithdrawalEvent, WithdrawalHash, WithdrawalStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    AwaitingPublication,
    Proving,
    AwaitingResolvable,
    ResolvingClaim,
    ResolvingGame,
    Finalizing,
    Finalized,
    Failed,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingPublication => "awaiting_publication",
            Self::Proving => "proving",
            Self::AwaitingResolvable => "awaiting_resolvable",
            Self::ResolvingClaim => "resolving_claim",
            Self::ResolvingGame => "resolving_game",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }

    fn log_transition(self, event: &WithdrawalEvent, from: Self) {
        info!(withdrawal_hash = %event.hash, %from, to = %self, "Phase transition");
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// `receipt` is `None` when another party submitted the finalization.
    Finalized { receipt: Option<IncludedTx> },
}

#[derive(Debug, Error)]
#[error("withdrawal {withdrawal_hash} failed while {phase}: {cause}")]
pub struct FinalizeError {
    pub withdrawal_hash: WithdrawalHash,
    pub phase: Phase,
    #[source]
    pub cause: Cause,
}

#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Withdrawal(#[from] WithdrawalError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("chain read failed: {0:#}")]
    Read(eyre::Report),

    #[error("dispute game resolved as {status:?}")]
    GameLost { status: GameStatus },

    #[error("deadline exceeded after {attempts} attempts, last error: {last_error}")]
    DeadlineExceeded { attempts: u32, last_error: String },

    #[error("cancelled")]
    Cancelled,
}

impl Cause {
    /// Whether running the withdrawal again would fail the same way.
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::GameLost { .. } => true,
            Self::Withdrawal(e) => e.is_deterministic(),
            _ => false,
        }
    }
}

/// Result of one attempt within a phase.
enum Attempt<T> {
    Done(T),
    /// Not there yet or a transient failure; try again after the poll interval.
    Retry(String),
}

/// Resolves once `shutdown` reads `true`; never resolves if the sender is gone.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct Finalizer<L1, L2, S> {
    l1: L1,
    l2: L2,
    submitter: S,
    timings: FinalizerTimings,
    shutdown: watch::Receiver<bool>,
    metrics: Metrics,
}

impl<L1, L2, S> Finalizer<L1, L2, S>
where
    L1: L1Chain,
    L2: L2Chain,
    S: TxSubmitter,
{
    pub fn new(
        l1: L1,
        l2: L2,
        submitter: S,
        timings: FinalizerTimings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            l1,
            l2,
            submitter,
            timings,
            shutdown,
            metrics: Metrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drive `event` to finalization, resuming from whatever phase the chain
    /// state says it is in.
    pub async fn run(&self, event: &WithdrawalEvent) -> Result<Outcome, FinalizeError> {
        let phase = self
            .cancellable(&event.hash, Phase::AwaitingPublication, self.detect_phase(event))
            .await??;
        info!(withdrawal_hash = %event.hash, ?phase, "Starting finalizer");

        let result = self.drive(event, phase).await;
        if let Err(e) = &result {
            self.metrics.record_withdrawal_failed(e.phase.as_str());
            warn!(withdrawal_hash = %event.hash, phase = ?e.phase, cause = %e.cause, "Finalizer failed");
        }
        result
    }

    /// Current phase of `event` according to L1.
    pub async fn detect_phase(&self, event: &WithdrawalEvent) -> Result<Phase, FinalizeError> {
        let status = query_withdrawal_status(&self.l1, event.hash, self.submitter.sender())
            .await
            .map_err(|e| error(&event.hash, Phase::AwaitingPublication, Cause::Read(e)))?;

        let phase = match status {
            WithdrawalStatus::Finalized => Phase::Finalized,
            WithdrawalStatus::Initiated => Phase::AwaitingPublication,
            WithdrawalStatus::Proven {
                dispute_game_proxy, ..
            } => {
                let status = self
                    .l1
                    .status(dispute_game_proxy)
                    .await
                    .map_err(|e| error(&event.hash, Phase::AwaitingResolvable, Cause::Read(e)))?;
                match status {
                    GameStatus::InProgress => Phase::AwaitingResolvable,
                    GameStatus::DefenderWins => Phase::Finalizing,
                    GameStatus::ChallengerWins => Phase::Failed,
                }
            }
        };
        debug!(withdrawal_hash = %event.hash, ?phase, "Detected phase");
        Ok(phase)
    }

    async fn drive(
        &self,
        event: &WithdrawalEvent,
        mut phase: Phase,
    ) -> Result<Outcome, FinalizeError> {
        loop {
            let entered = Instant::now();
            let next = match phase {
                Phase::AwaitingPublication => {
                    self.await_publication(event).await?;
                    Phase::Proving
                }
                Phase::Proving => {
                    self.retry_phase(event, Phase::Proving, self.timings.proving, move || {
                        self.prove_once(event)
                    })
                    .await?;
                    Phase::AwaitingResolvable
                }
                Phase::AwaitingResolvable => {
                    self.retry_phase(
                        event,
                        Phase::AwaitingResolvable,
                        self.timings.resolvable,
                        move || self.check_resolvable(event),
                    )
                    .await?
                }
                Phase::ResolvingClaim => {
                    self.retry_phase(event, Phase::ResolvingClaim, self.timings.resolution, move || {
                        self.resolve_claim_once(event)
                    })
                    .await?;
                    Phase::ResolvingGame
                }
                Phase::ResolvingGame => {
                    self.retry_phase(event, Phase::ResolvingGame, self.timings.resolution, move || {
                        self.resolve_game_once(event)
                    })
                    .await?;
                    Phase::Finalizing
                }
                Phase::Finalizing => {
                    let receipt = self
                        .retry_phase(
                            event,
                            Phase::Finalizing,
                            self.timings.finalization,
                            move || self.finalize_once(event),
                        )
                        .await?;
                    Phase::Finalized.log_transition(event, phase);
                    self.metrics.record_phase_transition(
                        phase.as_str(),
                        Phase::Finalized.as_str(),
                        entered.elapsed(),
                    );
                    self.metrics
                        .record_withdrawal_finalized(event.transaction.value);
                    return Ok(Outcome::Finalized { receipt });
                }
                Phase::Finalized => {
                    info!(withdrawal_hash = %event.hash, "Withdrawal already finalized");
                    return Ok(Outcome::Finalized { receipt: None });
                }
                Phase::Failed => {
                    // a resolved game is first checked when finalizing
                    return Err(error(
                        &event.hash,
                        Phase::Finalizing,
                        Cause::GameLost {
                            status: GameStatus::ChallengerWins,
                        },
                    ));
                }
            };

            next.log_transition(event, phase);
            self.metrics
                .record_phase_transition(phase.as_str(), next.as_str(), entered.elapsed());
            phase = next;
        }
    }

    async fn await_publication(&self, event: &WithdrawalEvent) -> Result<(), FinalizeError> {
        let timing = self.timings.publication;
        let game = self
            .cancellable(
                &event.hash,
                Phase::AwaitingPublication,
                GameLocator::new(&self.l1).for_game_published(
                    event.l2_block,
                    timing.poll_interval(),
                    timing.timeout(),
                ),
            )
            .await?
            .map_err(|e| error(&event.hash, Phase::AwaitingPublication, e.into()))?;

        debug!(
            withdrawal_hash = %event.hash,
            game_index = %game.index,
            game_l2_block = game.l2_block,
            "Covering game published"
        );
        Ok(())
    }

    async fn prove_once(&self, event: &WithdrawalEvent) -> Result<Attempt<()>, Cause> {
        let action = ProveAction::new(&self.l1, &self.l2, &self.submitter, event.clone());
        match self.execute(&action).await? {
            Attempt::Done(Some(_)) => {
                self.metrics.record_withdrawal_proven();
                Ok(Attempt::Done(()))
            }
            Attempt::Done(None) => Ok(Attempt::Done(())),
            Attempt::Retry(reason) => Ok(Attempt::Retry(reason)),
        }
    }

    async fn check_resolvable(&self, event: &WithdrawalEvent) -> Result<Attempt<Phase>, Cause> {
        let game = match self.proven_game(event).await {
            Ok(game) => game,
            Err(reason) => return Ok(Attempt::Retry(reason)),
        };

        let checks = async {
            if self.l1.status(game).await?.is_resolved() {
                return eyre::Ok(Some(Phase::ResolvingGame));
            }
            if self.l1.claim_resolved(game, ROOT_CLAIM).await? {
                return Ok(Some(Phase::ResolvingGame));
            }
            if self.l1.claim_clock_expired(game, ROOT_CLAIM).await? {
                return Ok(Some(Phase::ResolvingClaim));
            }
            Ok(None)
        };

        Ok(match checks.await {
            Ok(Some(next)) => Attempt::Done(next),
            Ok(None) => Attempt::Retry(format!("root claim clock of {game} still running")),
            Err(e) => Attempt::Retry(format!("{e:#}")),
        })
    }

    async fn resolve_claim_once(&self, event: &WithdrawalEvent) -> Result<Attempt<()>, Cause> {
        let game = match self.proven_game(event).await {
            Ok(game) => game,
            Err(reason) => return Ok(Attempt::Retry(reason)),
        };

        let action = ResolveClaimAction::new(&self.l1, &self.submitter, game);
        match self.execute(&action).await? {
            Attempt::Done(_) => Ok(Attempt::Done(())),
            Attempt::Retry(reason) => Ok(Attempt::Retry(reason)),
        }
    }

    async fn resolve_game_once(&self, event: &WithdrawalEvent) -> Result<Attempt<()>, Cause> {
        let game = match self.proven_game(event).await {
            Ok(game) => game,
            Err(reason) => return Ok(Attempt::Retry(reason)),
        };

        let action = ResolveGameAction::new(&self.l1, &self.submitter, game);
        match action.is_ready().await {
            Ok(true) => {}
            Ok(false) => return Ok(Attempt::Retry(format!("root claim of {game} unresolved"))),
            Err(e) => return Ok(Attempt::Retry(format!("{e:#}"))),
        }

        let reverted = match action.execute().await {
            Ok(included) => {
                self.metrics.record_gas_spent(included.fee);
                None
            }
            Err(ActionError::AlreadyCompleted(_)) => None,
            Err(ActionError::Submit(e @ SubmitError::Reverted { .. })) => Some(e),
            Err(e) => return classify(e),
        };

        // whoever resolved it, only a defender win lets the withdrawal through
        let status = match self.l1.status(game).await {
            Ok(status) => status,
            Err(e) => return Ok(Attempt::Retry(format!("{e:#}"))),
        };
        match (status, reverted) {
            (GameStatus::DefenderWins, Some(_)) => {
                info!(withdrawal_hash = %event.hash, %game, "Game resolved by another party");
                Ok(Attempt::Done(()))
            }
            (GameStatus::DefenderWins, None) => Ok(Attempt::Done(())),
            (GameStatus::ChallengerWins, _) => Err(Cause::GameLost { status }),
            (GameStatus::InProgress, Some(e)) => Err(Cause::Submit(e)),
            (GameStatus::InProgress, None) => {
                Ok(Attempt::Retry(format!("game {game} still in progress")))
            }
        }
    }

    async fn finalize_once(
        &self,
        event: &WithdrawalEvent,
    ) -> Result<Attempt<Option<IncludedTx>>, Cause> {
        let action = FinalizeAction::new(
            &self.l1,
            &self.submitter,
            event.transaction.clone(),
            event.hash,
            self.submitter.sender(),
        );

        let readiness = match action.readiness().await {
            Ok(readiness) => readiness,
            Err(e) => return Ok(Attempt::Retry(format!("{e:#}"))),
        };
        match readiness {
            Readiness::Ready => self.execute(&action).await,
            Readiness::Finalized => Ok(Attempt::Done(None)),
            Readiness::GameLost(status) => Err(Cause::GameLost { status }),
            Readiness::Waiting(secs) => Ok(Attempt::Retry(format!("{secs}s until finalizable"))),
            other => Ok(Attempt::Retry(format!("{other:?}"))),
        }
    }

    /// Execute `action` and fold races and transient failures into [`Attempt`].
    ///
    /// A revert is followed by a re-read of the action's completion: if
    /// anyone completed it in the meantime the step is done.
    async fn execute<A: Action>(&self, action: &A) -> Result<Attempt<Option<IncludedTx>>, Cause> {
        let err = match action.execute().await {
            Ok(included) => {
                self.metrics.record_gas_spent(included.fee);
                return Ok(Attempt::Done(Some(included)));
            }
            Err(err) => err,
        };

        match err {
            ActionError::AlreadyCompleted(_) => Ok(Attempt::Done(None)),
            ActionError::Submit(e @ SubmitError::Reverted { .. }) => {
                if let Ok(true) = action.is_completed().await {
                    info!(action = %action.description(), "Completed by another party");
                    return Ok(Attempt::Done(None));
                }
                Ok(Attempt::Retry(e.to_string()))
            }
            other => classify(other),
        }
    }

    /// The game our proof points at. `Err` carries a retry reason.
    async fn proven_game(&self, event: &WithdrawalEvent) -> Result<Address, String> {
        match self
            .l1
            .proven_withdrawal(event.hash, self.submitter.sender())
            .await
        {
            Ok(Some(proven)) => Ok(proven.dispute_game_proxy),
            Ok(None) => Err("proof not visible on L1 yet".to_string()),
            Err(e) => Err(format!("{e:#}")),
        }
    }

    /// Repeat `attempt` every poll interval until it is done, fails fatally
    /// or the phase deadline passes.
    async fn retry_phase<T, F, Fut>(
        &self,
        event: &WithdrawalEvent,
        phase: Phase,
        timing: PhaseTiming,
        mut attempt: F,
    ) -> Result<T, FinalizeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, Cause>>,
    {
        let deadline = Instant::now() + timing.timeout();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let reason = match self.cancellable(&event.hash, phase, attempt()).await? {
                Ok(Attempt::Done(value)) => return Ok(value),
                Ok(Attempt::Retry(reason)) => reason,
                Err(cause) => return Err(error(&event.hash, phase, cause)),
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(error(
                    &event.hash,
                    phase,
                    Cause::DeadlineExceeded {
                        attempts,
                        last_error: reason,
                    },
                ));
            }

            debug!(withdrawal_hash = %event.hash, ?phase, attempts, %reason, "Retrying");
            let wait = timing.poll_interval().min(deadline - now);
            self.cancellable(&event.hash, phase, sleep(wait)).await?;
        }
    }

    /// Run `fut` unless shutdown is requested first.
    async fn cancellable<T>(
        &self,
        hash: &WithdrawalHash,
        phase: Phase,
        fut: impl Future<Output = T>,
    ) -> Result<T, FinalizeError> {
        tokio::select! {
            biased;
            _ = shutdown_requested(self.shutdown.clone()) => {
                info!(withdrawal_hash = %hash, ?phase, "Finalizer cancelled");
                Err(error(hash, phase, Cause::Cancelled))
            }
            out = fut => Ok(out),
        }
    }
}

/// Fatal or transient, for failures that are not races.
fn classify<T>(err: ActionError) -> Result<Attempt<T>, Cause> {
    match err {
        ActionError::AlreadyCompleted(what) => Ok(Attempt::Retry(format!("{what} already completed"))),
        ActionError::NotReady(reason) => Ok(Attempt::Retry(reason)),
        ActionError::Withdrawal(e) if e.is_deterministic() => Err(Cause::Withdrawal(e)),
        ActionError::Withdrawal(e) => Ok(Attempt::Retry(e.to_string())),
        ActionError::Submit(e) if e.is_revert() || e.is_transport() => Ok(Attempt::Retry(e.to_string())),
        ActionError::Submit(e) => Err(Cause::Submit(e)),
        ActionError::Read(e) => Ok(Attempt::Retry(format!("{e:#}"))),
    }
}

fn error(hash: &WithdrawalHash, phase: Phase, cause: Cause) -> FinalizeError {
    FinalizeError {
        withdrawal_hash: *hash,
        phase,
        cause,
    }
}

/// Wait helper used by the daemon between scans.
pub async fn sleep_or_shutdown(duration: Duration, shutdown: &watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = shutdown_requested(shutdown.clone()) => true,
        _ = sleep(duration) => false,
    }
}
