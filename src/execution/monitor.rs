use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{BalanceReader, PriceSource, SwapExecutor};
use crate::config::StrategyConfig;
use crate::error::{RetryError, StartupError};
use crate::execution::{RetryPolicy, SwapJournal};
use crate::models::{Action, Asset, AssetPair, EvaluationResult, Position, SwapRecord};
use crate::strategy::{initial_position, PositionStateMachine, ThresholdState, ThresholdTracker};

/// Confirmed swaps kept in memory; older ones only live in the swap log
pub const SWAP_HISTORY_LIMIT: usize = 64;

/// External collaborators the monitor talks to
#[derive(Clone)]
pub struct Providers {
    pub price: Arc<dyn PriceSource>,
    pub balances: Arc<dyn BalanceReader>,
    pub executor: Arc<dyn SwapExecutor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Cancelled,
}

/// Why a swap was not attempted even though the state machine asked for one
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    BalanceUnavailable(String),
    InsufficientBalance { balance: f64, reserve: f64 },
}

/// What happened in one evaluation cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    PriceUnavailable,
    NoAction(EvaluationResult),
    Skipped {
        evaluation: EvaluationResult,
        reason: SkipReason,
    },
    Swapped {
        evaluation: EvaluationResult,
        signature: String,
    },
    Failed {
        evaluation: EvaluationResult,
        attempts: u32,
    },
    Cancelled {
        evaluation: EvaluationResult,
    },
}

impl CycleOutcome {
    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        match self {
            CycleOutcome::PriceUnavailable => None,
            CycleOutcome::NoAction(evaluation) => Some(evaluation),
            CycleOutcome::Skipped { evaluation, .. }
            | CycleOutcome::Swapped { evaluation, .. }
            | CycleOutcome::Failed { evaluation, .. }
            | CycleOutcome::Cancelled { evaluation } => Some(evaluation),
        }
    }

    /// Action the state machine emitted this cycle, if a price was available
    pub fn action(&self) -> Option<Action> {
        self.evaluation().map(|e| e.action)
    }
}

/// Drives the periodic sample → threshold → decide → execute → commit loop.
///
/// Exactly one cycle runs at a time. `Position` and the threshold state are
/// owned here and only mutated from `run_cycle`.
pub struct PositionMonitor {
    config: StrategyConfig,
    pair: AssetPair,
    providers: Providers,
    tracker: ThresholdTracker,
    machine: PositionStateMachine,
    retry: RetryPolicy,
    journal: SwapJournal,
    state: MonitorState,
    swaps: VecDeque<SwapRecord>,
}

impl PositionMonitor {
    /// Build a monitor with a known starting position
    pub fn new(
        config: StrategyConfig,
        pair: AssetPair,
        providers: Providers,
        position: Position,
    ) -> Result<Self, StartupError> {
        config.validate()?;

        Ok(Self {
            tracker: ThresholdTracker::from_config(&config),
            machine: PositionStateMachine::new(position),
            retry: RetryPolicy::from_config(&config),
            journal: SwapJournal,
            state: MonitorState::Idle,
            swaps: VecDeque::new(),
            config,
            pair,
            providers,
        })
    }

    /// Build a monitor whose starting position comes from the wallet's real balances
    pub async fn bootstrap(
        config: StrategyConfig,
        pair: AssetPair,
        providers: Providers,
    ) -> Result<Self, StartupError> {
        config.validate()?;

        let balance_a = providers
            .balances
            .get_balance(&pair.a)
            .await
            .map_err(StartupError::InitialPosition)?;
        let balance_b = providers
            .balances
            .get_balance(&pair.b)
            .await
            .map_err(StartupError::InitialPosition)?;

        let position = initial_position(balance_b, config.materiality_threshold);
        tracing::info!(
            "Current balances: {:.4} {}, {:.2} {}",
            balance_a,
            pair.a.symbol,
            balance_b,
            pair.b.symbol
        );
        tracing::info!("Starting position: {}", position);

        Self::new(config, pair, providers, position)
    }

    pub fn position(&self) -> Position {
        self.machine.position()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn threshold_state(&self) -> ThresholdState {
        self.tracker.state()
    }

    /// Most recent confirmed swaps, oldest first, at most `SWAP_HISTORY_LIMIT`
    pub fn swaps(&self) -> &VecDeque<SwapRecord> {
        &self.swaps
    }

    /// Run cycles on a fixed timer until `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) {
        self.state = MonitorState::Running;

        if self.tracker.is_dynamic() {
            tracing::info!(
                "🚀 Starting price monitoring. Trailing stop from ${:.2} (gap ${:.2})",
                self.config.initial_threshold,
                self.config.threshold_trail_gap
            );
        } else {
            tracing::info!(
                "🚀 Starting price monitoring. Stop loss set at ${:.2}",
                self.config.initial_threshold
            );
        }

        // A slow cycle pushes the next tick back; cycles never overlap
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.run_cycle(&cancel).await;
            tracing::debug!(?outcome, "Cycle finished");

            if cancel.is_cancelled() {
                break;
            }
        }

        self.state = MonitorState::Cancelled;
        tracing::info!("👋 Monitor stopped (position: {})", self.position());
    }

    /// Threshold update + decision for one observed price. No I/O.
    pub fn evaluate(&mut self, price: f64) -> EvaluationResult {
        let effective_threshold = self.tracker.update(price);
        let position = self.machine.position();

        EvaluationResult {
            price,
            effective_threshold,
            position,
            action: self.machine.decide(price, effective_threshold),
        }
    }

    /// One full evaluation cycle. Never fails: every error is logged and
    /// reported through the outcome.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let price = match self.providers.price.get_price().await {
            Ok(price) if price.is_finite() && price >= 0.0 => price,
            Ok(price) => {
                tracing::warn!("Ignoring invalid price {}. Skipping this cycle.", price);
                return CycleOutcome::PriceUnavailable;
            }
            Err(e) => {
                tracing::warn!(
                    "Error getting {} price: {}. Skipping this cycle.",
                    self.pair.a.symbol,
                    e
                );
                return CycleOutcome::PriceUnavailable;
            }
        };

        let evaluation = self.evaluate(price);
        tracing::info!(
            "Current {} price: ${:.2}, Threshold: ${:.2}, Position: {}",
            self.pair.a.symbol,
            evaluation.price,
            evaluation.effective_threshold,
            evaluation.position
        );

        let (from, to) = match evaluation.action.legs(&self.pair) {
            Some((from, to)) => (from.clone(), to.clone()),
            None => return CycleOutcome::NoAction(evaluation),
        };

        if cancel.is_cancelled() {
            tracing::info!("Cancellation requested, not acting on {:?}", evaluation.action);
            return CycleOutcome::Cancelled { evaluation };
        }

        // A -> B keeps the reserve, B -> A sells everything
        let (reserve, slippage_bps) = match evaluation.action {
            Action::SwapAtoB => (self.config.minimum_reserve, self.config.slippage_bps_a_to_b),
            _ => (0.0, self.config.slippage_bps_b_to_a),
        };

        match evaluation.action {
            Action::SwapAtoB => tracing::info!(
                "Stop triggered at ${:.2}! Swapping {} to {}...",
                price,
                from.symbol,
                to.symbol
            ),
            _ => tracing::info!(
                "Buy back triggered at ${:.2}! Swapping {} to {}...",
                price,
                from.symbol,
                to.symbol
            ),
        }

        let balances = self.providers.balances.clone();
        let executor = self.providers.executor.clone();
        let journal = self.journal;
        let result = self
            .retry
            .run(cancel, |attempt| {
                let balances = balances.clone();
                let executor = executor.clone();
                let from = from.clone();
                let to = to.clone();
                async move {
                    // Re-read every attempt: an earlier attempt may have landed
                    // even though it reported failure.
                    let raw_amount = match spendable(balances.as_ref(), &from, reserve).await {
                        Ok(raw_amount) => raw_amount,
                        Err(reason) => return Ok(Attempt::Skipped(reason)),
                    };

                    tracing::info!(
                        "Swapping {:.6} {} to {} ({} raw, {} bps slippage)",
                        from.from_smallest_unit(raw_amount),
                        from.symbol,
                        to.symbol,
                        raw_amount,
                        slippage_bps
                    );
                    journal.attempt(attempt, &from, &to, raw_amount, slippage_bps);

                    match executor.swap(&from, &to, raw_amount, slippage_bps).await {
                        Ok(signature) => Ok(Attempt::Executed(journal.success(
                            attempt,
                            &from,
                            &to,
                            raw_amount,
                            slippage_bps,
                            &signature,
                        ))),
                        Err(e) => {
                            journal.failure(attempt, &from, &to, raw_amount, slippage_bps, &e);
                            Err(e)
                        }
                    }
                }
            })
            .await;

        match result {
            Ok(Attempt::Executed(record)) => {
                let position = self.machine.commit(evaluation.action);
                tracing::info!("✅ Successfully swapped to {} (now {})", to.symbol, position);
                let signature = record.tx_signature.clone();
                self.record_swap(record);
                CycleOutcome::Swapped {
                    evaluation,
                    signature,
                }
            }
            Ok(Attempt::Skipped(reason)) => {
                match &reason {
                    SkipReason::InsufficientBalance { balance, reserve } => tracing::info!(
                        "Not enough {} to swap (balance {:.6}, reserve {:.6}). Skipping.",
                        from.symbol,
                        balance,
                        reserve
                    ),
                    SkipReason::BalanceUnavailable(e) => tracing::warn!(
                        "Error getting {} balance: {}. Skipping this cycle.",
                        from.symbol,
                        e
                    ),
                }
                CycleOutcome::Skipped { evaluation, reason }
            }
            Err(RetryError::Cancelled { attempts }) => {
                tracing::info!(
                    "Swap abandoned after {} attempt(s): cancellation requested",
                    attempts
                );
                CycleOutcome::Cancelled { evaluation }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to swap {} to {}: {}. Position unchanged ({}).",
                    from.symbol,
                    to.symbol,
                    e,
                    self.position()
                );
                CycleOutcome::Failed {
                    evaluation,
                    attempts: e.attempts(),
                }
            }
        }
    }

    fn record_swap(&mut self, record: SwapRecord) {
        if self.swaps.len() == SWAP_HISTORY_LIMIT {
            self.swaps.pop_front();
        }
        self.swaps.push_back(record);
    }
}

/// Result of one attempt that did not fail in the executor
enum Attempt {
    Executed(SwapRecord),
    /// Precondition failed before the executor was called; stops retrying
    Skipped(SkipReason),
}

/// Raw amount of `asset` available to swap after keeping `reserve` back
async fn spendable(
    balances: &dyn BalanceReader,
    asset: &Asset,
    reserve: f64,
) -> Result<u64, SkipReason> {
    let balance = balances
        .get_balance(asset)
        .await
        .map_err(|e| SkipReason::BalanceUnavailable(e.to_string()))?;

    let raw_amount = asset.to_smallest_unit(balance - reserve);
    if raw_amount == 0 {
        return Err(SkipReason::InsufficientBalance { balance, reserve });
    }
    Ok(raw_amount)
}

/// Single entry point for the host: determine the starting position from
/// real balances, then run until cancelled. Only startup problems are
/// returned as errors.
pub async fn start(
    config: StrategyConfig,
    pair: AssetPair,
    providers: Providers,
    cancel: CancellationToken,
) -> Result<(), StartupError> {
    let mut monitor = PositionMonitor::bootstrap(config, pair, providers).await?;
    monitor.run(cancel).await;
    Ok(())
}
