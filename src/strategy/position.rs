use crate::models::{Action, Position};

/// Pure transition function.
///
/// Holding A and the price falls below the threshold: get out into B.
/// Holding B and the price rises above it: buy back A.
/// Anything else (including price == threshold) is a no-op.
pub fn decide(position: Position, price: f64, threshold: f64) -> Action {
    match position {
        Position::HoldingA if price < threshold => Action::SwapAtoB,
        Position::HoldingB if price > threshold => Action::SwapBtoA,
        _ => Action::None,
    }
}

/// Starting position from real balances: B counts as held only above the
/// materiality threshold, so dust left over from a previous swap is ignored.
pub fn initial_position(balance_b: f64, materiality_threshold: f64) -> Position {
    if balance_b > materiality_threshold {
        Position::HoldingB
    } else {
        Position::HoldingA
    }
}

/// Tracks the held asset. The position only moves through `commit`, which
/// the monitor calls after a confirmed swap.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    position: Position,
}

impl PositionStateMachine {
    pub fn new(position: Position) -> Self {
        Self { position }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn decide(&self, price: f64, threshold: f64) -> Action {
        decide(self.position, price, threshold)
    }

    /// Apply a successfully executed action. Returns the new position.
    pub fn commit(&mut self, action: Action) -> Position {
        if let Some(next) = action.target_position() {
            tracing::info!(from = %self.position, to = %next, "Position committed");
            self.position = next;
        }
        self.position
    }
}
