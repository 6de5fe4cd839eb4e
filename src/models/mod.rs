use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// A token the agent can hold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub symbol: String,
    pub mint_address: String, // Solana mint address
    pub decimals: u8,
}

impl Asset {
    pub fn sol() -> Self {
        Self {
            symbol: "SOL".to_string(),
            mint_address: SOL_MINT.to_string(),
            decimals: 9,
        }
    }

    pub fn usdc() -> Self {
        Self {
            symbol: "USDC".to_string(),
            mint_address: USDC_MINT.to_string(),
            decimals: 6,
        }
    }

    /// Convert a human amount (e.g. 1.5 SOL) into raw units (lamports).
    /// Rounds down so we never ask for more than we hold, except for float
    /// noise around an exact raw amount (12.345678 * 1e6 = 12345677.9999...).
    pub fn to_smallest_unit(&self, amount: f64) -> u64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0;
        }
        let raw = amount * 10f64.powi(self.decimals as i32);
        let nearest = raw.round();
        if (raw - nearest).abs() < 1e-6 {
            nearest as u64
        } else {
            raw.floor() as u64
        }
    }

    pub fn from_smallest_unit(&self, raw: u64) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// The two assets the agent flips between.
/// `a` is the tracked asset (priced by the feed), `b` is the quote asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetPair {
    pub a: Asset,
    pub b: Asset,
}

impl Default for AssetPair {
    fn default() -> Self {
        Self {
            a: Asset::sol(),
            b: Asset::usdc(),
        }
    }
}

/// Which asset is currently held
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Position {
    HoldingA,
    HoldingB,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::HoldingA => write!(f, "HoldingA"),
            Position::HoldingB => write!(f, "HoldingB"),
        }
    }
}

/// Decision for one evaluation cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do this cycle
    None,
    SwapAtoB,
    SwapBtoA,
}

impl Action {
    /// Position we end up in if this action executes successfully
    pub fn target_position(&self) -> Option<Position> {
        match self {
            Action::None => None,
            Action::SwapAtoB => Some(Position::HoldingB),
            Action::SwapBtoA => Some(Position::HoldingA),
        }
    }

    /// (from, to) assets for a swap action
    pub fn legs<'a>(&self, pair: &'a AssetPair) -> Option<(&'a Asset, &'a Asset)> {
        match self {
            Action::None => None,
            Action::SwapAtoB => Some((&pair.a, &pair.b)),
            Action::SwapBtoA => Some((&pair.b, &pair.a)),
        }
    }
}

/// Transient per-cycle result, never persisted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationResult {
    pub price: f64,
    pub effective_threshold: f64,
    pub position: Position,
    pub action: Action,
}

/// Outcome of a confirmed swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: Uuid,
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
    pub tx_signature: String, // Solana transaction signature
    pub timestamp: DateTime<Utc>,
}
