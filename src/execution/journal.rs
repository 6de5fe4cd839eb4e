use chrono::Utc;
use std::fmt::Display;
use uuid::Uuid;

use crate::models::{Asset, SwapRecord};

/// Target that telemetry routes to the swap log file
pub const SWAP_LOG_TARGET: &str = "trailguard::swap";

/// Writes one line per swap attempt, success and failure to the swap log
#[derive(Debug, Clone, Copy, Default)]
pub struct SwapJournal;

impl SwapJournal {
    pub fn attempt(
        &self,
        attempt: u32,
        input: &Asset,
        output: &Asset,
        amount: u64,
        slippage_bps: u16,
    ) {
        tracing::info!(
            target: SWAP_LOG_TARGET,
            status = "ATTEMPT",
            attempt,
            input = %input.mint_address,
            output = %output.mint_address,
            amount,
            slippage_bps,
            "Swap initiated: {} -> {}",
            input.symbol,
            output.symbol
        );
    }

    pub fn success(
        &self,
        attempt: u32,
        input: &Asset,
        output: &Asset,
        amount: u64,
        slippage_bps: u16,
        signature: &str,
    ) -> SwapRecord {
        tracing::info!(
            target: SWAP_LOG_TARGET,
            status = "SUCCESS",
            attempt,
            input = %input.mint_address,
            output = %output.mint_address,
            amount,
            slippage_bps,
            signature,
            "Swap confirmed: {} -> {}",
            input.symbol,
            output.symbol
        );

        SwapRecord {
            id: Uuid::new_v4(),
            input_mint: input.mint_address.clone(),
            output_mint: output.mint_address.clone(),
            amount,
            slippage_bps,
            tx_signature: signature.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        &self,
        attempt: u32,
        input: &Asset,
        output: &Asset,
        amount: u64,
        slippage_bps: u16,
        error: &dyn Display,
    ) {
        tracing::error!(
            target: SWAP_LOG_TARGET,
            status = "FAILED",
            attempt,
            input = %input.mint_address,
            output = %output.mint_address,
            amount,
            slippage_bps,
            "Swap failed: {}",
            error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_builds_record() {
        let journal = SwapJournal;
        let record = journal.success(1, &Asset::sol(), &Asset::usdc(), 1_500_000_000, 50, "5sig");

        assert_eq!(record.input_mint, Asset::sol().mint_address);
        assert_eq!(record.output_mint, Asset::usdc().mint_address);
        assert_eq!(record.amount, 1_500_000_000);
        assert_eq!(record.slippage_bps, 50);
        assert_eq!(record.tx_signature, "5sig");
    }
}
