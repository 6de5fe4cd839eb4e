pub mod jupiter;
pub mod solana;
pub mod swap;

pub use jupiter::{JupiterClient, JupiterPriceFeed, Quote};
pub use solana::SolanaClient;
pub use swap::JupiterSwapExecutor;

use async_trait::async_trait;

use crate::error::{ProviderError, SwapError};
use crate::models::Asset;

/// Current price of the tracked asset, in quote units
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self) -> Result<f64, ProviderError>;
}

/// Current holding of an asset, in its natural unit (SOL, not lamports)
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn get_balance(&self, asset: &Asset) -> Result<f64, ProviderError>;
}

/// Performs one trade. Not idempotent: an error does not guarantee that
/// nothing landed on-chain.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// `amount` is in the smallest unit of `from`. Returns the transaction signature.
    async fn swap(
        &self,
        from: &Asset,
        to: &Asset,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<String, SwapError>;
}
