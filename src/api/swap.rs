use async_trait::async_trait;

use super::jupiter::JupiterClient;
use super::solana::SolanaClient;
use super::SwapExecutor;
use crate::error::SwapError;
use crate::models::Asset;

/// Executes swaps through Jupiter: quote, build, sign locally, send, confirm
#[derive(Clone)]
pub struct JupiterSwapExecutor {
    jupiter: JupiterClient,
    wallet: SolanaClient,
}

impl JupiterSwapExecutor {
    pub fn new(jupiter: JupiterClient, wallet: SolanaClient) -> Self {
        Self { jupiter, wallet }
    }
}

#[async_trait]
impl SwapExecutor for JupiterSwapExecutor {
    async fn swap(
        &self,
        from: &Asset,
        to: &Asset,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<String, SwapError> {
        let quote = self
            .jupiter
            .get_quote(&from.mint_address, &to.mint_address, amount, slippage_bps)
            .await
            .map_err(SwapError::Quote)?;

        if quote.price_impact_pct > 1.0 {
            tracing::warn!(
                "High price impact on {} -> {}: {:.2}%",
                from.symbol,
                to.symbol,
                quote.price_impact_pct
            );
        }

        let user = self.wallet.pubkey().to_string();
        let encoded = self
            .jupiter
            .get_swap_transaction(&user, &quote)
            .await
            .map_err(SwapError::Build)?;

        let tx = self.wallet.sign_transaction(&encoded)?;
        self.wallet.send_and_confirm(&tx).await
    }
}
