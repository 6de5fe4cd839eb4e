use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::BalanceReader;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, SwapError};
use crate::models::{Asset, SOL_MINT};

const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Wallet plus RPC access: balances, signing and submission
#[derive(Clone)]
pub struct SolanaClient {
    rpc: Arc<RpcClient>,
    keypair: Arc<Keypair>,
    confirmation_polls: u32,
    poll_interval: Duration,
}

impl SolanaClient {
    pub fn new(config: &ProviderConfig, private_key: &str) -> Result<Self, ProviderError> {
        let keypair = parse_keypair(private_key)?;
        let rpc = RpcClient::new_with_commitment(
            config.rpc_endpoint.clone(),
            CommitmentConfig::finalized(),
        );

        Ok(Self {
            rpc: Arc::new(rpc),
            keypair: Arc::new(keypair),
            confirmation_polls: config.confirmation_polls,
            poll_interval: Duration::from_millis(config.confirmation_poll_interval_ms),
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Native balance in lamports
    pub async fn lamports(&self) -> Result<u64, ProviderError> {
        self.rpc
            .get_balance(&self.pubkey())
            .await
            .map_err(|e| ProviderError::Rpc(format!("getBalance: {}", e)))
    }

    /// Balance of the wallet's associated token account for `mint`.
    /// A missing account reads as zero.
    pub async fn token_balance(&self, mint: &str) -> Result<f64, ProviderError> {
        let mint = parse_pubkey(mint)?;
        let ata = associated_token_address(&self.pubkey(), &mint)?;

        let account = self
            .rpc
            .get_account_with_commitment(&ata, self.rpc.commitment())
            .await
            .map_err(|e| ProviderError::Rpc(format!("getAccountInfo: {}", e)))?
            .value;
        if account.is_none() {
            tracing::debug!(%ata, "Token account not found, treating balance as zero");
            return Ok(0.0);
        }

        let balance = self
            .rpc
            .get_token_account_balance(&ata)
            .await
            .map_err(|e| ProviderError::Rpc(format!("getTokenAccountBalance: {}", e)))?;

        match balance.ui_amount {
            Some(amount) => Ok(amount),
            None => {
                let raw: u64 = balance.amount.parse().map_err(|_| {
                    ProviderError::Parse(format!("token amount: {}", balance.amount))
                })?;
                Ok(raw as f64 / 10f64.powi(i32::from(balance.decimals)))
            }
        }
    }

    /// Decode a base64 transaction from the swap API and sign it with the wallet key
    pub fn sign_transaction(&self, encoded: &str) -> Result<VersionedTransaction, SwapError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SwapError::Decode(format!("base64: {}", e)))?;
        let tx: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| SwapError::Decode(format!("transaction: {}", e)))?;

        VersionedTransaction::try_new(tx.message, &[self.keypair.as_ref()])
            .map_err(|e| SwapError::Sign(e.to_string()))
    }

    /// Submit and poll until the cluster reports the transaction confirmed
    pub async fn send_and_confirm(&self, tx: &VersionedTransaction) -> Result<String, SwapError> {
        let signature = self
            .rpc
            .send_transaction(tx)
            .await
            .map_err(|e| SwapError::Send(e.to_string()))?;
        tracing::info!(%signature, "Transaction sent, awaiting confirmation");

        self.await_confirmation(&signature).await?;
        Ok(signature.to_string())
    }

    async fn await_confirmation(&self, signature: &Signature) -> Result<(), SwapError> {
        for poll in 1..=self.confirmation_polls {
            tokio::time::sleep(self.poll_interval).await;

            let statuses = match self.rpc.get_signature_statuses(&[*signature]).await {
                Ok(response) => response.value,
                Err(e) => {
                    tracing::warn!(%signature, poll, "Status lookup failed: {}", e);
                    continue;
                }
            };

            if let Some(Some(status)) = statuses.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(SwapError::OnChain {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    });
                }
                if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                    tracing::debug!(%signature, poll, "Transaction confirmed");
                    return Ok(());
                }
            }
        }

        Err(SwapError::ConfirmationTimeout {
            signature: signature.to_string(),
            polls: self.confirmation_polls,
        })
    }
}

#[async_trait]
impl BalanceReader for SolanaClient {
    async fn get_balance(&self, asset: &Asset) -> Result<f64, ProviderError> {
        // Wrapped SOL is reported as the native balance
        if asset.mint_address == SOL_MINT {
            let lamports = self.lamports().await?;
            return Ok(asset.from_smallest_unit(lamports));
        }
        self.token_balance(&asset.mint_address).await
    }
}

/// Parse a base58 encoded 64-byte keypair
#[allow(deprecated)]
pub fn parse_keypair(encoded: &str) -> Result<Keypair, ProviderError> {
    // never echo the key itself in errors
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|_| ProviderError::Parse("private key is not valid base58".to_string()))?;
    Keypair::from_bytes(&bytes).map_err(|_| {
        ProviderError::Parse(format!("private key must be 64 bytes, got {}", bytes.len()))
    })
}

pub fn parse_pubkey(address: &str) -> Result<Pubkey, ProviderError> {
    Pubkey::from_str(address).map_err(|e| ProviderError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, ProviderError> {
    let token_program = parse_pubkey(TOKEN_PROGRAM_ID)?;
    let ata_program = parse_pubkey(ASSOCIATED_TOKEN_PROGRAM_ID)?;
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ata_program,
    );
    Ok(address)
}
