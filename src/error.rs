use thiserror::Error;

/// Invalid or missing configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Price or balance lookup failure. Transient: the cycle is skipped.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("price for {0} not found in response")]
    PriceNotFound(String),

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// One failed swap attempt
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("quote failed: {0}")]
    Quote(#[source] ProviderError),

    #[error("failed to build swap transaction: {0}")]
    Build(#[source] ProviderError),

    #[error("failed to decode swap transaction: {0}")]
    Decode(String),

    #[error("failed to sign swap transaction: {0}")]
    Sign(String),

    #[error("failed to send transaction: {0}")]
    Send(String),

    #[error("transaction {signature} not confirmed after {polls} polls")]
    ConfirmationTimeout { signature: String, polls: u32 },

    #[error("transaction {signature} failed on-chain: {reason}")]
    OnChain { signature: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl SwapError {
    /// Whether retrying could plausibly help. Informational only: the retry
    /// wrapper retries every attempt failure the same way.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SwapError::Decode(_) | SwapError::Sign(_))
    }
}

/// Terminal result of the retry wrapper
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("swap failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: SwapError,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::ExhaustedRetries { attempts, .. } => *attempts,
            RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

/// Errors that stop the monitor before it ever runs
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to determine initial position: {0}")]
    InitialPosition(#[source] ProviderError),
}
