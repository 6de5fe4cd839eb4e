use crate::error::ConfigError;
use crate::models::AssetPair;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "TRAILGUARD";

/// Trading parameters. Immutable once the monitor starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    /// Starting trigger price (and the floor the trailing stop never drops below)
    pub initial_threshold: f64,
    /// Distance the trigger trails behind the highest observed price
    pub threshold_trail_gap: f64,
    pub dynamic_enabled: bool,
    /// Amount of asset A never swapped away (keeps SOL for fees)
    pub minimum_reserve: f64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub check_interval_secs: u64,
    pub slippage_bps_a_to_b: u16,
    pub slippage_bps_b_to_a: u16,
    /// Asset B balance above which we consider ourselves "holding B" at startup
    pub materiality_threshold: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 130.0,
            threshold_trail_gap: 5.0,
            dynamic_enabled: true,
            minimum_reserve: 0.1,
            retry_attempts: 3,
            retry_delay_secs: 2,
            check_interval_secs: 2,
            slippage_bps_a_to_b: 50, // 0.5%
            slippage_bps_b_to_a: 50,
            materiality_threshold: 1.0,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_secs == 0 {
            return Err(ConfigError::invalid("check_interval_secs", "must be > 0"));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::invalid("retry_attempts", "must be >= 1"));
        }
        if !self.initial_threshold.is_finite() || self.initial_threshold <= 0.0 {
            return Err(ConfigError::invalid(
                "initial_threshold",
                format!("must be a positive number, got {}", self.initial_threshold),
            ));
        }
        non_negative("threshold_trail_gap", self.threshold_trail_gap)?;
        non_negative("minimum_reserve", self.minimum_reserve)?;
        non_negative("materiality_threshold", self.materiality_threshold)?;
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a finite number >= 0, got {}", value),
        ));
    }
    Ok(())
}

/// Endpoints and knobs for the external providers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub rpc_endpoint: String,
    pub price_api_url: String,
    pub swap_api_url: String,
    pub requests_per_minute: u32,
    pub confirmation_polls: u32,
    pub confirmation_poll_interval_ms: u64,
    pub http_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            price_api_url: "https://lite-api.jup.ag/price/v3".to_string(),
            swap_api_url: "https://lite-api.jup.ag/swap/v1".to_string(),
            requests_per_minute: 60,
            confirmation_polls: 20,
            confirmation_poll_interval_ms: 2000,
            http_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    /// Used when RUST_LOG is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            filter: "trailguard=info,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub pair: AssetPair,
    pub providers: ProviderConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load defaults, then the TOML file, then `TRAILGUARD_*` env vars.
    ///
    /// An explicitly given file must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (file, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: AppConfig = settings.try_deserialize()?;

        // Kept for compatibility with existing deployments
        if let Ok(rpc) = std::env::var("RPC_ENDPOINT") {
            if !rpc.is_empty() {
                cfg.providers.rpc_endpoint = rpc;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        if self.pair.a.mint_address == self.pair.b.mint_address {
            return Err(ConfigError::invalid("pair", "assets a and b must differ"));
        }
        if self.providers.requests_per_minute == 0 {
            return Err(ConfigError::invalid("requests_per_minute", "must be > 0"));
        }
        if self.providers.confirmation_polls == 0 {
            return Err(ConfigError::invalid("confirmation_polls", "must be > 0"));
        }
        Ok(())
    }

    /// Base58 wallet keypair. Only ever read from the environment.
    pub fn private_key() -> Result<String, ConfigError> {
        match std::env::var("PRIVATE_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ConfigError::MissingEnv("PRIVATE_KEY")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("trailguard-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        tokio_test::assert_ok!(cfg.validate());
        assert_eq!(cfg.strategy.initial_threshold, 130.0);
        assert_eq!(cfg.strategy.threshold_trail_gap, 5.0);
        assert_eq!(cfg.strategy.retry_attempts, 3);
        assert_eq!(cfg.pair.a.symbol, "SOL");
        assert_eq!(cfg.pair.b.symbol, "USDC");
    }

    #[test]
    fn test_zero_check_interval_rejected() {
        let strategy = StrategyConfig {
            check_interval_secs: 0,
            ..Default::default()
        };
        let err = strategy.validate().unwrap_err();
        assert!(err.to_string().contains("check_interval_secs"));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let strategy = StrategyConfig {
            retry_attempts: 0,
            ..Default::default()
        };
        tokio_test::assert_err!(strategy.validate());
    }

    #[test]
    fn test_negative_values_rejected() {
        let strategy = StrategyConfig {
            threshold_trail_gap: -1.0,
            ..Default::default()
        };
        assert!(strategy.validate().is_err());

        let strategy = StrategyConfig {
            minimum_reserve: f64::NAN,
            ..Default::default()
        };
        assert!(strategy.validate().is_err());

        let strategy = StrategyConfig {
            initial_threshold: 0.0,
            ..Default::default()
        };
        assert!(strategy.validate().is_err());
    }

    #[test]
    fn test_same_asset_pair_rejected() {
        let mut cfg = AppConfig::default();
        cfg.pair.b = cfg.pair.a.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = write_temp_config(
            r#"
[strategy]
initial_threshold = 142.5
dynamic_enabled = false
retry_attempts = 5

[logging]
log_dir = "/tmp/trailguard-logs"
"#,
        );

        let cfg = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.strategy.initial_threshold, 142.5);
        assert!(!cfg.strategy.dynamic_enabled);
        assert_eq!(cfg.strategy.retry_attempts, 5);
        // untouched fields keep their defaults
        assert_eq!(cfg.strategy.threshold_trail_gap, 5.0);
        assert_eq!(cfg.logging.log_dir, "/tmp/trailguard-logs");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = write_temp_config(
            r#"
[strategy]
check_interval_secs = 0
"#,
        );

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "check_interval_secs", .. }));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("trailguard-does-not-exist.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
