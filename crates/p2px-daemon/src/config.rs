//! Application configuration.
//!
//! Loaded from a TOML file and overlaid with `P2PX__SECTION__KEY`
//! environment variables, e.g. `P2PX__ESCROW__RPC_URL`.

use config::{Config, Environment, File, FileFormat};
use p2px_core::{TokenRegistry, TokenSpec};
use p2px_gateway::{OracleConfig, RpcLedgerConfig};
use p2px_jobs::{ExpiryConfig, SchedulerConfig};
use p2px_lifecycle::FeePolicy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub escrow: RpcLedgerConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub tokens: Vec<TokenSpec>,

    #[serde(default)]
    pub fees: FeePolicy,

    #[serde(default)]
    pub expiry: ExpiryConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load `path` (if present) plus environment overrides, then validate.
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            tracing::warn!(path = %path, "Config file not found, using defaults and environment");
        }
        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("P2PX")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.tokens.is_empty() {
            return Err(AppError::Config("at least one token must be configured".into()));
        }
        for token in &self.tokens {
            if token.code.trim().is_empty() || token.contract_address.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "token '{}' needs a code and a contract address",
                    token.code
                )));
            }
        }
        if self.escrow.contract_address.trim().is_empty() {
            return Err(AppError::Config("escrow.contract_address is required".into()));
        }
        if self.expiry.payment_window_secs == 0 || self.expiry.trade_window_secs == 0 {
            return Err(AppError::Config("expiry windows must be positive".into()));
        }
        if self.scheduler.reconcile_interval_secs == 0 || self.scheduler.sweep_interval_secs == 0 {
            return Err(AppError::Config("scheduler intervals must be positive".into()));
        }
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.fees.max_fee) || !unit.contains(&self.fees.fee_percent) {
            return Err(AppError::Config("fees must be fractions between 0 and 1".into()));
        }
        Ok(())
    }

    pub fn token_registry(&self) -> TokenRegistry {
        TokenRegistry::new(self.tokens.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [escrow]
        rpc_url = "https://rsk.example/rpc"
        contract_address = "0x00000000000000000000000000000000000000e5"

        [[tokens]]
        code = "USDT"
        contract_address = "0xdac17f958d2ee523a2206206994597c13d831ec7"
        decimals = 6
        usd_price = "1"

        [fees]
        max_fee = "0.003"

        [expiry]
        payment_window_secs = 600
    "#;

    #[test]
    fn test_parse_sample_applies_defaults() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.escrow.rpc_url, "https://rsk.example/rpc");
        assert_eq!(config.fees.max_fee, dec!(0.003));
        assert_eq!(config.fees.fee_percent, dec!(0.7));
        assert_eq!(config.expiry.payment_window_secs, 600);
        assert_eq!(config.expiry.trade_window_secs, 172_800);
        assert_eq!(config.scheduler.reconcile_interval_secs, 10);
        assert!(config.token_registry().get("usdt").is_ok());
    }

    #[test]
    fn test_default_config_fails_validation() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.expiry.trade_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.scheduler.sweep_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.fees.max_fee = dec!(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("payment_window_secs"));
        assert!(toml_str.contains("contract_address"));
    }

    #[test]
    fn test_load_missing_file_uses_environment_only() {
        let err = AppConfig::load("does/not/exist.toml").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
