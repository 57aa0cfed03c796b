//! Environment-driven configuration for the lending ledger
use super::loan::RepaymentAccounting;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct LendingConfig {
    /// sled database directory
    pub db_path: PathBuf,
    /// Only callers from this organisation may read loan history
    pub regulator_org: String,
    pub repayment_accounting: RepaymentAccounting,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
    /// Identity the command-line client presents
    pub caller_org: String,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("lending.db"),
            regulator_org: "RBI".to_string(),
            repayment_accounting: RepaymentAccounting::default(),
            log_level: "info".to_string(),
            caller_org: "RBI".to_string(),
        }
    }
}

impl LendingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("LENDING_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(org) = lookup("LENDING_REGULATOR_ORG") {
            if org.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: "LENDING_REGULATOR_ORG",
                    reason: "cannot be empty".into(),
                });
            }
            config.regulator_org = org;
        }
        if let Some(accounting) = lookup("LENDING_REPAYMENT_ACCOUNTING") {
            config.repayment_accounting =
                accounting
                    .parse()
                    .map_err(|reason| ConfigError::InvalidValue {
                        var: "LENDING_REPAYMENT_ACCOUNTING",
                        reason,
                    })?;
        }
        if let Some(level) = lookup("LENDING_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(org) = lookup("LENDING_CALLER_ORG") {
            config.caller_org = org;
        }

        Ok(config)
    }
}
