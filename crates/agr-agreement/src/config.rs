//! # Engine Configuration
//!
//! YAML description of an engine instance: the title and content of the
//! first setting and the arbitrator bound to it.
//!
//! ```yaml
//! title: Community covenant
//! content: Be excellent to each other.
//! arbitrator:
//!   account: court
//!   fee_token: DAI
//!   fee_amount: 30
//! ```

use agr_core::{Account, Amount, TokenId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arbitrator::InMemoryArbitrator;

/// Failure to load an [`AgreementConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid YAML for the schema.
    #[error("failed to parse agreement config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A field failed validation.
    #[error("invalid agreement config: {0}")]
    Invalid(String),
}

/// The arbitrator an engine is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitratorConfig {
    /// Arbitrator account; also receives dispute fees.
    pub account: Account,
    /// Dispute fee token.
    pub fee_token: TokenId,
    /// Dispute fee amount.
    pub fee_amount: Amount,
}

impl ArbitratorConfig {
    /// An in-memory arbitrator with these terms.
    pub fn build(&self) -> InMemoryArbitrator {
        InMemoryArbitrator::new(
            self.account.clone(),
            self.fee_token.clone(),
            self.fee_amount,
        )
    }
}

/// Title, content and arbitrator of the first setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementConfig {
    /// Setting title.
    pub title: String,
    /// Setting content.
    #[serde(default)]
    pub content: String,
    /// Bound arbitrator.
    pub arbitrator: ArbitratorConfig,
}

impl AgreementConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject blank titles, accounts and fee tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() {
            return Err(ConfigError::Invalid("title must not be empty".into()));
        }
        if self.arbitrator.account.as_str().is_empty() {
            return Err(ConfigError::Invalid("arbitrator account must not be empty".into()));
        }
        if self.arbitrator.fee_token.as_str().is_empty() {
            return Err(ConfigError::Invalid("arbitrator fee token must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
title: Community covenant
content: Be excellent to each other.
arbitrator:
  account: court
  fee_token: DAI
  fee_amount: 30
"#;

    #[test]
    fn parses_full_config() {
        let config = AgreementConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.title, "Community covenant");
        assert_eq!(config.arbitrator.account, Account::new("court"));
        assert_eq!(config.arbitrator.fee_amount, Amount(30));
    }

    #[test]
    fn content_defaults_to_empty() {
        let yaml = "title: t\narbitrator:\n  account: court\n  fee_token: DAI\n  fee_amount: 0\n";
        let config = AgreementConfig::from_yaml_str(yaml).unwrap();
        assert!(config.content.is_empty());
    }

    #[test]
    fn blank_title_is_invalid() {
        let yaml = "title: '  '\narbitrator:\n  account: court\n  fee_token: DAI\n  fee_amount: 1\n";
        let err = AgreementConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_arbitrator_is_a_parse_error() {
        let err = AgreementConfig::from_yaml_str("title: t\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn builds_arbitrator_with_configured_fee() {
        use crate::arbitrator::Arbitrator;
        let config = AgreementConfig::from_yaml_str(YAML).unwrap();
        let court = config.arbitrator.build();
        assert_eq!(court.account(), &Account::new("court"));
        assert_eq!(court.dispute_fees().token, TokenId::new("DAI"));
    }
}
