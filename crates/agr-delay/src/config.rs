//! # Delay Configuration
//!
//! ```yaml
//! app_id: delay
//! delay_secs: 86400
//! challengers: [guardian]   # optional; omit to let anyone challenge
//! ```

use agr_core::{Account, AppId};
use serde::{Deserialize, Serialize};

use crate::error::DelayError;

/// Configuration of one Delay app instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Registry id of the app.
    pub app_id: AppId,
    /// Seconds between scheduling and earliest execution.
    pub delay_secs: u64,
    /// Allow-list of challengers; absent lets anyone challenge.
    #[serde(default)]
    pub challengers: Option<Vec<Account>>,
}

impl DelayConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DelayError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| DelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject an empty app id or an empty allow-list.
    pub fn validate(&self) -> Result<(), DelayError> {
        if self.app_id.as_str().is_empty() {
            return Err(DelayError::Config("app_id must not be empty".into()));
        }
        if self.challengers.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(DelayError::Config(
                "challengers must list at least one account when present".into(),
            ));
        }
        Ok(())
    }
}
