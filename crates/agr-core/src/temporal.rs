//! # Temporal Types — UTC Timestamps
//!
//! Every deadline in the engine (challenge end dates, delay execution
//! times) is a `Timestamp`: UTC, truncated to whole seconds. Deadline
//! comparisons are therefore exact and reproducible across runs.
//!
//! Non-UTC inputs are rejected by [`Timestamp::parse()`].

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string. Only the `Z` suffix is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimestamp`] if the string is not valid
    /// RFC 3339 or carries an explicit offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// From Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("unix timestamp {secs}")))
    }

    /// Borrow the underlying `chrono` value.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted forward by `secs` seconds.
    pub fn plus_secs(&self, secs: u64) -> Result<Self, CoreError> {
        let delta = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("duration of {secs}s")))?;
        self.plus(delta)
    }

    /// This instant shifted by a signed duration.
    pub fn plus(&self, delta: Duration) -> Result<Self, CoreError> {
        self.0
            .checked_add_signed(delta)
            .map(|dt| Self(truncate_to_seconds(dt)))
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("{} + {delta}", self.to_iso8601())))
    }

    /// Time elapsed from `earlier` to `self`; zero if `earlier` is later.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        let delta = self.0.signed_duration_since(earlier.0);
        if delta < Duration::zero() {
            Duration::zero()
        } else {
            delta
        }
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
