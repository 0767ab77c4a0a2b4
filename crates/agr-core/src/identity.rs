//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier the engine hands out or consumes.
//! You cannot pass a `ChallengeId` where an `ActionId` is expected.
//!
//! ## Numbering
//!
//! Engine-assigned ids (settings, actions, challenges, collateral
//! requirements) start at 1. The value 0 is never assigned and is treated
//! as "does not exist" by every lookup.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one engine instance.
///
/// Disputable apps bind to exactly one engine and use this id to reject
/// callbacks coming from anywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgreementId(pub Uuid);

impl AgreementId {
    /// Generate a new random engine identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agreement:{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create the identifier from any string-like value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id! {
    /// A participant: submitter, challenger, arbitrator, or fee recipient.
    Account
}

string_id! {
    /// A fungible token held by the custody ledger.
    TokenId
}

string_id! {
    /// A disputable app registered against the engine.
    AppId
}

macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Access the raw sequence number.
            pub fn get(&self) -> u64 {
                self.0
            }

            /// The id that follows this one.
            pub fn next(&self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

sequence_id! {
    /// Version of the agreement content and arbitrator binding.
    SettingId, "setting"
}

sequence_id! {
    /// Version of a disputable app's collateral requirement.
    CollateralRequirementId, "collateral"
}

sequence_id! {
    /// An action submitted by a disputable app.
    ActionId, "action"
}

sequence_id! {
    /// A challenge raised against an action.
    ChallengeId, "challenge"
}

sequence_id! {
    /// A dispute opened at an arbitrator.
    DisputeId, "dispute"
}
