//! # Setting Registry
//!
//! Versioned agreement content plus the arbitrator bound to it. Settings
//! are append-only: changing the content or the arbitrator appends a new
//! version, and every action keeps the id of the version it was submitted
//! under, so disputes are judged against the rules in force at submission.
//!
//! Signers record the last setting they accepted. A signer whose last
//! signed id is behind the current one must sign again before submitting.

use std::collections::BTreeMap;

use agr_core::{sha256_digest, Account, CanonicalBytes, ContentDigest, CoreError, SettingId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::AgreementError;

/// One immutable version of the agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Version id, starting at 1.
    pub id: SettingId,
    /// Title of this version.
    pub title: String,
    /// Raw agreement text.
    pub content: Vec<u8>,
    /// SHA-256 over the canonical `{title, content}` pair.
    pub content_hash: ContentDigest,
    /// Account of the arbitrator that rules on disputes under this setting.
    pub arbitrator: Account,
    /// When the version was appended.
    pub created_at: Timestamp,
}

/// Signing status of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// `SettingId(0)` if the account never signed.
    pub last_setting_id_signed: SettingId,
    /// True while the current setting is unsigned by this account.
    pub must_sign: bool,
}

/// Append-only log of settings and the signers' acceptance marks.
#[derive(Debug, Default)]
pub struct SettingRegistry {
    settings: Vec<Setting>,
    signers: BTreeMap<Account, SettingId>,
}

impl SettingRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new setting and return its id. Ids start at 1.
    pub fn create_setting(
        &mut self,
        title: impl Into<String>,
        content: Vec<u8>,
        arbitrator: Account,
        at: Timestamp,
    ) -> Result<SettingId, CoreError> {
        let title = title.into();
        let content_hash = content_hash(&title, &content)?;
        let id = SettingId(self.settings.len() as u64 + 1);
        self.settings.push(Setting {
            id,
            title,
            content,
            content_hash,
            arbitrator,
            created_at: at,
        });
        Ok(id)
    }

    /// Id of the latest setting, `SettingId(0)` before the first one.
    pub fn current_setting_id(&self) -> SettingId {
        SettingId(self.settings.len() as u64)
    }

    /// The setting in force.
    pub fn current(&self) -> Option<&Setting> {
        self.settings.last()
    }

    /// A setting by id.
    pub fn get(&self, id: SettingId) -> Option<&Setting> {
        let index = id.get().checked_sub(1)?;
        self.settings.get(usize::try_from(index).ok()?)
    }

    /// Number of settings.
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// True before the first setting.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// True iff the signer's last signed setting is older than the current one.
    pub fn signer_must_sign(&self, signer: &Account) -> bool {
        self.last_signed(signer) < self.current_setting_id()
    }

    /// Signing status of `signer`.
    pub fn signer_info(&self, signer: &Account) -> SignerInfo {
        SignerInfo {
            last_setting_id_signed: self.last_signed(signer),
            must_sign: self.signer_must_sign(signer),
        }
    }

    /// Mark the current setting as accepted by `signer`.
    pub fn sign(&mut self, signer: &Account) -> Result<SettingId, AgreementError> {
        let current = self.current_setting_id();
        if !self.signer_must_sign(signer) {
            return Err(AgreementError::AlreadySigned {
                signer: signer.clone(),
                setting_id: current,
            });
        }
        self.signers.insert(signer.clone(), current);
        Ok(current)
    }

    fn last_signed(&self, signer: &Account) -> SettingId {
        self.signers.get(signer).copied().unwrap_or_default()
    }
}

fn content_hash(title: &str, content: &[u8]) -> Result<ContentDigest, CoreError> {
    let hex: String = content.iter().map(|b| format!("{b:02x}")).collect();
    let canonical = CanonicalBytes::new(&serde_json::json!({
        "title": title,
        "content": hex,
    }))?;
    Ok(sha256_digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn registry_with_one_setting() -> SettingRegistry {
        let mut registry = SettingRegistry::new();
        registry
            .create_setting("Agreement", b"be nice".to_vec(), Account::new("court"), at())
            .unwrap();
        registry
    }

    #[test]
    fn ids_start_at_one_and_increment() {
        let mut registry = SettingRegistry::new();
        assert_eq!(registry.current_setting_id(), SettingId(0));
        let first = registry
            .create_setting("v1", vec![1], Account::new("court"), at())
            .unwrap();
        let second = registry
            .create_setting("v2", vec![2], Account::new("court"), at())
            .unwrap();
        assert_eq!(first, SettingId(1));
        assert_eq!(second, SettingId(2));
        assert_eq!(registry.current_setting_id(), second);
        assert_eq!(registry.get(first).unwrap().title, "v1");
        assert!(registry.get(SettingId(0)).is_none());
        assert!(registry.get(SettingId(3)).is_none());
    }

    #[test]
    fn content_hash_depends_on_content() {
        let mut registry = SettingRegistry::new();
        let a = registry
            .create_setting("t", vec![0xab], Account::new("court"), at())
            .unwrap();
        let b = registry
            .create_setting("t", vec![0xcd], Account::new("court"), at())
            .unwrap();
        assert_ne!(
            registry.get(a).unwrap().content_hash,
            registry.get(b).unwrap().content_hash
        );
    }

    #[test]
    fn new_signer_must_sign() {
        let registry = registry_with_one_setting();
        let info = registry.signer_info(&Account::new("alice"));
        assert!(info.must_sign);
        assert_eq!(info.last_setting_id_signed, SettingId(0));
    }

    #[test]
    fn signing_twice_fails_with_already_signed() {
        let mut registry = registry_with_one_setting();
        let alice = Account::new("alice");
        assert_eq!(registry.sign(&alice).unwrap(), SettingId(1));
        assert!(!registry.signer_must_sign(&alice));
        let err = registry.sign(&alice).unwrap_err();
        assert_eq!(err.code(), "AGR_SIGNER_ALREADY_SIGNED");
    }

    #[test]
    fn new_setting_requires_signing_again() {
        let mut registry = registry_with_one_setting();
        let alice = Account::new("alice");
        registry.sign(&alice).unwrap();
        registry
            .create_setting("v2", b"be nicer".to_vec(), Account::new("court"), at())
            .unwrap();
        assert!(registry.signer_must_sign(&alice));
        assert_eq!(registry.sign(&alice).unwrap(), SettingId(2));
    }
}
