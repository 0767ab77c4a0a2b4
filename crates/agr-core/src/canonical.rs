//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only input accepted by [`crate::sha256_digest`].
//! Its constructor serializes through `serde_json`, rejects floats, and
//! emits RFC 8785 (JCS) output via `serde_jcs`: sorted keys, compact
//! separators, one byte sequence per logical value.
//!
//! Setting content hashes and dispute metadata are both derived from these
//! bytes, so two engines holding the same setting agree on its hash.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced by JCS canonicalization. The inner buffer is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` if the value contains a non-integral number,
    /// `SerializationFailed` if serde cannot represent it as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// The canonical byte sequence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Number(n) if n.is_f64() => Err(CanonicalizationError::FloatRejected(
            n.as_f64().unwrap_or(f64::NAN),
        )),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sorted_and_compact() {
        let data = serde_json::json!({"setting": 2, "action": 1, "context": "0xdead"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"action":1,"context":"0xdead","setting":2}"#
        );
    }

    #[test]
    fn nested_objects_are_sorted() {
        let data = serde_json::json!({"outer": {"b": 2, "a": 1}, "list": [3, 2, 1]});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn floats_are_rejected_even_when_nested() {
        let data = serde_json::json!({"fees": [{"amount": 1.5}]});
        match CanonicalBytes::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 1.5),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
    }

    #[test]
    fn integers_and_null_pass_through() {
        let data = serde_json::json!({"amount": 42, "dispute": null});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_bytes(), br#"{"amount":42,"dispute":null}"#);
        assert!(!cb.is_empty());
    }
}
