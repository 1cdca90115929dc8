//! Content hashing over canonical JSON.
//!
//! Artifact identifiers, the preproduction spec hash, and iteration
//! manifest hashes are all SHA-256 digests of a canonical serialization:
//! object keys sorted, compact separators, ASCII output. Two independent
//! recomputations over identical content must produce identical digests.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash raw bytes to a lowercase hex SHA-256 digest.
pub fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hash any serializable value over its canonical JSON form.
///
/// Serialization round-trips through `serde_json::Value`, whose map type
/// keeps keys sorted, so struct field order never affects the digest.
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let normalized: Value = serde_json::to_value(value)?;
    let canonical = serde_json::to_string(&normalized)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_hex_known_digest() {
        // sha256("") is a well-known constant
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_canonical_hash_ignores_key_order() {
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(
            sha256_canonical(&a).unwrap(),
            sha256_canonical(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_is_deterministic() {
        let value = json!({"beats": [{"beat_id": "b1", "start_s": 0.0}], "thesis": "x"});
        let first = sha256_canonical(&value).unwrap();
        let second = sha256_canonical(&value).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_canonical_hash_distinguishes_content() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(
            sha256_canonical(&a).unwrap(),
            sha256_canonical(&b).unwrap()
        );
    }

    #[test]
    fn test_struct_and_value_hash_agree() {
        #[derive(serde::Serialize)]
        struct Sample {
            zeta: u32,
            alpha: u32,
        }
        let s = Sample { zeta: 9, alpha: 3 };
        let v = json!({"alpha": 3, "zeta": 9});
        assert_eq!(
            sha256_canonical(&s).unwrap(),
            sha256_canonical(&v).unwrap()
        );
    }
}
