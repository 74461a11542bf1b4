use serde::Serialize;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Hashes serializable data into an i64 using CBOR serialization and XxHash64.
///
/// Stable across runs and systems: CBOR gives a deterministic binary
/// representation and XxHash64 runs with a fixed seed (0). Used for the
/// natural-key index columns (`tag_uid_hash`, `public_key_id_hash`) and for
/// the tamper-evidence hash on access-log rows.
pub fn hash_as_i64<T: Serialize>(data: &T) -> Result<i64, String> {
    let mut hasher = XxHash64::with_seed(0);
    let mut cbor = Vec::new();
    ciborium::ser::into_writer(data, &mut cbor)
        .map_err(|e| format!("Failed to serialize data for hashing: {e}"))?;
    hasher.write(&cbor);
    Ok(hasher.finish() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_equal_input() {
        assert_eq!(hash_as_i64(&"UID-123").unwrap(), hash_as_i64(&"UID-123").unwrap());
    }

    #[test]
    fn hash_differs_for_different_input() {
        assert_ne!(hash_as_i64(&"UID-123").unwrap(), hash_as_i64(&"UID-124").unwrap());
    }

    #[test]
    fn hash_is_case_sensitive() {
        assert_ne!(hash_as_i64(&"uid-123").unwrap(), hash_as_i64(&"UID-123").unwrap());
    }
}
