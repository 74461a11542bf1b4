use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;

use crate::config::CoreConfig;

type HmacSha256 = Hmac<Sha256>;

/// Keyed integrity code binding a tag's public identifiers together.
///
/// The checksum is the hex HMAC-SHA256 of `tag_uid ‖ public_key_id` under the
/// operator secret. A tag carrying a valid checksum was issued by this
/// system; nothing else about it is proven. Verification never raises — a
/// mismatch (including malformed hex) is simply `false`, and the comparison
/// runs in constant time.
pub struct ChecksumEngine {
    key: SecretSlice<u8>,
}

impl ChecksumEngine {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            key: SecretSlice::from(config.checksum_key().expose_secret().to_vec()),
        }
    }

    fn mac(&self, tag_uid: &str, public_key_id: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .expect("HMAC accepts keys of any length");
        mac.update(tag_uid.as_bytes());
        mac.update(public_key_id.as_bytes());
        mac
    }

    /// Lowercase hex checksum, 64 characters.
    pub fn generate(&self, tag_uid: &str, public_key_id: &str) -> String {
        hex::encode(self.mac(tag_uid, public_key_id).finalize().into_bytes())
    }

    pub fn verify(&self, tag_uid: &str, public_key_id: &str, checksum: &str) -> bool {
        let Ok(expected) = hex::decode(checksum) else {
            return false;
        };
        self.mac(tag_uid, public_key_id).verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ChecksumEngine {
        let config = CoreConfig::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap();
        ChecksumEngine::new(&config)
    }

    #[test]
    fn generated_checksums_verify() {
        let engine = engine();
        let checksum = engine.generate("UID-123", "pk-1");
        assert_eq!(checksum.len(), 64);
        assert!(engine.verify("UID-123", "pk-1", &checksum));
    }

    #[test]
    fn flipping_any_character_fails_verification() {
        let engine = engine();
        let checksum = engine.generate("UID-123", "pk-1");
        for (i, original) in checksum.char_indices() {
            let replacement = if original == '0' { '1' } else { '0' };
            let mut tampered = checksum.clone();
            tampered.replace_range(i..i + original.len_utf8(), &replacement.to_string());
            assert!(
                !engine.verify("UID-123", "pk-1", &tampered),
                "tampered checksum at {i} must not verify"
            );
        }
    }

    #[test]
    fn checksum_is_bound_to_both_identifiers() {
        let engine = engine();
        let checksum = engine.generate("UID-123", "pk-1");
        assert!(!engine.verify("UID-124", "pk-1", &checksum));
        assert!(!engine.verify("UID-123", "pk-2", &checksum));
    }

    #[test]
    fn malformed_hex_is_a_mismatch_not_an_error() {
        let engine = engine();
        assert!(!engine.verify("UID-123", "pk-1", "zz-not-hex"));
        assert!(!engine.verify("UID-123", "pk-1", ""));
    }

    #[test]
    fn different_keys_produce_different_checksums() {
        let engine_a = engine();
        let config_b = CoreConfig::new(vec![9u8; 32]).unwrap();
        let engine_b = ChecksumEngine::new(&config_b);
        let checksum = engine_a.generate("UID-123", "pk-1");
        assert!(!engine_b.verify("UID-123", "pk-1", &checksum));
    }
}
