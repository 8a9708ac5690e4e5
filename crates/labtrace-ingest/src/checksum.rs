use sha2::{Digest, Sha256};

/// Stable content digest of the original upload bytes, used both for
/// dedup (`patient_id`, checksum) and as the content-addressed storage key.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_produce_same_digest() {
        let a = sha256_hex(b"hello");
        let b = sha256_hex(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_produce_different_digest() {
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }
}
