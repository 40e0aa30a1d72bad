//! Player-Table Digests
//!
//! Two clients of the same match can compare a SHA-256 digest of their
//! canonical player flags to detect a disagreement that the sync layer never
//! reconciled (for example a lost persist write combined with a missed
//! broadcast).

use sha2::{Sha256, Digest};

/// Digest output (32 bytes).
pub type StateHash = [u8; 32];

/// Deterministic hasher with a domain separator.
///
/// Callers must feed fields in a stable order (players sorted by id).
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for the terminal-relevant player flags.
    pub fn for_player_flags() -> Self {
        Self::new(b"HIDEOUT_FLAGS_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a 16-byte id.
    #[inline]
    pub fn update_id(&mut self, id: &[u8; 16]) {
        self.hasher.update(id);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Short hex prefix of a digest for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_order_sensitive() {
        let mut a = StateHasher::for_player_flags();
        a.update_id(&[1; 16]);
        a.update_bool(true);
        let mut b = StateHasher::for_player_flags();
        b.update_bool(true);
        b.update_id(&[1; 16]);
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_digest_domain_separated() {
        let mut a = StateHasher::new(b"A");
        a.update_u32(5);
        let mut b = StateHasher::new(b"B");
        b.update_u32(5);
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_short_hex() {
        let hash = [0xab; 32];
        assert_eq!(short_hex(&hash), "abababababab");
    }
}
