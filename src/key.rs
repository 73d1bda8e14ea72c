//! Encoding of `u64` keys into lexicographically-comparable byte strings.

/// Number of bytes in the encoded form of a key.
pub const KEY_LEN: usize = 8;

/// The lexicographic encoding of a `u64` key.
///
/// Byte `i` is the `i`-th most significant byte of the original value, so
/// byte-wise comparison on [`ArtKey`] agrees with unsigned integer comparison
/// on the original `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtKey([u8; KEY_LEN]);

impl ArtKey {
    /// Encode a `u64` key into its big-endian byte form.
    pub fn encode(key: u64) -> Self {
        ArtKey(key.to_be_bytes())
    }

    /// Recover the original `u64` value.
    pub fn decode(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Borrow the encoded bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The byte at `depth`, or `None` if `depth >= KEY_LEN`.
    pub fn byte_at(&self, depth: usize) -> Option<u8> {
        self.0.get(depth).copied()
    }
}

impl From<u64> for ArtKey {
    fn from(key: u64) -> Self {
        ArtKey::encode(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for k in [0u64, 1, 42, u64::MAX, u64::MAX / 2, 0x0102_0304_0506_0708] {
            assert_eq!(ArtKey::encode(k).decode(), k);
        }
    }

    #[test]
    fn byte_order_matches_integer_order() {
        let a = ArtKey::encode(0x00);
        let b = ArtKey::encode(0x01);
        let c = ArtKey::encode(0x0100_0000_0000_0000);
        assert!(a.as_bytes() < b.as_bytes());
        assert!(b.as_bytes() < c.as_bytes());
    }

    #[test]
    fn most_significant_byte_first() {
        let k = ArtKey::encode(0x0102_0304_0506_0708);
        assert_eq!(k.as_bytes(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }
}
