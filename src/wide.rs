//! Fixed-width multi-word encoding of 128-bit integers.
//!
//! Range bounds are stored as `u128`, but the cache format only deals in
//! native words. A [`WideInt`] is either the value itself, when it fits in
//! one word, or the full 128 bits split into words, most significant first.
//!
//! ```
//! use ip2asn::wide::{WideInt, WideInt64};
//!
//! assert_eq!(WideInt64::encode(42), WideInt::Inline(42));
//! assert_eq!(WideInt64::encode(1 << 64), WideInt::Words(vec![1, 0]));
//! assert_eq!(WideInt64::encode(1 << 64).decode(), 1 << 64);
//! ```

use std::fmt::Debug;

use crate::{Error, Result};

/// Tag byte for an inline word.
const TAG_INLINE: u8 = 0;
/// Tag byte for a word sequence.
const TAG_WORDS: u8 = 1;

/// A native word usable by [`WideInt`].
pub trait Word: Copy + Debug + Eq {
    /// Width of the word in bits.
    const BITS: u32;
    /// Number of words covering 128 bits.
    const COUNT: usize = (128 / Self::BITS) as usize;
    /// Width of the word in bytes.
    const BYTES: usize = (Self::BITS / 8) as usize;

    /// Keep the low `BITS` bits of `value`.
    fn truncate(value: u128) -> Self;

    /// Zero-extend to 128 bits.
    fn widen(self) -> u128;

    /// Append the little-endian bytes of this word.
    fn write_le(self, out: &mut Vec<u8>);

    /// Read a word from exactly `BYTES` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Largest value representable inline.
    fn max_inline() -> u128 {
        u128::MAX >> (128 - Self::BITS)
    }
}

impl Word for u64 {
    const BITS: u32 = 64;

    fn truncate(value: u128) -> Self {
        value as u64
    }

    fn widen(self) -> u128 {
        self as u128
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(buf)
    }
}

impl Word for u32 {
    const BITS: u32 = 32;

    fn truncate(value: u128) -> Self {
        value as u32
    }

    fn widen(self) -> u128 {
        self as u128
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(buf)
    }
}

/// An integer of up to 128 bits in native-word form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WideInt<W: Word> {
    /// Value fits in one word and is stored unchanged.
    Inline(W),
    /// Full 128-bit value, `W::COUNT` words, most significant first.
    Words(Vec<W>),
}

/// Two 64-bit words per large value.
pub type WideInt64 = WideInt<u64>;

/// Four 32-bit words per large value.
pub type WideInt32 = WideInt<u32>;

impl<W: Word> WideInt<W> {
    /// Encode a value.
    pub fn encode(value: u128) -> Self {
        if value <= W::max_inline() {
            return WideInt::Inline(W::truncate(value));
        }

        let words = (0..W::COUNT)
            .rev()
            .map(|i| W::truncate(value >> (i as u32 * W::BITS)))
            .collect();
        WideInt::Words(words)
    }

    /// Reassemble the encoded value.
    pub fn decode(&self) -> u128 {
        match self {
            WideInt::Inline(word) => word.widen(),
            WideInt::Words(words) => words
                .iter()
                .fold(0u128, |acc, word| (acc << W::BITS) + word.widen()),
        }
    }

    /// Whether the value is stored as-is.
    pub fn is_inline(&self) -> bool {
        matches!(self, WideInt::Inline(_))
    }

    /// Append the tagged little-endian encoding.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            WideInt::Inline(word) => {
                out.push(TAG_INLINE);
                word.write_le(out);
            }
            WideInt::Words(words) => {
                out.push(TAG_WORDS);
                for word in words {
                    word.write_le(out);
                }
            }
        }
    }

    /// Read a tagged encoding from the front of `data`.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize)> {
        let tag = *data.first().ok_or(Error::Truncated("wide integer tag"))?;
        let body = &data[1..];
        match tag {
            TAG_INLINE => {
                if body.len() < W::BYTES {
                    return Err(Error::Truncated("inline wide integer"));
                }
                Ok((WideInt::Inline(W::read_le(body)), 1 + W::BYTES))
            }
            TAG_WORDS => {
                let size = W::BYTES * W::COUNT;
                if body.len() < size {
                    return Err(Error::Truncated("wide integer words"));
                }
                let words = body[..size].chunks_exact(W::BYTES).map(W::read_le).collect();
                Ok((WideInt::Words(words), 1 + size))
            }
            other => Err(Error::CorruptCache(format!("unknown wide integer tag {}", other))),
        }
    }
}

/// Encode a batch of values.
pub fn encode_all<W: Word>(values: &[u128]) -> Vec<WideInt<W>> {
    values.iter().map(|v| WideInt::encode(*v)).collect()
}

/// Decode a batch of values.
pub fn decode_all<W: Word>(values: &[WideInt<W>]) -> Vec<u128> {
    values.iter().map(WideInt::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_numbers() -> Vec<u128> {
        vec![
            0,
            1,
            1 << 31,
            (1 << 32) - 1,
            1 << 32,
            (1 << 32) + 1,
            u64::MAX as u128,
            (1 << 64) + 1,
            u128::MAX,
        ]
    }

    #[test]
    fn test_save_and_load_big_numbers64() {
        let numbers = test_numbers();
        let encoded: Vec<WideInt64> = encode_all(&numbers);

        assert!(encoded.iter().any(|w| !w.is_inline()));
        assert_eq!(decode_all(&encoded), numbers);
    }

    #[test]
    fn test_save_and_load_big_numbers32() {
        let numbers = test_numbers();
        let encoded: Vec<WideInt32> = encode_all(&numbers);

        assert!(encoded.iter().any(|w| !w.is_inline()));
        assert_eq!(decode_all(&encoded), numbers);
    }

    #[test]
    fn test_passthrough_width() {
        assert_eq!(WideInt64::encode(u64::MAX as u128), WideInt::Inline(u64::MAX));
        assert!(!WideInt64::encode(u64::MAX as u128 + 1).is_inline());

        assert_eq!(WideInt32::encode(u32::MAX as u128), WideInt::Inline(u32::MAX));
        assert!(!WideInt32::encode(u32::MAX as u128 + 1).is_inline());
    }

    #[test]
    fn test_words_most_significant_first() {
        let value = 0x0001_0002_0003_0004_0005_0006_0007_0008u128;
        assert_eq!(
            WideInt64::encode(value),
            WideInt::Words(vec![0x0001_0002_0003_0004, 0x0005_0006_0007_0008])
        );
        assert_eq!(
            WideInt32::encode(value),
            WideInt::Words(vec![0x0001_0002, 0x0003_0004, 0x0005_0006, 0x0007_0008])
        );
    }

    #[test]
    fn test_words_zero_padded() {
        assert_eq!(WideInt32::encode(1 << 32), WideInt::Words(vec![0, 0, 1, 0]));
        assert_eq!(WideInt64::encode((1 << 64) + 1), WideInt::Words(vec![1, 1]));
    }

    #[test]
    fn test_byte_encoding() {
        let mut buf = Vec::new();
        WideInt64::encode(7).write_to(&mut buf);
        WideInt64::encode(u128::MAX - 3).write_to(&mut buf);
        assert_eq!(buf.len(), (1 + 8) + (1 + 16));

        let (first, used) = WideInt64::read_from(&buf).unwrap();
        assert_eq!(first.decode(), 7);
        let (second, used2) = WideInt64::read_from(&buf[used..]).unwrap();
        assert_eq!(second.decode(), u128::MAX - 3);
        assert_eq!(used + used2, buf.len());
    }

    #[test]
    fn test_byte_decoding_errors() {
        assert!(matches!(WideInt64::read_from(&[]), Err(Error::Truncated(_))));
        assert!(matches!(WideInt64::read_from(&[0, 1, 2]), Err(Error::Truncated(_))));
        assert!(matches!(WideInt32::read_from(&[1, 0, 0, 0, 0]), Err(Error::Truncated(_))));
        assert!(matches!(WideInt64::read_from(&[9; 20]), Err(Error::CorruptCache(_))));
    }
}
