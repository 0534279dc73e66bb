//! Binary-to-text codec for transit payloads.
//!
//! The transit engine expects plaintext as padded base64 using the standard
//! alphabet. Encoding works on 3-byte groups producing 4 symbols; a final
//! group of one byte gets two `=` and a final group of two bytes gets one.
//!
//! Decoding is strict about shape: the input must be a whole number of
//! 4-symbol groups, every symbol must be in the alphabet, and padding may
//! only close the final group. Unused low bits in the last symbol before the
//! padding are ignored.

use crate::error::CodecError;

/// The 64-symbol alphabet.
pub const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding symbol.
pub const PAD: u8 = b'=';

const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Length of the encoded form of `len` input bytes.
pub const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

/// Encode bytes to padded base64 text.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(input.len()));

    for chunk in input.chunks(3) {
        let b0 = u32::from(chunk[0]);
        let b1 = u32::from(chunk.get(1).copied().unwrap_or(0));
        let b2 = u32::from(chunk.get(2).copied().unwrap_or(0));
        let group = (b0 << 16) | (b1 << 8) | b2;

        out.push(symbol(group >> 18));
        out.push(symbol(group >> 12));
        out.push(if chunk.len() > 1 { symbol(group >> 6) } else { PAD as char });
        out.push(if chunk.len() > 2 { symbol(group) } else { PAD as char });
    }

    out
}

/// Decode padded base64 text back to bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let input = text.as_bytes();
    if input.len() % 4 != 0 {
        return Err(CodecError::InvalidLength(input.len()));
    }

    let groups = input.len() / 4;
    let mut out = Vec::with_capacity(groups * 3);

    let lookup = |position: usize| -> Result<u32, CodecError> {
        let byte = input[position];
        if byte == PAD {
            return Err(CodecError::InvalidPadding(position));
        }
        match DECODE_TABLE[byte as usize] {
            INVALID => Err(CodecError::InvalidSymbol {
                position,
                // Every earlier byte was ASCII, so `position` is a char boundary.
                symbol: text[position..].chars().next().unwrap_or(char::REPLACEMENT_CHARACTER),
            }),
            value => Ok(u32::from(value)),
        }
    };

    for (index, quad) in input.chunks_exact(4).enumerate() {
        let base = index * 4;
        let last = index + 1 == groups;

        let v0 = lookup(base)?;
        let v1 = lookup(base + 1)?;

        match (quad[2], quad[3]) {
            (PAD, PAD) if last => {
                let group = (v0 << 18) | (v1 << 12);
                out.push((group >> 16) as u8);
            }
            (PAD, _) => return Err(CodecError::InvalidPadding(base + 2)),
            (_, PAD) if last => {
                let v2 = lookup(base + 2)?;
                let group = (v0 << 18) | (v1 << 12) | (v2 << 6);
                out.push((group >> 16) as u8);
                out.push((group >> 8) as u8);
            }
            (_, PAD) => return Err(CodecError::InvalidPadding(base + 3)),
            _ => {
                let v2 = lookup(base + 2)?;
                let v3 = lookup(base + 3)?;
                let group = (v0 << 18) | (v1 << 12) | (v2 << 6) | v3;
                out.push((group >> 16) as u8);
                out.push((group >> 8) as u8);
                out.push(group as u8);
            }
        }
    }

    Ok(out)
}

/// Decode base64 text that must hold UTF-8, as transit plaintexts do here.
pub fn decode_utf8(text: &str) -> Result<String, crate::Error> {
    let bytes = decode(text)?;
    String::from_utf8(bytes)
        .map_err(|e| crate::Error::Internal(format!("decoded plaintext is not UTF-8: {e}")))
}

#[inline]
fn symbol(bits: u32) -> char {
    ALPHABET[(bits & 0x3F) as usize] as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vectors() {
        // RFC 4648 section 10
        let vectors: &[(&str, &str)] = &[
            ("", ""),
            ("f", "Zg=="),
            ("fo", "Zm8="),
            ("foo", "Zm9v"),
            ("foob", "Zm9vYg=="),
            ("fooba", "Zm9vYmE="),
            ("foobar", "Zm9vYmFy"),
        ];

        for (plain, encoded) in vectors {
            assert_eq!(encode(plain.as_bytes()), *encoded);
            assert_eq!(decode(encoded).unwrap(), plain.as_bytes());
        }
    }

    #[test]
    fn test_padding_counts() {
        // One remaining byte -> two padding symbols
        let one = encode(&[0xAB, 0xCD, 0xEF, 0x01]);
        assert!(one.ends_with("=="));
        assert_eq!(one.len(), 8);

        // Two remaining bytes -> one padding symbol
        let two = encode(&[0xAB, 0xCD, 0xEF, 0x01, 0x02]);
        assert!(two.ends_with('='));
        assert!(!two.ends_with("=="));

        // Whole groups -> no padding
        assert!(!encode(&[1, 2, 3]).contains('='));
    }

    #[test]
    fn test_high_bytes() {
        let data = [0xFF, 0xFE, 0xFD, 0x00, 0x80];
        assert_eq!(encode(&data), "//79AIA=");
        assert_eq!(decode("//79AIA=").unwrap(), data);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(1), 4);
        assert_eq!(encoded_len(3), 4);
        assert_eq!(encoded_len(4), 8);
        assert_eq!(encoded_len(256), 344);
    }

    #[test]
    fn test_rejects_bad_length() {
        assert_eq!(decode("Zm9"), Err(CodecError::InvalidLength(3)));
        assert_eq!(decode("Zm9vY"), Err(CodecError::InvalidLength(5)));
    }

    #[test]
    fn test_rejects_bad_symbol() {
        assert_eq!(
            decode("Zm9v*mFy"),
            Err(CodecError::InvalidSymbol {
                position: 4,
                symbol: '*'
            })
        );
        assert_eq!(
            decode("Zm-v"),
            Err(CodecError::InvalidSymbol {
                position: 2,
                symbol: '-'
            })
        );
    }

    #[test]
    fn test_rejects_non_ascii() {
        // "é" is two bytes, so total length is 4
        assert_eq!(
            decode("Zmé"),
            Err(CodecError::InvalidSymbol {
                position: 2,
                symbol: 'é'
            })
        );
    }

    #[test]
    fn test_rejects_misplaced_padding() {
        // Padding in the first two positions
        assert_eq!(decode("=m9v"), Err(CodecError::InvalidPadding(0)));
        assert_eq!(decode("Z===").unwrap_err(), CodecError::InvalidPadding(1));

        // Padding at position three without position four
        assert_eq!(decode("Zm=v"), Err(CodecError::InvalidPadding(2)));

        // Padding before the final group
        assert_eq!(decode("Zg==Zm9v"), Err(CodecError::InvalidPadding(2)));
        assert_eq!(decode("Zm8=Zm9v"), Err(CodecError::InvalidPadding(3)));
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_utf8("aGVsbG8=").unwrap(), "hello");
        assert!(decode_utf8("/w==").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode(&encode(&data)).unwrap(), data);
        }

        #[test]
        fn prop_matches_standard_engine(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            use base64::Engine;
            let standard = base64::engine::general_purpose::STANDARD.encode(&data);
            prop_assert_eq!(encode(&data), standard);
        }
    }
}
