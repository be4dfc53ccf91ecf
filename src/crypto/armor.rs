//! Text armor for binary ciphertext.
//!
//! Ciphertext has to live inside a text buffer, so it is base64 encoded with an
//! alphabet that avoids `/` (swapped for `_`) and wrapped into fixed-width lines.
//! Decoding ignores all ASCII whitespace, so the wrap width is not part of the
//! format: a file re-wrapped by an editor still decodes to the same bytes.

use crate::constants::ARMOR_LINE_WIDTH;
use crate::errors::CryptoError;
use base64::alphabet::Alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

const ARMOR_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+_") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("armor alphabet must be valid"),
    };

const ARMOR_ENGINE: GeneralPurpose =
    GeneralPurpose::new(&ARMOR_ALPHABET, GeneralPurposeConfig::new());

/// Encode `bytes` as wrapped armor text.
///
/// Every line, including the last, ends with `\n`. Empty input yields an empty
/// string.
///
/// ```
/// use sealdoc::crypto::armor::{armor, unarmor};
///
/// let text = armor(b"\xff\xfe binary");
/// assert!(text.is_ascii());
/// assert_eq!(unarmor(&text)?, b"\xff\xfe binary");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn armor(bytes: &[u8]) -> String {
    let encoded = ARMOR_ENGINE.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE_WIDTH + 1);
    // base64 output is ASCII, so byte chunks are valid str slices
    for line in encoded.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        out.extend(line.iter().map(|&b| b as char));
        out.push('\n');
    }
    out
}

/// Decode armor text produced by [`armor`].
///
/// # Errors
///
/// Returns `CryptoError::MalformedArmor` if the text contains characters outside
/// the armor alphabet or has invalid padding.
pub fn unarmor(text: &str) -> Result<Vec<u8>, CryptoError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    ARMOR_ENGINE
        .decode(compact.as_bytes())
        .map_err(CryptoError::MalformedArmor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_byte_values() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        assert_eq!(unarmor(&armor(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_roundtrip_lengths_around_padding_and_wrap() {
        for len in [0usize, 1, 2, 3, 47, 48, 49, 96, 97] {
            let bytes = vec![0xfbu8; len];
            assert_eq!(unarmor(&armor(&bytes)).unwrap(), bytes, "length {}", len);
        }
    }

    #[test]
    fn test_empty_input_armors_to_empty_text() {
        assert_eq!(armor(b""), "");
        assert!(unarmor("").unwrap().is_empty());
    }

    #[test]
    fn test_output_is_wrapped_and_printable() {
        let text = armor(&[0xffu8; 200]);
        for line in text.lines() {
            assert!(line.len() <= ARMOR_LINE_WIDTH);
            assert!(line.chars().all(|c| c.is_ascii_graphic()));
        }
        assert!(text.ends_with('\n'));
        // 0xff bytes hit the substituted alphabet slot
        assert!(text.contains('_'));
        assert!(!text.contains('/'));
    }

    #[test]
    fn test_decoding_ignores_wrap_width() {
        let bytes: Vec<u8> = (0..150u8).collect();
        let rewrapped: String = armor(&bytes)
            .chars()
            .filter(|c| *c != '\n')
            .collect::<Vec<_>>()
            .chunks(10)
            .map(|chunk| chunk.iter().collect::<String>() + "\r\n")
            .collect();
        assert_eq!(unarmor(&rewrapped).unwrap(), bytes);
    }

    #[test]
    fn test_foreign_characters_are_malformed() {
        assert!(matches!(
            unarmor("not/armor!"),
            Err(CryptoError::MalformedArmor(_))
        ));
        assert!(matches!(
            unarmor("hello world"),
            Err(CryptoError::MalformedArmor(_))
        ));
    }
}
