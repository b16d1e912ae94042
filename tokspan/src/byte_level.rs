//! The reversible byte <-> character remapping used by byte-level BPE tokenizers.
//!
//! Byte-level tokenizers never operate on raw bytes.  Each byte of the UTF-8 input is first
//! replaced by a printable character: printable ASCII and most of Latin-1 stand for themselves,
//! and everything else (control characters, space, a few Latin-1 gaps) is shifted up to
//! U+0100 and beyond.  Subword strings in the vocabulary are made of those characters, so getting
//! the original text back means mapping every character back to its byte and decoding the bytes
//! as UTF-8.
use crate::error::{ByteDecoderFormatSnafu, ByteDecoderIoSnafu, ByteValueOutOfRangeSnafu};
use crate::vocab::HashMap;
use crate::Result;
use once_cell::sync::Lazy;
use snafu::{ensure, ResultExt};
use std::path::Path;

static BYTE_TO_CHAR: Lazy<[char; 256]> = Lazy::new(|| {
    let mut table = ['\0'; 256];
    let mut shifted = 0u32;
    for (byte, slot) in table.iter_mut().enumerate() {
        let code = match byte as u8 {
            b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF => byte as u32,
            _ => {
                let code = 0x100 + shifted;
                shifted += 1;
                code
            }
        };
        *slot = char::from_u32(code).expect("BUG: byte-level table only produces valid chars");
    }
    table
});

/// The printable character that stands for `byte` in subword strings.
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Replace each byte with its printable stand-in.
pub fn encode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| byte_to_char(*b)).collect()
}

/// The characters that stand for bytes, in the order byte-level tokenizers lay out the first 256
/// entries of their vocabulary: the self-mapped printable ranges first, then the shifted bytes.
pub fn vocabulary_order() -> impl Iterator<Item = char> {
    let printable = BYTE_TO_CHAR.iter().copied().filter(|c| (*c as u32) < 0x100);
    let shifted = BYTE_TO_CHAR.iter().copied().filter(|c| (*c as u32) >= 0x100);

    printable.chain(shifted)
}

/// Maps subword characters back to the raw byte values they stand for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteDecoder(HashMap<char, u8>);

impl ByteDecoder {
    /// The inverse of the standard byte-level table.
    pub fn byte_level() -> Self {
        Self(
            BYTE_TO_CHAR
                .iter()
                .enumerate()
                .map(|(byte, ch)| (*ch, byte as u8))
                .collect(),
        )
    }

    /// Build a decoder from explicit character/value pairs, as published by a tokenizer.
    ///
    /// Fails if any value doesn't fit in a byte.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (char, u32)>) -> Result<Self> {
        let mut table = HashMap::default();
        for (ch, value) in pairs {
            ensure!(value <= u8::MAX as u32, ByteValueOutOfRangeSnafu { ch, value });
            table.insert(ch, value as u8);
        }

        Ok(Self(table))
    }

    /// Load a JSON object mapping single characters to byte values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path).context(ByteDecoderIoSnafu { path })?;
        let pairs: HashMap<char, u32> =
            serde_json::from_slice(&contents).context(ByteDecoderFormatSnafu { path })?;

        Self::from_pairs(pairs)
    }

    pub fn byte_for(&self, ch: char) -> Option<u8> {
        self.0.get(&ch).copied()
    }

    /// Map every character of `text` back to its byte.
    ///
    /// Returns `None` if any character isn't covered by this decoder.
    pub fn decode(&self, text: &str) -> Option<Vec<u8>> {
        text.chars().map(|ch| self.byte_for(ch)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ByteDecoder {
    fn default() -> Self {
        Self::byte_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokspanError;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn well_known_mappings() {
        assert_eq!('a', byte_to_char(b'a'));
        assert_eq!('!', byte_to_char(b'!'));
        // Space is byte 32, and it's the 33rd byte that isn't printable
        assert_eq!('Ġ', byte_to_char(b' '));
        assert_eq!('Ċ', byte_to_char(b'\n'));
        assert_eq!('Ā', byte_to_char(0));
        assert_eq!('Ã', byte_to_char(0xC3));
        assert_eq!('©', byte_to_char(0xA9));
    }

    #[test]
    fn table_is_a_bijection() {
        let decoder = ByteDecoder::byte_level();
        assert_eq!(256, decoder.len());

        for byte in 0..=u8::MAX {
            assert_eq!(Some(byte), decoder.byte_for(byte_to_char(byte)));
        }
    }

    #[test]
    fn vocabulary_order_starts_with_printables() {
        let order: Vec<char> = vocabulary_order().collect();
        assert_eq!(256, order.len());
        assert_eq!('!', order[0]);
        assert_eq!('c', order[66]);
        assert_eq!('Ā', order[188]);
    }

    #[test]
    fn decode_multibyte() {
        let decoder = ByteDecoder::byte_level();
        let encoded = encode_bytes("é ok".as_bytes());

        assert_eq!("Ã©Ġok", encoded);
        assert_eq!(Some("é ok".as_bytes().to_vec()), decoder.decode(&encoded));
        assert_eq!(None, decoder.decode("☃"));
    }

    #[test]
    fn from_pairs_rejects_wide_values() {
        assert_matches!(
            ByteDecoder::from_pairs([('a', 97), ('Ā', 256)]),
            Err(TokspanError::ByteValueOutOfRange { ch: 'Ā', value: 256 })
        );
    }

    #[test]
    fn load_json_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a": 97, "Ġ": 32}}"#).unwrap();

        let decoder = ByteDecoder::load(file.path()).unwrap();
        assert_eq!(Some(b' '), decoder.byte_for('Ġ'));
        assert_eq!(None, decoder.byte_for('b'));
    }
}
