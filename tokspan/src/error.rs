use snafu::Snafu;
use std::path::PathBuf;

use crate::Subword;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TokspanError {
    #[snafu(display("'{input}' is not a valid token id"))]
    InvalidTokenId {
        input: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Error reading vocabulary file '{}'", path.display()))]
    VocabularyIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Vocabulary file '{}' is not a JSON object of subword to id", path.display()))]
    VocabularyFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Error reading merges file '{}'", path.display()))]
    MergesIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Merges file '{}' line {line}: expected two space-separated symbols", path.display()))]
    MergesFormat { path: PathBuf, line: usize },

    #[snafu(display("Error reading byte decoder file '{}'", path.display()))]
    ByteDecoderIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Byte decoder file '{}' is not a JSON object of character to byte value", path.display()))]
    ByteDecoderFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Byte decoder maps '{ch}' to {value}, which is not a byte value"))]
    ByteValueOutOfRange { ch: char, value: u32 },

    #[snafu(display("Subword '{subword}' is missing from the vocabulary"))]
    UnknownSubword { subword: Subword },
}
