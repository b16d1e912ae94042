//! A byte-level BPE text tokenizer with the CLIP vocabulary layout.
//!
//! This is the tokenizer that turns a prompt into the ids the renderer displays.  Text is
//! whitespace-normalized and lowercased, split into words, and each word is byte-level encoded
//! and merged with [`byte_pair_merge`].  The last symbol of every word carries the end-of-word
//! marker, so `cat` can become the single subword `cat</w>`.
use crate::bpe::{byte_pair_merge, MergeRanks};
use crate::byte_level;
use crate::error::{MergesFormatSnafu, MergesIoSnafu, UnknownSubwordSnafu};
use crate::render::END_OF_WORD;
use crate::{Result, Subword, SubwordEncoder, TokenInt};
use once_cell::sync::Lazy;
use regex::Regex;
use snafu::{OptionExt, ResultExt};
use std::path::Path;
use tracing::*;

pub const START_OF_TEXT: &str = "<|startoftext|>";
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// The number of merges CLIP uses from its merges file.  The vocabulary is 49408 entries: 512
/// byte-level symbols, the merges, and the two special tokens.
pub const MAX_MERGES: usize = 49152 - 256 - 2;

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\|startoftext\|>|<\|endoftext\|>|'s|'t|'re|'ve|'m|'ll|'d|\p{L}+|\p{N}|[^\s\p{L}\p{N}]+",
    )
    .expect("BUG: invalid word pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("BUG: invalid regex"));

/// Anything that can turn prompt text into token ids.
pub trait TextTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenInt>>;
}

#[derive(Clone, Debug)]
pub struct ClipBpe {
    encoder: SubwordEncoder,
    ranks: MergeRanks,
}

impl ClipBpe {
    /// Build a tokenizer from merges listed in rank order, deriving the vocabulary the way CLIP
    /// does: the 256 byte-level symbols, the same symbols with the end-of-word marker, one entry
    /// per merge, then the start and end of text tokens.
    pub fn from_merges<Iter, A, B>(merges: Iter) -> Self
    where
        Iter: IntoIterator<Item = (A, B)>,
        A: Into<Subword>,
        B: Into<Subword>,
    {
        let merges: Vec<(Subword, Subword)> = merges
            .into_iter()
            .map(|(left, right)| (left.into(), right.into()))
            .collect();

        let symbols = byte_level::vocabulary_order().map(String::from);
        let words = byte_level::vocabulary_order().map(|ch| format!("{ch}{END_OF_WORD}"));
        let merged = merges.iter().map(|(left, right)| format!("{left}{right}"));
        let special = [START_OF_TEXT.to_string(), END_OF_TEXT.to_string()];

        let encoder = SubwordEncoder::new(
            symbols
                .chain(words)
                .chain(merged)
                .chain(special)
                .zip(0..),
        );

        Self::from_parts(encoder, MergeRanks::new(merges))
    }

    pub fn from_parts(encoder: SubwordEncoder, ranks: MergeRanks) -> Self {
        Self { encoder, ranks }
    }

    /// Load a `merges.txt` file, and optionally an explicit `vocab.json`.  Without a vocabulary
    /// file the vocabulary is derived from the merges as in [`Self::from_merges`].
    ///
    /// Only the first [`MAX_MERGES`] merges are used.
    pub fn load(merges_path: &Path, vocab_path: Option<&Path>) -> Result<Self> {
        let merges = load_merges(merges_path)?;
        debug!(path = %merges_path.display(), merges = merges.len(), "Loaded merges");

        match vocab_path {
            Some(vocab_path) => {
                let encoder = SubwordEncoder::load(vocab_path)?;
                debug!(path = %vocab_path.display(), entries = encoder.len(), "Loaded vocabulary");
                Ok(Self::from_parts(encoder, MergeRanks::new(merges)))
            }
            None => Ok(Self::from_merges(merges)),
        }
    }

    /// The subword -> id table this tokenizer encodes with
    pub fn encoder(&self) -> &SubwordEncoder {
        &self.encoder
    }

    fn encode_word(&self, word: &str, tokens: &mut Vec<TokenInt>) -> Result<()> {
        if word == START_OF_TEXT || word == END_OF_TEXT {
            return self.push_subword(word, tokens);
        }

        let mut symbols: Vec<Subword> = word
            .bytes()
            .map(|byte| byte_level::byte_to_char(byte).to_string())
            .collect();
        if let Some(last) = symbols.last_mut() {
            last.push_str(END_OF_WORD);
        }

        for subword in byte_pair_merge(symbols, &self.ranks) {
            self.push_subword(&subword, tokens)?;
        }

        Ok(())
    }

    fn push_subword(&self, subword: &str, tokens: &mut Vec<TokenInt>) -> Result<()> {
        let id = self
            .encoder
            .id_for(subword)
            .context(UnknownSubwordSnafu { subword })?;
        tokens.push(id);
        Ok(())
    }
}

impl TextTokenizer for ClipBpe {
    /// Tokenize without adding start or end of text tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<TokenInt>> {
        let mut tokens = Vec::with_capacity(text.len() / 4);
        for word in split_words(text) {
            self.encode_word(&word, &mut tokens)?;
        }

        Ok(tokens)
    }
}

/// Normalize whitespace, lowercase, and split `text` into the words that are encoded separately.
pub fn split_words(text: &str) -> Vec<String> {
    let cleaned = WHITESPACE.replace_all(text, " ");
    let cleaned = cleaned.trim().to_lowercase();

    WORD_PATTERN
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn load_merges(path: &Path) -> Result<Vec<(Subword, Subword)>> {
    let contents = std::fs::read_to_string(path).context(MergesIoSnafu { path })?;

    let mut merges = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if (index == 0 && line.starts_with("#version")) || line.trim().is_empty() {
            continue;
        }
        if merges.len() == MAX_MERGES {
            break;
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(left), Some(right), None) => merges.push((left.to_string(), right.to_string())),
            _ => {
                return MergesFormatSnafu {
                    path,
                    line: index + 1,
                }
                .fail()
            }
        }
    }

    Ok(merges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render, ByteDecoder, RenderOptions, TokspanError};
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use std::io::Write;

    fn fixture() -> ClipBpe {
        ClipBpe::from_merges([("c", "a"), ("ca", "t</w>")])
    }

    #[test]
    fn derived_vocabulary_layout() {
        let bpe = fixture();
        let encoder = bpe.encoder();

        assert_eq!(516, encoder.len());
        assert_eq!(Some(0), encoder.id_for("!"));
        assert_eq!(Some(66), encoder.id_for("c"));
        assert_eq!(Some(256), encoder.id_for("!</w>"));
        assert_eq!(Some(320), encoder.id_for("a</w>"));
        assert_eq!(Some(512), encoder.id_for("ca"));
        assert_eq!(Some(513), encoder.id_for("cat</w>"));
        assert_eq!(Some(514), encoder.id_for(START_OF_TEXT));
        assert_eq!(Some(515), encoder.id_for(END_OF_TEXT));
    }

    #[test]
    fn split_words_normalizes() {
        assert_eq!(
            vec!["a", "cat", "'s", "2", "0", "!!", "<|endoftext|>"],
            split_words("  A\tCAT's 20 !!\n<|endoftext|> ")
        );
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn tokenize_words() {
        let bpe = fixture();

        assert_eq!(vec![320, 513], bpe.tokenize("A  Cat").unwrap());
        assert_eq!(vec![514, 320, 513], bpe.tokenize("<|startoftext|>a cat").unwrap());
        assert!(bpe.tokenize("").unwrap().is_empty());
    }

    #[test]
    fn tokenize_multibyte_word() {
        let bpe = fixture();
        let encoder = bpe.encoder();

        // é is C3 A9, which are both self-mapped Latin-1 symbols
        assert_eq!(
            vec![
                encoder.id_for("Ã").unwrap(),
                encoder.id_for("©</w>").unwrap()
            ],
            bpe.tokenize("é").unwrap()
        );
    }

    #[test]
    fn explicit_vocabulary_must_cover_merges() {
        let encoder = SubwordEncoder::new([("c", 0), ("a", 1)]);
        let bpe = ClipBpe::from_parts(encoder, MergeRanks::new([("c", "a"), ("ca", "t</w>")]));

        assert_matches!(
            bpe.tokenize("cat"),
            Err(TokspanError::UnknownSubword { subword }) if subword == "cat</w>"
        );
    }

    #[test]
    fn load_merges_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#version: 0.2").unwrap();
        writeln!(file, "c a").unwrap();
        writeln!(file, "ca t</w>").unwrap();

        let bpe = ClipBpe::load(file.path(), None).unwrap();
        assert_eq!(vec![513], bpe.tokenize("cat").unwrap());
    }

    #[test]
    fn load_rejects_malformed_merges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#version: 0.2").unwrap();
        writeln!(file, "c a b").unwrap();

        assert_matches!(
            ClipBpe::load(file.path(), None),
            Err(TokspanError::MergesFormat { line: 2, .. })
        );
    }

    #[test]
    fn load_with_vocab_file() {
        let mut merges = tempfile::NamedTempFile::new().unwrap();
        writeln!(merges, "c a").unwrap();
        let mut vocab = tempfile::NamedTempFile::new().unwrap();
        write!(vocab, r#"{{"ca": 7, "t</w>": 9}}"#).unwrap();

        let bpe = ClipBpe::load(merges.path(), Some(vocab.path())).unwrap();
        assert_eq!(vec![7, 9], bpe.tokenize("cat").unwrap());
    }

    proptest! {
        /// Rendering the tokens of any printable text gives back the normalized words, each
        /// followed by a space.
        #[test]
        fn tokenize_then_render(s in "\\PC*") {
            let bpe = fixture();
            let tokens = bpe.tokenize(&s).unwrap();

            let rendering = render(
                &tokens,
                &bpe.encoder().invert(),
                &ByteDecoder::byte_level(),
                &RenderOptions::default(),
            );

            let expected: String = split_words(&s).iter().map(|w| format!("{w} ")).collect();
            prop_assert_eq!(expected, rendering.text());
        }
    }
}
