//! Lookup tables between subword strings and token ids.
//!
//! Tokenizers publish their vocabulary as a subword -> id table (`vocab.json`).  Rendering needs
//! the reverse direction, so the [`SubwordEncoder`] can be inverted into a [`Vocabulary`].
use crate::error::{VocabularyFormatSnafu, VocabularyIoSnafu};
use crate::{Result, Subword, TokenInt};
use snafu::ResultExt;
use std::path::Path;

pub use rustc_hash::FxHashMap as HashMap;

/// Maps subword strings to the ids assigned to them in the vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubwordEncoder(HashMap<Subword, TokenInt>);

/// The reverse mapping, from a token id to its subword string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary(HashMap<TokenInt, Subword>);

impl SubwordEncoder {
    pub fn new<Iter, S>(items: Iter) -> Self
    where
        Iter: IntoIterator<Item = (S, TokenInt)>,
        S: Into<Subword>,
    {
        Self(
            items
                .into_iter()
                .map(|(subword, id)| (subword.into(), id))
                .collect(),
        )
    }

    /// Load a `vocab.json` style file: a single JSON object whose keys are subwords and whose
    /// values are token ids.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path).context(VocabularyIoSnafu { path })?;
        let table: HashMap<Subword, TokenInt> =
            serde_json::from_slice(&contents).context(VocabularyFormatSnafu { path })?;

        Ok(Self(table))
    }

    pub fn id_for(&self, subword: &str) -> Option<TokenInt> {
        self.0.get(subword).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Invert the table so ids become the keys.
    ///
    /// If two subwords share an id, which one survives is unspecified.  Real vocabularies don't
    /// do that.
    pub fn invert(&self) -> Vocabulary {
        Vocabulary(self.0.iter().map(|(s, i)| (*i, s.clone())).collect())
    }
}

impl Vocabulary {
    pub fn subword(&self, id: TokenInt) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    /// Like [`Self::subword`], but ids that aren't in the vocabulary read as the empty string.
    pub fn subword_or_empty(&self, id: TokenInt) -> &str {
        self.subword(id).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TokenInt, Subword)> for Vocabulary {
    fn from_iter<T: IntoIterator<Item = (TokenInt, Subword)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
