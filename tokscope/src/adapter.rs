//! Finds a usable tokenizer on a conditioning model.
//!
//! Which attributes a tokenizer carries depends on the encoder family it came from.  Each
//! supported layout is a [`TokenizerShape`]; probing checks that every attribute the shape needs
//! is present before an adapter is constructed, so a successfully probed adapter can't fail later.
//!
//! Candidates are tried in order: the model's primary encoder, then the encoder wrapped by each
//! embedder.  On each candidate every shape is tried in priority order, and the first combination
//! that probes successfully wins.
use crate::error::NoCompatibleTokenizerSnafu;
use crate::host::{ConditioningModel, EncoderModule};
use crate::Result;
use serde::Serialize;
use snafu::Snafu;
use std::fmt;
use strum::IntoEnumIterator;
use tokspan::{ByteDecoder, SubwordEncoder};
use tracing::*;

/// The tokenizer layouts that can be adapted, in the order they are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenizerShape {
    /// The tokenizer carries its vocabulary and byte decoder itself
    Direct,

    /// The tokenizer wraps an inner tokenizer, which carries an `encoder` table and the byte
    /// decoder
    Wrapped,
}

/// Why a shape doesn't fit a candidate.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[snafu(display("encoder has no tokenizer"))]
    NoTokenizer,

    #[snafu(display("tokenizer has no vocabulary"))]
    MissingVocab,

    #[snafu(display("tokenizer has no byte decoder"))]
    MissingByteDecoder,

    #[snafu(display("tokenizer has no inner tokenizer"))]
    NoInnerTokenizer,

    #[snafu(display("inner tokenizer has no encoder"))]
    MissingEncoder,

    #[snafu(display("inner tokenizer has no byte decoder"))]
    MissingInnerByteDecoder,
}

#[derive(Clone, Copy, Debug)]
pub struct DirectTokenizer<'m> {
    vocab: &'m SubwordEncoder,
    byte_decoder: &'m ByteDecoder,
}

impl<'m> DirectTokenizer<'m> {
    pub fn probe(module: &'m EncoderModule) -> Result<Self, ProbeError> {
        let tokenizer = module.tokenizer.as_ref().ok_or(ProbeError::NoTokenizer)?;

        Ok(Self {
            vocab: tokenizer.vocab.as_deref().ok_or(ProbeError::MissingVocab)?,
            byte_decoder: tokenizer
                .byte_decoder
                .as_deref()
                .ok_or(ProbeError::MissingByteDecoder)?,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WrappedTokenizer<'m> {
    encoder: &'m SubwordEncoder,
    byte_decoder: &'m ByteDecoder,
}

impl<'m> WrappedTokenizer<'m> {
    pub fn probe(module: &'m EncoderModule) -> Result<Self, ProbeError> {
        let tokenizer = module.tokenizer.as_ref().ok_or(ProbeError::NoTokenizer)?;
        let inner = tokenizer
            .inner
            .as_ref()
            .ok_or(ProbeError::NoInnerTokenizer)?;

        Ok(Self {
            encoder: inner.encoder.as_deref().ok_or(ProbeError::MissingEncoder)?,
            byte_decoder: inner
                .byte_decoder
                .as_deref()
                .ok_or(ProbeError::MissingInnerByteDecoder)?,
        })
    }
}

/// Uniform access to the vocabulary and byte decoder of whichever shape was found.
#[derive(Clone, Copy, Debug)]
pub enum TokenizerAdapter<'m> {
    Direct(DirectTokenizer<'m>),
    Wrapped(WrappedTokenizer<'m>),
}

impl<'m> TokenizerAdapter<'m> {
    pub fn probe(shape: TokenizerShape, module: &'m EncoderModule) -> Result<Self, ProbeError> {
        match shape {
            TokenizerShape::Direct => DirectTokenizer::probe(module).map(Self::Direct),
            TokenizerShape::Wrapped => WrappedTokenizer::probe(module).map(Self::Wrapped),
        }
    }

    pub fn shape(&self) -> TokenizerShape {
        match self {
            Self::Direct(_) => TokenizerShape::Direct,
            Self::Wrapped(_) => TokenizerShape::Wrapped,
        }
    }

    /// The subword -> id table
    pub fn vocabulary(&self) -> &'m SubwordEncoder {
        match self {
            Self::Direct(direct) => direct.vocab,
            Self::Wrapped(wrapped) => wrapped.encoder,
        }
    }

    pub fn byte_decoder(&self) -> &'m ByteDecoder {
        match self {
            Self::Direct(direct) => direct.byte_decoder,
            Self::Wrapped(wrapped) => wrapped.byte_decoder,
        }
    }
}

/// The adapter that was found, and the encoder it was found on.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedTokenizer<'m> {
    pub candidate: &'m str,
    pub adapter: TokenizerAdapter<'m>,
}

/// A candidate/shape combination that was tried and didn't fit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub candidate: String,
    pub shape: TokenizerShape,
    pub reason: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.candidate, self.shape, self.reason)
    }
}

/// The encoders that may carry a tokenizer, in the order they should be tried.
pub fn candidates(model: &ConditioningModel) -> impl Iterator<Item = &EncoderModule> {
    std::iter::once(&model.wrapped).chain(
        model
            .embedders
            .iter()
            .filter_map(|embedder| embedder.wrapped.as_ref()),
    )
}

/// Find the first candidate encoder and shape that probe successfully.
///
/// Fails with [`crate::TokscopeError::NoCompatibleTokenizer`] listing every rejected combination
/// if there isn't one.
pub fn resolve_tokenizer(model: &ConditioningModel) -> Result<ResolvedTokenizer<'_>> {
    let mut rejected = Vec::new();

    for module in candidates(model) {
        for shape in TokenizerShape::iter() {
            match TokenizerAdapter::probe(shape, module) {
                Ok(adapter) => {
                    info!(candidate = %module.name, %shape, "Found compatible tokenizer");
                    return Ok(ResolvedTokenizer {
                        candidate: &module.name,
                        adapter,
                    });
                }
                Err(reason) => {
                    debug!(candidate = %module.name, %shape, %reason, "Tokenizer shape doesn't fit");
                    rejected.push(Rejection {
                        candidate: module.name.clone(),
                        shape,
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }

    warn!(
        attempts = rejected.len(),
        "No candidate text encoder has a compatible tokenizer"
    );
    NoCompatibleTokenizerSnafu { rejected }.fail()
}
