//! The host's view of a loaded text-conditioning model.
//!
//! A conditioning model wraps a primary text encoder and, for multi-encoder models, a list of
//! embedders that may each wrap another encoder.  Tokenizers differ between encoder families, so
//! every tokenizer attribute is optional here; [`crate::adapter`] decides which of them are usable.
//!
//! Models are described by a JSON manifest:
//!
//! ```json
//! {
//!   "wrapped": {
//!     "name": "clip_l",
//!     "tokenizer": { "vocab": "vocab.json", "byte_decoder": "byte_level" }
//!   },
//!   "embedders": [
//!     { "wrapped": { "name": "clip_g", "tokenizer": { "inner": { "encoder": "vocab.json", "byte_decoder": { "file": "bytes.json" } } } } }
//!   ],
//!   "text_tokenizer": { "merges": "merges.txt" }
//! }
//! ```
//!
//! Paths are relative to the directory containing the manifest.
use crate::error::{ManifestFormatSnafu, ManifestIoSnafu, ManifestTableSnafu};
use crate::Result;
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokspan::{ByteDecoder, ClipBpe, SubwordEncoder, TextTokenizer};
use tracing::*;

/// A tokenizer as the host exposes it.
///
/// Two layouts exist in the wild: tokenizers that carry `vocab` and `byte_decoder` themselves,
/// and tokenizers that delegate to an `inner` tokenizer holding an `encoder` table and the byte
/// decoder.
#[derive(Clone, Debug, Default)]
pub struct TokenizerObject {
    pub vocab: Option<Arc<SubwordEncoder>>,
    pub byte_decoder: Option<Arc<ByteDecoder>>,
    pub inner: Option<InnerTokenizer>,
}

#[derive(Clone, Debug, Default)]
pub struct InnerTokenizer {
    pub encoder: Option<Arc<SubwordEncoder>>,
    pub byte_decoder: Option<Arc<ByteDecoder>>,
}

/// A text encoder and the tokenizer it was loaded with, if any.
#[derive(Clone, Debug, Default)]
pub struct EncoderModule {
    pub name: String,
    pub tokenizer: Option<TokenizerObject>,
}

/// One of the additional encoders of a multi-encoder model.  Not every embedder wraps a text
/// encoder.
#[derive(Clone, Debug, Default)]
pub struct Embedder {
    pub wrapped: Option<EncoderModule>,
}

#[derive(Clone, Default)]
pub struct ConditioningModel {
    pub wrapped: EncoderModule,
    pub embedders: Vec<Embedder>,

    /// The model's prompt tokenizer, used for text input
    pub text_tokenizer: Option<Arc<dyn TextTokenizer>>,
}

impl ConditioningModel {
    /// Build the model from a JSON manifest file.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let contents = std::fs::read(manifest_path).context(ManifestIoSnafu {
            path: manifest_path,
        })?;
        let manifest: ModelManifest =
            serde_json::from_slice(&contents).context(ManifestFormatSnafu {
                path: manifest_path,
            })?;

        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let model = TableLoader::new(base_dir).build_model(manifest)?;
        debug!(
            path = %manifest_path.display(),
            primary = %model.wrapped.name,
            embedders = model.embedders.len(),
            "Loaded model manifest"
        );

        Ok(model)
    }

    pub fn text_tokenizer(&self) -> Option<&dyn TextTokenizer> {
        self.text_tokenizer.as_deref()
    }
}

impl fmt::Debug for ConditioningModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditioningModel")
            .field("wrapped", &self.wrapped)
            .field("embedders", &self.embedders)
            .field("text_tokenizer", &self.text_tokenizer.is_some())
            .finish()
    }
}

/// Everything a request needs from the host, passed explicitly into each request.
///
/// The model is shared read-only, so one context can serve any number of concurrent requests.
#[derive(Clone, Debug)]
pub struct HostContext {
    model: Arc<ConditioningModel>,
}

impl HostContext {
    pub fn new(model: ConditioningModel) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn load(manifest_path: &Path) -> Result<Self> {
        Ok(Self::new(ConditioningModel::load(manifest_path)?))
    }

    pub fn model(&self) -> &ConditioningModel {
        &self.model
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelManifest {
    wrapped: ModuleManifest,
    #[serde(default)]
    embedders: Vec<EmbedderManifest>,
    text_tokenizer: Option<TextTokenizerManifest>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleManifest {
    name: String,
    tokenizer: Option<TokenizerManifest>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbedderManifest {
    wrapped: Option<ModuleManifest>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TokenizerManifest {
    vocab: Option<PathBuf>,
    byte_decoder: Option<ByteDecoderManifest>,
    inner: Option<InnerManifest>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InnerManifest {
    encoder: Option<PathBuf>,
    byte_decoder: Option<ByteDecoderManifest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ByteDecoderManifest {
    /// The standard byte-level table
    ByteLevel,
    /// An explicit JSON table of character to byte value
    File(PathBuf),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TextTokenizerManifest {
    merges: PathBuf,
    vocab: Option<PathBuf>,
}

/// Loads the tables a manifest refers to.  Encoders often share a vocabulary file, so each file
/// is only loaded once.
struct TableLoader<'a> {
    base_dir: &'a Path,
    vocabularies: HashMap<PathBuf, Arc<SubwordEncoder>>,
    byte_decoders: HashMap<PathBuf, Arc<ByteDecoder>>,
    byte_level: Option<Arc<ByteDecoder>>,
}

impl<'a> TableLoader<'a> {
    fn new(base_dir: &'a Path) -> Self {
        Self {
            base_dir,
            vocabularies: HashMap::new(),
            byte_decoders: HashMap::new(),
            byte_level: None,
        }
    }

    fn build_model(&mut self, manifest: ModelManifest) -> Result<ConditioningModel> {
        let wrapped = self.build_module(manifest.wrapped)?;

        let mut embedders = Vec::with_capacity(manifest.embedders.len());
        for embedder in manifest.embedders {
            let wrapped = match embedder.wrapped {
                Some(module) => Some(self.build_module(module)?),
                None => None,
            };
            embedders.push(Embedder { wrapped });
        }

        let text_tokenizer = match manifest.text_tokenizer {
            Some(spec) => {
                let merges = self.base_dir.join(spec.merges);
                let vocab = spec.vocab.map(|vocab| self.base_dir.join(vocab));
                let bpe = ClipBpe::load(&merges, vocab.as_deref()).context(ManifestTableSnafu)?;
                Some(Arc::new(bpe) as Arc<dyn TextTokenizer>)
            }
            None => None,
        };

        Ok(ConditioningModel {
            wrapped,
            embedders,
            text_tokenizer,
        })
    }

    fn build_module(&mut self, manifest: ModuleManifest) -> Result<EncoderModule> {
        let tokenizer = match manifest.tokenizer {
            Some(tokenizer) => Some(TokenizerObject {
                vocab: self.vocabulary(tokenizer.vocab)?,
                byte_decoder: self.byte_decoder(tokenizer.byte_decoder)?,
                inner: match tokenizer.inner {
                    Some(inner) => Some(InnerTokenizer {
                        encoder: self.vocabulary(inner.encoder)?,
                        byte_decoder: self.byte_decoder(inner.byte_decoder)?,
                    }),
                    None => None,
                },
            }),
            None => None,
        };

        Ok(EncoderModule {
            name: manifest.name,
            tokenizer,
        })
    }

    fn vocabulary(&mut self, path: Option<PathBuf>) -> Result<Option<Arc<SubwordEncoder>>> {
        let Some(path) = path else {
            return Ok(None);
        };
        let path = self.base_dir.join(path);

        if let Some(vocab) = self.vocabularies.get(&path) {
            return Ok(Some(vocab.clone()));
        }

        let vocab = Arc::new(SubwordEncoder::load(&path).context(ManifestTableSnafu)?);
        self.vocabularies.insert(path, vocab.clone());
        Ok(Some(vocab))
    }

    fn byte_decoder(
        &mut self,
        manifest: Option<ByteDecoderManifest>,
    ) -> Result<Option<Arc<ByteDecoder>>> {
        match manifest {
            None => Ok(None),
            Some(ByteDecoderManifest::ByteLevel) => Ok(Some(
                self.byte_level
                    .get_or_insert_with(|| Arc::new(ByteDecoder::byte_level()))
                    .clone(),
            )),
            Some(ByteDecoderManifest::File(path)) => {
                let path = self.base_dir.join(path);
                if let Some(decoder) = self.byte_decoders.get(&path) {
                    return Ok(Some(decoder.clone()));
                }

                let decoder = Arc::new(ByteDecoder::load(&path).context(ManifestTableSnafu)?);
                self.byte_decoders.insert(path, decoder.clone());
                Ok(Some(decoder))
            }
        }
    }
}
