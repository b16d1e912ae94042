//! Rendering of byte-level BPE token ids as readable, highlighted text spans.
//!
//! The pieces are deliberately independent of any particular model: give [`render`] a sequence of
//! ids, a [`Vocabulary`] and a [`ByteDecoder`] and it reconstructs the text each id or group of
//! ids stands for.  [`markup`] turns the result into HTML, and [`ClipBpe`] produces ids from text
//! for CLIP-style tokenizers.
mod bpe;
pub mod byte_level;
mod clip;
mod error;
mod ids;
pub mod markup;
mod render;
mod token;
mod vocab;

pub use bpe::*;
pub use byte_level::ByteDecoder;
pub use clip::*;
pub use error::*;
pub use ids::*;
pub use render::*;
pub use token::*;
pub use vocab::{SubwordEncoder, Vocabulary};

pub type Result<T> = std::result::Result<T, TokspanError>;
