//! Parsing of explicit id lists such as `9061, 631, 736`.
use crate::error::InvalidTokenIdSnafu;
use crate::{Result, TokenInt};
use snafu::ResultExt;

/// Parse a comma-separated list of decimal token ids.
///
/// Whitespace around each id is ignored.  Any integer is accepted, negative ones included;
/// whether it names a subword is up to the vocabulary.  Every piece must be an integer, so an
/// empty string or a trailing comma is an error.
pub fn parse_id_list(text: &str) -> Result<Vec<TokenInt>> {
    text.split(',')
        .map(|piece| {
            let piece = piece.trim();
            piece
                .parse::<TokenInt>()
                .context(InvalidTokenIdSnafu { input: piece })
        })
        .collect()
}
