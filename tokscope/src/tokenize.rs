//! The two tokenizer requests: render a prompt, or render an explicit list of ids.
use crate::adapter::{resolve_tokenizer, TokenizerShape};
use crate::error::{InputFormatSnafu, TextTokenizationSnafu, TextTokenizerUnavailableSnafu};
use crate::host::HostContext;
use crate::Result;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tokspan::{markup, Rendering, RenderOptions, TokenInt};
use tracing::*;

/// What the user asked to have tokenized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "input", rename_all = "lowercase")]
pub enum TokenizeInput {
    /// Prompt text, tokenized with the model's own text tokenizer
    Text(String),

    /// A comma-separated list of token ids, such as `9061, 631, 736`
    Ids(String),
}

impl TokenizeInput {
    fn mode(&self) -> &'static str {
        match self {
            TokenizeInput::Text(_) => "text",
            TokenizeInput::Ids(_) => "ids",
        }
    }
}

/// Both panes of the tokenizer tab, and the rendering they were made from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenizeOutput {
    /// Name of the encoder whose tokenizer was used
    pub candidate: String,
    pub shape: TokenizerShape,

    /// The highlighted spans
    pub markup: String,

    /// Token count and the flat id list
    pub summary: String,

    pub rendering: Rendering,
}

/// Tokenize `input` with the model in `ctx` and render the result.
///
/// The tokenizer is resolved before the input is even looked at, so a model without a compatible
/// tokenizer fails every request the same way.  Undecodable tokens are not errors; they show up
/// as failed spans in the output.
#[instrument(skip_all, fields(mode = input.mode()))]
pub fn tokenize(
    ctx: &HostContext,
    input: &TokenizeInput,
    options: &RenderOptions,
) -> Result<TokenizeOutput> {
    let resolved = resolve_tokenizer(ctx.model())?;

    let tokens: Vec<TokenInt> = match input {
        TokenizeInput::Text(text) => ctx
            .model()
            .text_tokenizer()
            .context(TextTokenizerUnavailableSnafu)?
            .tokenize(text)
            .context(TextTokenizationSnafu)?,
        TokenizeInput::Ids(ids) => tokspan::parse_id_list(ids).context(InputFormatSnafu)?,
    };

    let vocab = resolved.adapter.vocabulary().invert();
    let rendering = tokspan::render(&tokens, &vocab, resolved.adapter.byte_decoder(), options);
    debug!(
        tokens = rendering.token_count(),
        spans = rendering.spans.len(),
        "Rendered tokens"
    );

    Ok(TokenizeOutput {
        candidate: resolved.candidate.to_string(),
        shape: resolved.adapter.shape(),
        markup: markup::spans_markup(&rendering),
        summary: markup::summary_markup(&rendering),
        rendering,
    })
}

/// The "Text input" button.
pub fn tokenize_text(
    ctx: &HostContext,
    text: impl Into<String>,
    options: &RenderOptions,
) -> Result<TokenizeOutput> {
    tokenize(ctx, &TokenizeInput::Text(text.into()), options)
}

/// The "ID input" button.
pub fn tokenize_ids(
    ctx: &HostContext,
    ids: impl Into<String>,
    options: &RenderOptions,
) -> Result<TokenizeOutput> {
    tokenize(ctx, &TokenizeInput::Ids(ids.into()), options)
}
