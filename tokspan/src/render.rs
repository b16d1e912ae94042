//! Turns a sequence of token ids back into displayable text spans.
//!
//! Token boundaries don't line up with character boundaries.  A byte-level tokenizer is free to
//! split the UTF-8 encoding of a single character across two or more tokens, and a token on its
//! own may decode to nothing meaningful.  The renderer therefore accumulates ids until the bytes
//! they stand for form valid UTF-8, and only then emits a span covering all of them.
//!
//! Some ids never complete.  Once the accumulated group reaches the overflow threshold the oldest
//! id is given up on and rendered as an error span by itself, and the rest of the group is
//! replayed from scratch.  Whatever is still pending at the end of the input is rendered as one
//! error span.  Either way, every input id ends up in exactly one span.
use crate::{ByteDecoder, TokenInt, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use tracing::*;

/// How many ids may be pending before the oldest one is abandoned.
pub const DEFAULT_OVERFLOW_THRESHOLD: usize = 5;

/// The subword suffix byte-level CLIP tokenizers use to mark the end of a word.
pub const END_OF_WORD: &str = "</w>";

/// Rendered in place of text that could not be decoded, once per id.
pub const ERROR_MARKER: &str = "❌";

/// Spans cycle through this many display classes.
pub const DISPLAY_CLASSES: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Number of pending ids at which the oldest pending id is rendered as an error
    pub overflow_threshold: NonZeroUsize,

    /// Replaced with a single space in decoded text.  Empty means no replacement.
    pub end_of_word: String,

    pub error_marker: String,
}

impl RenderOptions {
    pub fn with_overflow_threshold(mut self, threshold: NonZeroUsize) -> Self {
        self.overflow_threshold = threshold;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            overflow_threshold: NonZeroUsize::new(DEFAULT_OVERFLOW_THRESHOLD)
                .expect("BUG: default threshold is non-zero"),
            end_of_word: END_OF_WORD.to_string(),
            error_marker: ERROR_MARKER.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The ids decoded to valid UTF-8
    Decoded,

    /// The ids could not be decoded; the text is the error marker
    Failed,
}

/// One or more consecutive ids and the text they render as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub ids: Vec<TokenInt>,
    pub text: String,

    /// Display class, `0..DISPLAY_CLASSES`, assigned in emission order
    pub class: usize,

    pub status: SpanStatus,
}

/// The result of rendering a token sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendering {
    pub spans: Vec<Span>,

    /// Every id consumed, in the order the spans were emitted.  Always equal to the input.
    pub ids: Vec<TokenInt>,
}

impl Rendering {
    pub fn token_count(&self) -> usize {
        self.ids.len()
    }

    /// The text of all spans, concatenated.
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

/// Render `tokens` into spans.
///
/// Never fails.  Ids missing from `vocab` read as empty subwords, and groups that don't decode
/// become [`SpanStatus::Failed`] spans.
pub fn render(
    tokens: &[TokenInt],
    vocab: &Vocabulary,
    decoder: &ByteDecoder,
    options: &RenderOptions,
) -> Rendering {
    SpanRenderer::new(vocab, decoder, options).render(tokens)
}

struct SpanRenderer<'a> {
    vocab: &'a Vocabulary,
    decoder: &'a ByteDecoder,
    options: &'a RenderOptions,

    /// Ids accumulated since the last emitted span, waiting to form valid UTF-8
    pending: Vec<TokenInt>,

    output: Rendering,
}

impl<'a> SpanRenderer<'a> {
    fn new(vocab: &'a Vocabulary, decoder: &'a ByteDecoder, options: &'a RenderOptions) -> Self {
        Self {
            vocab,
            decoder,
            options,
            pending: Vec::new(),
            output: Rendering::default(),
        }
    }

    fn render(mut self, tokens: &[TokenInt]) -> Rendering {
        let threshold = self.options.overflow_threshold.get();

        // Ids waiting for a reassembly attempt.  Normally this holds only the input id being
        // processed, but after an eviction it also holds the rest of the evicted group, which is
        // replayed before the next input id.
        let mut queue = VecDeque::with_capacity(threshold);

        for &token in tokens {
            queue.push_back(token);

            while let Some(id) = queue.pop_front() {
                self.pending.push(id);

                if let Some(text) = self.reassemble() {
                    self.emit_pending(text, SpanStatus::Decoded);
                } else if self.pending.len() >= threshold {
                    // Replayed ids number one less than the threshold, so a replay can never
                    // trigger another eviction.
                    debug_assert!(queue.is_empty());

                    let mut group = std::mem::take(&mut self.pending);
                    let oldest = group.remove(0);
                    debug!(
                        oldest,
                        replayed = group.len(),
                        "Pending ids did not decode within the overflow threshold"
                    );

                    self.emit(vec![oldest], self.options.error_marker.clone(), SpanStatus::Failed);
                    for id in group.into_iter().rev() {
                        queue.push_front(id);
                    }
                }
            }
        }

        self.flush();

        debug_assert_eq!(tokens, self.output.ids.as_slice());
        self.output
    }

    /// Final attempt at whatever is still pending at the end of the input.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        match self.reassemble() {
            Some(text) => self.emit_pending(text, SpanStatus::Decoded),
            None => {
                trace!(pending = ?self.pending, "Input ended mid-character");
                let text = self.options.error_marker.repeat(self.pending.len());
                self.emit_pending(text, SpanStatus::Failed);
            }
        }
    }

    /// Decode the pending ids as one unit.  `None` if the bytes aren't valid UTF-8 or a subword
    /// character isn't covered by the byte decoder.
    ///
    /// An uncovered character is a rendering failure like any other, shown as a marker span,
    /// rather than an error that fails the whole rendering.
    fn reassemble(&self) -> Option<String> {
        let subwords: String = self
            .pending
            .iter()
            .map(|id| self.vocab.subword_or_empty(*id))
            .collect();
        let bytes = self.decoder.decode(&subwords)?;
        let text = String::from_utf8(bytes).ok()?;

        if self.options.end_of_word.is_empty() {
            Some(text)
        } else {
            Some(text.replace(&self.options.end_of_word, " "))
        }
    }

    fn emit_pending(&mut self, text: String, status: SpanStatus) {
        let ids = std::mem::take(&mut self.pending);
        self.emit(ids, text, status);
    }

    fn emit(&mut self, ids: Vec<TokenInt>, text: String, status: SpanStatus) {
        let class = self.output.spans.len() % DISPLAY_CLASSES;
        self.output.ids.extend_from_slice(&ids);
        self.output.spans.push(Span {
            ids,
            text,
            class,
            status,
        });
    }
}
