//! HTML fragments for a [`Rendering`]: the highlighted spans, and the token count summary.
use crate::{Rendering, Span};
use itertools::Itertools;
use std::borrow::Cow;

/// Escape the characters that are significant in HTML text and in quoted attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}

/// A single span as a hoverable element whose tooltip lists its ids.
pub fn span_markup(span: &Span) -> String {
    let title = span.ids.iter().join(", ");
    format!(
        "<span class='tokenizer-token tokenizer-token-{}' title='{}'>{}</span>",
        span.class,
        escape_html(&title),
        escape_html(&span.text)
    )
}

/// All spans, in order, with nothing in between.
pub fn spans_markup(rendering: &Rendering) -> String {
    rendering.spans.iter().fold(String::new(), |mut markup, span| {
        markup.push_str(&span_markup(span));
        markup
    })
}

/// The token count and the flat list of ids.
pub fn summary_markup(rendering: &Rendering) -> String {
    format!(
        "\n<p>\nToken count: {}<br>\n{}\n</p>\n",
        rendering.token_count(),
        rendering.ids.iter().join(", ")
    )
}
