//! The "Tokenizer" tab: its stylesheet, its explanatory text, and a standalone page that shows
//! the two output panes of a [`TokenizeOutput`].
use crate::TokenizeOutput;
use tokspan::markup::escape_html;

pub const TAB_TITLE: &str = "Tokenizer";
pub const TAB_ID: &str = "tokenizer";

/// Styles for the spans produced by [`tokspan::markup`].  The four display classes cycle through
/// progressively darker shades of the primary color.
pub const TAB_CSS: &str = "
.tokenizer-token{
    opacity: 0.8;
    cursor: pointer;
    --body-text-color: #000;
}
.tokenizer-token:hover {opacity: 1;}
.tokenizer-token-0 {background: var(--primary-300);}
.tokenizer-token-1 {background: var(--primary-400);}
.tokenizer-token-2 {background: var(--primary-500);}
.tokenizer-token-3 {background: var(--primary-600);}
";

/// Values for the palette variables [`TAB_CSS`] expects the host theme to define.
const PAGE_PALETTE: &str = "
:root {
    --primary-300: #fdba74;
    --primary-400: #fb923c;
    --primary-500: #f97316;
    --primary-600: #ea580c;
}
";

pub const DESCRIPTION: &str = "Before your text is sent to the neural network, it gets turned \
into numbers in a process called tokenization. These tokens are how the neural network reads and \
interprets text.";

/// A complete HTML document with the "Text" and "Tokens" panes for `output`.
pub fn render_page(output: &TokenizeOutput) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{palette}{css}</style>
</head>
<body id="{id}">
<p>
{description}
</p>
<p>Tokenizer: {candidate} ({shape})</p>
<h2>Text</h2>
<div id="tokenized_text">{markup}</div>
<h2>Tokens</h2>
<div id="tokenized_tokens">{summary}</div>
</body>
</html>
"#,
        title = TAB_TITLE,
        palette = PAGE_PALETTE,
        css = TAB_CSS,
        id = TAB_ID,
        description = DESCRIPTION,
        candidate = escape_html(&output.candidate),
        shape = output.shape,
        markup = output.markup,
        summary = output.summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TokenizerShape;
    use tokspan::{Rendering, Span, SpanStatus};

    #[test]
    fn page_contains_both_panes() {
        let rendering = Rendering {
            spans: vec![Span {
                ids: vec![513],
                text: "cat ".to_string(),
                class: 0,
                status: SpanStatus::Decoded,
            }],
            ids: vec![513],
        };
        let output = TokenizeOutput {
            candidate: "clip<l>".to_string(),
            shape: TokenizerShape::Direct,
            markup: tokspan::markup::spans_markup(&rendering),
            summary: tokspan::markup::summary_markup(&rendering),
            rendering,
        };

        let page = render_page(&output);

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(".tokenizer-token-3 {background: var(--primary-600);}"));
        assert!(page.contains("<p>Tokenizer: clip&lt;l&gt; (direct)</p>"));
        assert!(page.contains(
            "<div id=\"tokenized_text\"><span class='tokenizer-token tokenizer-token-0' title='513'>cat </span></div>"
        ));
        assert!(page.contains("Token count: 1<br>\n513"));
    }
}
