use crate::adapter::Rejection;
use itertools::Itertools;
use serde::Serialize;
use snafu::Snafu;
use std::error::Error as _;
use std::path::PathBuf;

pub type Result<T, E = TokscopeError> = std::result::Result<T, E>;

/// Broad classes of failure, for front ends that only care what the user should fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
pub enum ErrorKind {
    /// The model or its tokenizer data can't be used.  Nothing the user types will help.
    Configuration,

    /// The user's input is malformed
    InputFormat,
}

/// Errors that fail a whole request.  Nothing is rendered when one of these occurs.
#[derive(Debug, Snafu, strum::AsRefStr)]
#[snafu(visibility(pub(crate)))]
pub enum TokscopeError {
    #[snafu(display("Failed to find a compatible tokenizer in any candidate text encoder"))]
    NoCompatibleTokenizer { rejected: Vec<Rejection> },

    #[snafu(display("Invalid token id list"))]
    InputFormat { source: tokspan::TokspanError },

    #[snafu(display("The model has no text tokenizer, so only id lists can be rendered"))]
    TextTokenizerUnavailable,

    #[snafu(display("Tokenizing the prompt failed"))]
    TextTokenization { source: tokspan::TokspanError },

    #[snafu(display("Error reading model manifest '{}'", path.display()))]
    ManifestIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Model manifest '{}' is malformed", path.display()))]
    ManifestFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Error loading tokenizer data for the model"))]
    ManifestTable { source: tokspan::TokspanError },

    #[snafu(display("Error reading config file '{}'", path.display()))]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Config file '{}' is malformed", path.display()))]
    ConfigFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl TokscopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokscopeError::InputFormat { .. } => ErrorKind::InputFormat,
            _ => ErrorKind::Configuration,
        }
    }

    /// If there is a longer, more detailed error message describing what went wrong, return it.
    fn error_details(&self) -> Option<String> {
        if let TokscopeError::NoCompatibleTokenizer { rejected } = self {
            return Some(rejected.iter().join("\n"));
        }

        let mut causes = Vec::new();
        let mut source = self.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        if causes.is_empty() {
            None
        } else {
            Some(causes.join("\n"))
        }
    }
}

/// Serializes as `{ "type", "kind", "message", "details" }` for display by a front end.
impl Serialize for TokscopeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("TokscopeError", 4)?;

        state.serialize_field("type", self.as_ref())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("details", &self.error_details())?;

        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TokenizerShape;
    use snafu::ResultExt;

    #[test]
    fn input_format_serialization() {
        let e = tokspan::parse_id_list("9061, abc")
            .context(InputFormatSnafu)
            .unwrap_err();
        let json = serde_json::to_string_pretty(&e).unwrap();
        expect_test::expect![[r#"
            {
              "type": "InputFormat",
              "kind": "InputFormat",
              "message": "Invalid token id list",
              "details": "'abc' is not a valid token id\ninvalid digit found in string"
            }"#]]
        .assert_eq(&json);
    }

    #[test]
    fn no_tokenizer_serialization() {
        let e = TokscopeError::NoCompatibleTokenizer {
            rejected: vec![
                Rejection {
                    candidate: "clip_l".to_string(),
                    shape: TokenizerShape::Direct,
                    reason: "tokenizer has no vocabulary".to_string(),
                },
                Rejection {
                    candidate: "clip_l".to_string(),
                    shape: TokenizerShape::Wrapped,
                    reason: "tokenizer has no inner tokenizer".to_string(),
                },
            ],
        };
        let json = serde_json::to_string_pretty(&e).unwrap();
        expect_test::expect![[r#"
            {
              "type": "NoCompatibleTokenizer",
              "kind": "Configuration",
              "message": "Failed to find a compatible tokenizer in any candidate text encoder",
              "details": "clip_l (direct): tokenizer has no vocabulary\nclip_l (wrapped): tokenizer has no inner tokenizer"
            }"#]]
        .assert_eq(&json);
    }

    #[test]
    fn kinds() {
        assert_eq!(
            ErrorKind::Configuration,
            TokscopeError::TextTokenizerUnavailable.kind()
        );
        assert_eq!(
            ErrorKind::Configuration,
            TokscopeError::NoCompatibleTokenizer { rejected: vec![] }.kind()
        );
    }
}
