//! Optional JSON configuration file.
//!
//! ```json
//! { "model": "models/sdxl/model.json", "overflow_threshold": 5, "error_marker": "?" }
//! ```
//!
//! Every field is optional.  A relative `model` path is relative to the config file.
use crate::error::{ConfigFormatSnafu, ConfigIoSnafu};
use crate::Result;
use serde::Deserialize;
use snafu::ResultExt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tokspan::RenderOptions;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the model manifest
    pub model: Option<PathBuf>,

    pub overflow_threshold: Option<NonZeroUsize>,
    pub end_of_word: Option<String>,
    pub error_marker: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path).context(ConfigIoSnafu { path })?;
        let mut config: Config =
            serde_json::from_slice(&contents).context(ConfigFormatSnafu { path })?;

        if let Some(dir) = path.parent() {
            config.model = config.model.map(|model| dir.join(model));
        }

        Ok(config)
    }

    /// Render options with this config's overrides applied to the defaults.
    pub fn render_options(&self) -> RenderOptions {
        let mut options = RenderOptions::default();
        if let Some(threshold) = self.overflow_threshold {
            options.overflow_threshold = threshold;
        }
        if let Some(end_of_word) = &self.end_of_word {
            options.end_of_word = end_of_word.clone();
        }
        if let Some(error_marker) = &self.error_marker {
            options.error_marker = error_marker.clone();
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokscopeError;
    use assert_matches::assert_matches;

    #[test]
    fn load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokscope.json");
        std::fs::write(
            &path,
            r#"{"model": "sdxl/model.json", "overflow_threshold": 3, "error_marker": "?"}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(Some(dir.path().join("sdxl/model.json")), config.model);

        let options = config.render_options();
        assert_eq!(3, options.overflow_threshold.get());
        assert_eq!("?", options.error_marker);
        assert_eq!(tokspan::END_OF_WORD, options.end_of_word);
    }

    #[test]
    fn empty_config_means_defaults() {
        assert_eq!(RenderOptions::default(), Config::default().render_options());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokscope.json");
        std::fs::write(&path, r#"{"overflow_threshold": 0}"#).unwrap();

        assert_matches!(Config::load(&path), Err(TokscopeError::ConfigFormat { .. }));
    }
}
