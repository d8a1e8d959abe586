use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Interpreter limits, loadable from a JSON file. Missing keys take the
/// defaults below; unknown keys are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(rename = "MAX_FUNC_DEPTH", default = "default_max_func_depth")]
    pub max_func_depth: usize,
    #[serde(rename = "MAX_REC_DEPTH", default = "default_max_rec_depth")]
    pub max_rec_depth: usize,
    #[serde(rename = "MAX_STRING_LENGTH", default = "default_max_string_length")]
    pub max_string_length: usize,
    #[serde(
        rename = "MAX_IDENTIFIER_LENGTH",
        default = "default_max_identifier_length"
    )]
    pub max_identifier_length: usize,
    #[serde(rename = "MAX_COMMENT_LENGTH", default = "default_max_comment_length")]
    pub max_comment_length: usize,
    #[serde(rename = "MAX_FOLDER_DEPTH", default = "default_max_folder_depth")]
    pub max_folder_depth: usize,
}

fn default_max_func_depth() -> usize {
    200
}

fn default_max_rec_depth() -> usize {
    100
}

fn default_max_string_length() -> usize {
    10_000
}

fn default_max_identifier_length() -> usize {
    64
}

fn default_max_comment_length() -> usize {
    10_000
}

fn default_max_folder_depth() -> usize {
    16
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_func_depth: default_max_func_depth(),
            max_rec_depth: default_max_rec_depth(),
            max_string_length: default_max_string_length(),
            max_identifier_length: default_max_identifier_length(),
            max_comment_length: default_max_comment_length(),
            max_folder_depth: default_max_folder_depth(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Parsing configuration JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json("{}").expect("parse failed");
        assert_eq!(config, Config::default());
        assert_eq!(config.max_func_depth, 200);
        assert_eq!(config.max_rec_depth, 100);
    }

    #[test]
    fn overrides_named_keys_and_ignores_unknown_ones() {
        let config = Config::from_json(
            r#"{"MAX_FUNC_DEPTH": 8, "MAX_STRING_LENGTH": 32, "SOME_FUTURE_KEY": true}"#,
        )
        .expect("parse failed");
        assert_eq!(config.max_func_depth, 8);
        assert_eq!(config.max_string_length, 32);
        assert_eq!(config.max_identifier_length, 64);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Config::from_json("{MAX_FUNC_DEPTH:").is_err());
    }
}
