//! Editor configuration.
//!
//! Hosts usually keep these next to their own settings file:
//!
//! ```toml
//! copySuffix = " (copy)"
//! pathDelimiter = "/"
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::path::PATH_DELIMITER;

/// Tunables of an [`Editor`](crate::Editor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorOptions {
    /// Appended to the name field of duplicated entries.
    pub copy_suffix: String,
    /// Delimiter used for `path_str` and [`Editor::parse_path`](crate::Editor::parse_path).
    pub path_delimiter: char,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            copy_suffix: " (Copy)".to_string(),
            path_delimiter: PATH_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml() {
        let opts: EditorOptions = toml::from_str("pathDelimiter = \"/\"").unwrap();
        assert_eq!(opts.path_delimiter, '/');
        assert_eq!(opts.copy_suffix, " (Copy)");
    }

    #[test]
    fn test_json_round_trip() {
        let opts = EditorOptions {
            copy_suffix: " #2".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&opts).unwrap();
        assert_eq!(json["copySuffix"], " #2");
        let back: EditorOptions = serde_json::from_value(json).unwrap();
        assert_eq!(back, opts);
    }
}
