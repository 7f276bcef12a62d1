//! Build descriptions: the source stamps and properties a step runs against

use crate::read_file;
use cistep_errors::{ConfigError, Error};
use cistep_types::SourceStamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Source stamps per codebase plus the build's initial properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildDefinition {
    #[serde(default, rename = "sourcestamp")]
    pub sourcestamps: Vec<SourceStamp>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl BuildDefinition {
    /// Load a build description from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = read_file(path).await?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a build description
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or two stamps share a codebase.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let definition: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        for stamp in &definition.sourcestamps {
            if !seen.insert(stamp.codebase.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate sourcestamp for codebase '{}'", stamp.codebase),
                }
                .into());
            }
        }

        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stamps_and_properties() {
        let build = BuildDefinition::from_toml_str(
            r#"
[properties]
buildername = "linux"
buildnumber = 12

[[sourcestamp]]
branch = "main"
revision = "abc123"

[[sourcestamp]]
codebase = "lib"
branch = "feature"

[sourcestamp.patch]
body = "diff"
"#,
        )
        .unwrap();

        assert_eq!(build.sourcestamps.len(), 2);
        assert_eq!(build.sourcestamps[0].codebase, "");
        assert_eq!(build.sourcestamps[1].codebase, "lib");
        assert!(build.sourcestamps[1].patch.is_some());
        assert_eq!(build.properties["buildername"], "linux");
        assert_eq!(build.properties["buildnumber"], 12);
    }

    #[test]
    fn empty_build_is_valid() {
        let build = BuildDefinition::from_toml_str("").unwrap();
        assert!(build.sourcestamps.is_empty());
    }

    #[test]
    fn duplicate_codebase_rejected() {
        let err = BuildDefinition::from_toml_str(
            "[[sourcestamp]]\ncodebase = \"lib\"\n[[sourcestamp]]\ncodebase = \"lib\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Invalid { .. })));
    }
}
