//! What a source step needs from the build it runs in

use crate::template::Interpolate;
use cistep_config::BuildDefinition;
use cistep_errors::Error;
use cistep_types::SourceStamp;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Build-side collaborator of a source step
///
/// Stamps are read-only; properties use interior locking so a shared
/// reference is enough to record them.
pub trait BuildContext: Send + Sync {
    /// Stamp recorded for `codebase`, if any
    fn source_stamp(&self, codebase: &str) -> Option<SourceStamp>;

    fn property(&self, name: &str) -> Option<Value>;

    /// Set a property, remembering which step produced it
    fn set_property(&self, name: &str, value: Value, source: &str);

    /// Render a template against this build's properties
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder has no value.
    fn render(&self, template: &Interpolate) -> Result<String, Error> {
        template.render_with(|name| self.property(name))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    value: Value,
    source: String,
}

/// Build held entirely in memory, as loaded from a build description
#[derive(Debug, Default)]
pub struct InMemoryBuild {
    stamps: Vec<SourceStamp>,
    properties: RwLock<BTreeMap<String, Property>>,
}

impl InMemoryBuild {
    #[must_use]
    pub fn new(stamps: Vec<SourceStamp>) -> Self {
        Self {
            stamps,
            properties: RwLock::default(),
        }
    }

    /// Build from a parsed description; its properties are attributed to "build"
    #[must_use]
    pub fn from_definition(definition: BuildDefinition) -> Self {
        let properties = definition
            .properties
            .into_iter()
            .map(|(name, value)| {
                (
                    name,
                    Property {
                        value,
                        source: "build".to_string(),
                    },
                )
            })
            .collect();
        Self {
            stamps: definition.sourcestamps,
            properties: RwLock::new(properties),
        }
    }

    /// Snapshot of every property as `(value, source)`
    #[must_use]
    pub fn properties(&self) -> BTreeMap<String, (Value, String)> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, property)| {
                (
                    name.clone(),
                    (property.value.clone(), property.source.clone()),
                )
            })
            .collect()
    }
}

impl BuildContext for InMemoryBuild {
    fn source_stamp(&self, codebase: &str) -> Option<SourceStamp> {
        self.stamps
            .iter()
            .find(|stamp| stamp.codebase == codebase)
            .cloned()
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|property| property.value.clone())
    }

    fn set_property(&self, name: &str, value: Value, source: &str) {
        self.properties
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                Property {
                    value,
                    source: source.to_string(),
                },
            );
    }
}
