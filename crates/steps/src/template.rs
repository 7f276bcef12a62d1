//! Late-bound step names
//!
//! Templates use `{kw:key}` for values captured when the template is built
//! and `{prop:name}` for build properties looked up at render time.

use cistep_errors::{Error, StepError};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

fn placeholder() -> Result<&'static Regex, Error> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{(kw|prop):([A-Za-z0-9_.\-]+)\}").ok())
        .as_ref()
        .ok_or_else(|| Error::internal("placeholder pattern failed to compile"))
}

/// A string with placeholders rendered against a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolate {
    template: String,
    kwargs: BTreeMap<String, String>,
}

impl Interpolate {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            kwargs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_kw(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Whether the string contains anything to substitute
    #[must_use]
    pub fn has_placeholders(text: &str) -> bool {
        placeholder().is_ok_and(|re| re.is_match(text))
    }

    /// Substitute every placeholder
    ///
    /// String properties are inserted as-is, other JSON values in their
    /// compact JSON form. Substituted text is never rescanned.
    ///
    /// # Errors
    ///
    /// Returns `StepError::RenderFailed` naming the first placeholder that
    /// has no value.
    pub fn render_with(&self, property: impl Fn(&str) -> Option<Value>) -> Result<String, Error> {
        let re = placeholder()?;
        let mut missing = None;

        let rendered = re.replace_all(&self.template, |caps: &Captures<'_>| {
            let key = &caps[2];
            let value = match &caps[1] {
                "kw" => self.kwargs.get(key).cloned(),
                _ => property(key).map(|value| match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                }),
            };
            value.unwrap_or_else(|| {
                missing.get_or_insert_with(|| caps[0].to_string());
                String::new()
            })
        });

        match missing {
            Some(placeholder) => Err(StepError::RenderFailed {
                template: self.template.clone(),
                message: format!("no value for {placeholder}"),
            }
            .into()),
            None => Ok(rendered.into_owned()),
        }
    }
}

impl fmt::Display for Interpolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Step name before and after rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepName {
    Template(Interpolate),
    Rendered(String),
}

impl StepName {
    /// Name for a step working on `codebase`
    ///
    /// A non-empty codebase is appended as `-<codebase>` at render time.
    #[must_use]
    pub fn for_codebase(base: &str, codebase: &str) -> Self {
        if codebase.is_empty() {
            if Interpolate::has_placeholders(base) {
                Self::Template(Interpolate::new(base))
            } else {
                Self::Rendered(base.to_string())
            }
        } else {
            Self::Template(
                Interpolate::new(format!("{base}-{{kw:codebase}}")).with_kw("codebase", codebase),
            )
        }
    }

    /// Final name, once rendered
    #[must_use]
    pub fn rendered(&self) -> Option<&str> {
        match self {
            Self::Rendered(name) => Some(name),
            Self::Template(_) => None,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(template) => template.fmt(f),
            Self::Rendered(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(name: &str) -> Option<Value> {
        match name {
            "buildername" => Some(json!("linux")),
            "buildnumber" => Some(json!(7)),
            _ => None,
        }
    }

    #[test]
    fn kw_and_prop() {
        let template = Interpolate::new("{prop:buildername}/{kw:codebase}#{prop:buildnumber}")
            .with_kw("codebase", "lib");
        assert_eq!(template.render_with(props).unwrap(), "linux/lib#7");
    }

    #[test]
    fn missing_value_fails() {
        let err = Interpolate::new("{prop:branch}-x").render_with(props).unwrap_err();
        assert!(matches!(
            err,
            Error::Step(StepError::RenderFailed { ref message, .. }) if message.contains("{prop:branch}")
        ));
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let template = Interpolate::new("{kw:a}").with_kw("a", "{prop:buildername}");
        assert_eq!(template.render_with(props).unwrap(), "{prop:buildername}");
    }

    #[test]
    fn plain_braces_are_literal() {
        assert!(!Interpolate::has_placeholders("step {1}"));
        let name = StepName::for_codebase("step {1}", "");
        assert_eq!(name.rendered(), Some("step {1}"));
    }

    #[test]
    fn codebase_name_is_a_template() {
        let name = StepName::for_codebase("Git", "my-code");
        assert_eq!(name.rendered(), None);
        assert_eq!(name.to_string(), "Git-{kw:codebase}");

        let StepName::Template(template) = name else {
            panic!("expected template");
        };
        assert_eq!(template.render_with(|_| None).unwrap(), "Git-my-code");
    }
}
