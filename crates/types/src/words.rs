//! Word lists used for step names and descriptions

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered sequence of description words.
///
/// A single string becomes a one-word sequence holding that exact string;
/// it is never split on whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "Vec<String>")]
pub struct Words(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Words {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(word) => Self(vec![word]),
            OneOrMany::Many(words) => Self(words),
        }
    }
}

impl From<Words> for Vec<String> {
    fn from(words: Words) -> Self {
        words.0
    }
}

impl Words {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append `other` after these words
    #[must_use]
    pub fn joined(&self, other: &Words) -> Words {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Words(out)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for Words {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<&str> for Words {
    fn from(word: &str) -> Self {
        Self(vec![word.to_string()])
    }
}

impl From<String> for Words {
    fn from(word: String) -> Self {
        Self(vec![word])
    }
}

impl From<Vec<String>> for Words {
    fn from(words: Vec<String>) -> Self {
        Self(words)
    }
}

impl From<Vec<&str>> for Words {
    fn from(words: Vec<&str>) -> Self {
        Self(words.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Words {
    fn from(words: [&str; N]) -> Self {
        Self(words.iter().map(|w| (*w).to_string()).collect())
    }
}

impl PartialEq<[&str]> for Words {
    fn eq(&self, other: &[&str]) -> bool {
        self.0.len() == other.len() && self.0.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for Words {
    fn eq(&self, other: &[&str; N]) -> bool {
        self == &other[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        description: Words,
    }

    #[test]
    fn bare_string_is_not_split() {
        let words = Words::from("svn update (running)");
        assert_eq!(words, ["svn update (running)"]);
    }

    #[test]
    fn list_is_preserved() {
        let words = Words::from(vec!["svn", "update", "(running)"]);
        assert_eq!(words, ["svn", "update", "(running)"]);
        assert_eq!(words.to_string(), "svn update (running)");
    }

    #[test]
    fn deserializes_string_or_list() {
        let one: Holder = toml::from_str(r#"description = "git pull""#).unwrap();
        assert_eq!(one.description, ["git pull"]);

        let many: Holder = toml::from_str(r#"description = ["git", "pull"]"#).unwrap();
        assert_eq!(many.description, ["git", "pull"]);
    }

    #[test]
    fn rejects_other_types() {
        assert!(toml::from_str::<Holder>("description = 42").is_err());
        assert!(toml::from_str::<Holder>("description = [1, 2]").is_err());
    }

    #[test]
    fn joined_appends_in_order() {
        let words = Words::from("updating").joined(&Words::from(["lib", "extra"]));
        assert_eq!(words, ["updating", "lib", "extra"]);
    }
}
