//! Per-codebase source snapshots recorded on a build

use serde::{Deserialize, Serialize};

/// Branch/revision/patch snapshot for one codebase of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    #[serde(default)]
    pub codebase: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub patch: Option<Patch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
}

impl SourceStamp {
    /// Create an empty stamp for a codebase
    #[must_use]
    pub fn new(codebase: impl Into<String>) -> Self {
        Self {
            codebase: codebase.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    #[must_use]
    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }

    #[must_use]
    pub fn with_change(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }
}

/// Opaque patch applied after checkout. The body is never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Strip level handed to the patch tool
    #[serde(default = "default_patch_level")]
    pub level: u32,
    #[serde(with = "text_or_bytes")]
    pub body: Vec<u8>,
    /// Directory, relative to the workdir, the patch applies in
    #[serde(default)]
    pub subdir: Option<String>,
}

impl Patch {
    #[must_use]
    pub fn new(level: u32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            level,
            body: body.into(),
            subdir: None,
        }
    }

    /// Body as text, replacing invalid UTF-8 sequences
    #[must_use]
    pub fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn default_patch_level() -> u32 {
    1
}

/// A change that contributed to the build's source stamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Change {
    #[must_use]
    pub fn at_revision(revision: impl Into<String>) -> Self {
        Self {
            revision: Some(revision.into()),
            ..Self::default()
        }
    }
}

// Patch bodies are written as text in build files but may carry raw bytes.
mod text_or_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Body {
        Text(String),
        Bytes(Vec<u8>),
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(body: &Vec<u8>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match std::str::from_utf8(body) {
            Ok(text) => s.serialize_str(text),
            Err(_) => s.serialize_bytes(body),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Body::deserialize(deserializer)? {
            Body::Text(text) => text.into_bytes(),
            Body::Bytes(bytes) => bytes,
        })
    }
}
