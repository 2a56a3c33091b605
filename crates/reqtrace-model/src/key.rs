//! Business keys
//!
//! Stable, caller-visible identities for logical entities. A key never changes
//! once its entity exists; storage identity is tracked separately by
//! [`EntityId`](crate::EntityId).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Maximum artifact name length in bytes
pub const MAX_KEY_LEN: usize = 512;

/// Artifact business key (the artifact name)
///
/// Surrounding whitespace is trimmed; the remainder must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Create a key from an artifact name
    ///
    /// # Errors
    /// Returns error if the trimmed name is empty or too long
    pub fn new(name: impl AsRef<str>) -> Result<Self, KeyError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        if trimmed.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong {
                max: MAX_KEY_LEN,
                actual: trimmed.len(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Name as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trace-link business key: an unordered pair of artifact keys
///
/// `A -> B` and `B -> A` name the same logical link. The pair is stored
/// normalized (`low <= high`); link direction lives on the revision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "(String, String)", into = "(String, String)")]
pub struct TraceKey {
    low: ArtifactKey,
    high: ArtifactKey,
}

impl TraceKey {
    /// Create a key from two endpoints in either order
    #[must_use]
    pub fn new(a: ArtifactKey, b: ArtifactKey) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Parse both endpoint names
    ///
    /// # Errors
    /// Returns error if either name is not a valid artifact key
    pub fn parse(a: impl AsRef<str>, b: impl AsRef<str>) -> Result<Self, KeyError> {
        Ok(Self::new(ArtifactKey::new(a)?, ArtifactKey::new(b)?))
    }

    /// Both endpoints, lower first
    #[inline]
    #[must_use]
    pub fn endpoints(&self) -> (&ArtifactKey, &ArtifactKey) {
        (&self.low, &self.high)
    }

    /// Check whether the link touches an artifact
    #[inline]
    #[must_use]
    pub fn touches(&self, artifact: &ArtifactKey) -> bool {
        &self.low == artifact || &self.high == artifact
    }

    /// Check whether both endpoints are the same artifact
    #[inline]
    #[must_use]
    pub fn is_self_link(&self) -> bool {
        self.low == self.high
    }
}

impl Display for TraceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.low, self.high)
    }
}

impl TryFrom<(String, String)> for TraceKey {
    type Error = KeyError;

    fn try_from((a, b): (String, String)) -> Result<Self, Self::Error> {
        Self::parse(a, b)
    }
}

impl From<TraceKey> for (String, String) {
    fn from(key: TraceKey) -> Self {
        (key.low.0, key.high.0)
    }
}

/// Errors constructing business keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum KeyError {
    /// Name empty after trimming
    #[error("key is empty")]
    Empty,

    /// Name exceeds the length limit
    #[error("key too long: {actual} bytes (max {max})")]
    TooLong { max: usize, actual: usize },
}
