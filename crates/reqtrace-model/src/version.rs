//! Projects and versions
//!
//! A [`VersionId`] is the ordered `(major, minor, revision)` triple; a
//! [`Version`] is one persisted row of a project's lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self)
            }
        }
    };
}

ulid_id!(
    /// Project storage identity
    ProjectId
);
ulid_id!(
    /// Version storage identity
    VersionUid
);
ulid_id!(
    /// Storage identity of a logical entity, stable across its revisions
    EntityId
);

/// Ordered version identifier
///
/// Field order gives the lexicographic tuple ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct VersionId {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl VersionId {
    /// Implicit baseline of a project without versions
    pub const ZERO: Self = Self::new(0, 0, 0);

    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Identifier following this one under `bump`
    ///
    /// `None` once the bumped component is at `u32::MAX`.
    #[must_use]
    pub fn next(self, bump: Bump) -> Option<Self> {
        Some(match bump {
            Bump::Major => Self::new(self.major.checked_add(1)?, 0, 0),
            Bump::Minor => Self::new(self.major, self.minor.checked_add(1)?, 0),
            Bump::Revision => Self::new(self.major, self.minor, self.revision.checked_add(1)?),
        })
    }
}

impl Display for VersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

impl FromStr for VersionId {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [major, minor, revision] = parts.as_slice() else {
            return Err(VersionParseError::Shape(s.to_string()));
        };
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| VersionParseError::Component(part.to_string()))
        };
        Ok(Self::new(parse(*major)?, parse(*minor)?, parse(*revision)?))
    }
}

/// Errors parsing `major.minor.revision`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("expected major.minor.revision, got '{0}'")]
    Shape(String),

    #[error("invalid version component '{0}'")]
    Component(String),
}

/// Which component of the identifier to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    Major,
    Minor,
    Revision,
}

impl FromStr for Bump {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "revision" => Ok(Self::Revision),
            other => Err(format!("unknown bump '{other}'")),
        }
    }
}

/// Last-updated metadata written by the commit pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    pub at: DateTime<Utc>,
    pub actor: String,
}

/// One version of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub uid: VersionUid,
    pub project: ProjectId,
    pub id: VersionId,
    pub created_at: DateTime<Utc>,
    pub stamp: Option<VersionStamp>,
}

impl Version {
    /// New, unstamped version row
    #[must_use]
    pub fn new(project: ProjectId, id: VersionId) -> Self {
        Self {
            uid: VersionUid::new(),
            project,
            id,
            created_at: Utc::now(),
            stamp: None,
        }
    }
}

/// Named container of versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    /// Accepted artifact types; empty accepts any type
    #[serde(default)]
    pub artifact_types: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            description: description.into(),
            artifact_types: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Declare an accepted artifact type
    #[must_use]
    pub fn with_artifact_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_types.insert(artifact_type.into());
        self
    }

    /// Check whether an artifact type may be committed
    #[inline]
    #[must_use]
    pub fn accepts_type(&self, artifact_type: &str) -> bool {
        self.artifact_types.is_empty() || self.artifact_types.contains(artifact_type)
    }
}
