//! Entity kinds and revisions
//!
//! Defines the [`EntityKind`] trait that ties a business key type, an
//! attribute type and a structural-equality fingerprint together. The trait
//! is **sealed**: the two kinds of the traceability model are
//! [`ArtifactKind`] and [`TraceKind`].

use crate::hash::ContentHash;
use crate::key::{ArtifactKey, KeyError, TraceKey};
use crate::version::{EntityId, VersionId, VersionUid};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;

/// Trait for versioned entity kinds
///
/// # Contract
/// - `key` is derived from attributes and never changes across revisions
/// - `fingerprint` covers exactly the fields that define "modified"
/// - `validate` checks structural validity only; project-level rules live in
///   the commit pipeline
pub trait EntityKind: Send + Sync + 'static + Debug + private::Sealed {
    /// Business key
    type Key: Clone + Ord + Hash + Debug + Display + Send + Sync + Serialize + DeserializeOwned;

    /// Mutable per-revision state
    type Attributes: Clone + PartialEq + Debug + Send + Sync + Serialize + DeserializeOwned;

    /// Kind tag used in errors and notifications
    const TAG: EntityKindTag;

    /// Derive the business key
    ///
    /// # Errors
    /// Returns an issue if the key fields are missing or malformed
    fn key(attributes: &Self::Attributes) -> Result<Self::Key, ValidationIssue>;

    /// Structural fingerprint
    fn fingerprint(attributes: &Self::Attributes) -> ContentHash;

    /// Validate required fields
    ///
    /// # Errors
    /// Returns the first issue found
    fn validate(attributes: &Self::Attributes) -> Result<(), ValidationIssue> {
        Self::key(attributes).map(|_| ())
    }
}

/// Sealed trait - prevents external implementations
#[doc(hidden)]
pub mod private {
    /// Sealed trait marker
    pub trait Sealed {}
}

/// Entity kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKindTag {
    Artifact,
    Trace,
}

impl Display for EntityKindTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact => f.write_str("artifact"),
            Self::Trace => f.write_str("trace"),
        }
    }
}

/// Structural problem with one entity of a change set
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "issue", content = "detail", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Required field absent or blank
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Business key malformed
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Artifact type not declared by the project
    #[error("artifact type '{0}' is not declared by the project")]
    UndeclaredType(String),

    /// Score outside `[0, 1]` or not finite
    #[error("score {0} outside [0, 1]")]
    ScoreOutOfRange(f64),

    /// Link from an artifact to itself
    #[error("trace links '{0}' to itself")]
    SelfLink(ArtifactKey),

    /// Endpoint is not live in the destination version
    #[error("trace endpoint '{0}' does not exist")]
    UnresolvedEndpoint(ArtifactKey),

    /// Update of a trace whose endpoint is removed by the same commit
    #[error("trace endpoint '{0}' is removed in this commit")]
    EndpointRemoved(ArtifactKey),

    /// Add of a key that is already live
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// Update or remove of a key that is not live
    #[error("'{0}' does not exist")]
    NotFound(String),

    /// Same key listed more than once in one change set
    #[error("'{0}' is listed more than once")]
    Duplicate(String),
}

impl ValidationIssue {
    /// Artifact key this issue is about, if any
    #[must_use]
    pub fn artifact(&self) -> Option<&ArtifactKey> {
        match self {
            Self::SelfLink(key) | Self::UnresolvedEndpoint(key) | Self::EndpointRemoved(key) => {
                Some(key)
            }
            _ => None,
        }
    }
}

/// Artifact attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub artifact_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: String,
}

impl ArtifactRecord {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_type: artifact_type.into(),
            summary: String::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// How a trace link came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceType {
    /// Authored by a user
    #[default]
    Manual,
    /// Produced by a scoring collaborator
    Generated,
}

/// Review state of a trace link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    #[default]
    Unreviewed,
    Declined,
}

impl ApprovalStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Unreviewed => "unreviewed",
            Self::Declined => "declined",
        }
    }
}

/// Trace link attributes
///
/// `percentile` and `visible` are derived by ranking and suppression; they do
/// not take part in structural equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLink {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub trace_type: TraceType,
    #[serde(default = "default_score")]
    pub score: f64,
    #[serde(default)]
    pub approval: ApprovalStatus,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_score() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl TraceLink {
    /// Manual, approved link with full score
    #[must_use]
    pub fn manual(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            trace_type: TraceType::Manual,
            score: 1.0,
            approval: ApprovalStatus::Approved,
            explanation: String::new(),
            percentile: None,
            visible: true,
        }
    }

    /// Unreviewed link from the scoring collaborator
    #[must_use]
    pub fn generated(source: impl Into<String>, target: impl Into<String>, score: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            trace_type: TraceType::Generated,
            score,
            approval: ApprovalStatus::Unreviewed,
            explanation: String::new(),
            percentile: None,
            visible: true,
        }
    }

    #[must_use]
    pub fn with_approval(mut self, approval: ApprovalStatus) -> Self {
        self.approval = approval;
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Parsed source key
    ///
    /// # Errors
    /// Returns error if the source name is blank
    pub fn source_key(&self) -> Result<ArtifactKey, KeyError> {
        ArtifactKey::new(&self.source)
    }

    /// Parsed target key
    ///
    /// # Errors
    /// Returns error if the target name is blank
    pub fn target_key(&self) -> Result<ArtifactKey, KeyError> {
        ArtifactKey::new(&self.target)
    }

    /// Check whether the link was produced by the scoring collaborator
    #[inline]
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.trace_type == TraceType::Generated
    }
}

/// Artifact entity kind
#[derive(Debug, Clone, Copy)]
pub struct ArtifactKind;

impl private::Sealed for ArtifactKind {}

impl EntityKind for ArtifactKind {
    type Key = ArtifactKey;
    type Attributes = ArtifactRecord;

    const TAG: EntityKindTag = EntityKindTag::Artifact;

    fn key(attributes: &ArtifactRecord) -> Result<ArtifactKey, ValidationIssue> {
        if attributes.name.trim().is_empty() {
            return Err(ValidationIssue::MissingField("name".to_string()));
        }
        Ok(ArtifactKey::new(&attributes.name)?)
    }

    fn fingerprint(attributes: &ArtifactRecord) -> ContentHash {
        ContentHash::fingerprint("artifact")
            .text(&attributes.artifact_type)
            .text(&attributes.summary)
            .text(&attributes.body)
            .finish()
    }

    fn validate(attributes: &ArtifactRecord) -> Result<(), ValidationIssue> {
        Self::key(attributes)?;
        if attributes.artifact_type.trim().is_empty() {
            return Err(ValidationIssue::MissingField("artifact_type".to_string()));
        }
        Ok(())
    }
}

/// Trace-link entity kind
#[derive(Debug, Clone, Copy)]
pub struct TraceKind;

impl private::Sealed for TraceKind {}

impl EntityKind for TraceKind {
    type Key = TraceKey;
    type Attributes = TraceLink;

    const TAG: EntityKindTag = EntityKindTag::Trace;

    fn key(attributes: &TraceLink) -> Result<TraceKey, ValidationIssue> {
        if attributes.source.trim().is_empty() {
            return Err(ValidationIssue::MissingField("source".to_string()));
        }
        if attributes.target.trim().is_empty() {
            return Err(ValidationIssue::MissingField("target".to_string()));
        }
        Ok(TraceKey::new(attributes.source_key()?, attributes.target_key()?))
    }

    fn fingerprint(attributes: &TraceLink) -> ContentHash {
        ContentHash::fingerprint("trace")
            .number(attributes.score)
            .text(attributes.approval.as_str())
            .text(&attributes.explanation)
            .finish()
    }

    fn validate(attributes: &TraceLink) -> Result<(), ValidationIssue> {
        let key = Self::key(attributes)?;
        if key.is_self_link() {
            return Err(ValidationIssue::SelfLink(key.endpoints().0.clone()));
        }
        if !attributes.score.is_finite() || !(0.0..=1.0).contains(&attributes.score) {
            return Err(ValidationIssue::ScoreOutOfRange(attributes.score));
        }
        Ok(())
    }
}

/// State of one entity in one version
///
/// # Invariants
/// - `key == K::key(&attributes)`
/// - never mutated once recorded
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Revision<K: EntityKind> {
    pub entity_id: EntityId,
    pub key: K::Key,
    pub version: VersionUid,
    pub version_id: VersionId,
    pub attributes: K::Attributes,
}

impl<K: EntityKind> Revision<K> {
    #[must_use]
    pub fn new(
        entity_id: EntityId,
        key: K::Key,
        version: VersionUid,
        version_id: VersionId,
        attributes: K::Attributes,
    ) -> Self {
        Self {
            entity_id,
            key,
            version,
            version_id,
            attributes,
        }
    }

    /// Structural fingerprint of the attributes
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        K::fingerprint(&self.attributes)
    }

    /// Structural equality, ignoring storage identity and version
    #[inline]
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    /// Same entity and attributes, re-addressed to another version
    #[must_use]
    pub fn carried_to(&self, version: VersionUid, version_id: VersionId) -> Self {
        Self {
            entity_id: self.entity_id,
            key: self.key.clone(),
            version,
            version_id,
            attributes: self.attributes.clone(),
        }
    }
}

impl<K: EntityKind> Clone for Revision<K> {
    fn clone(&self) -> Self {
        Self {
            entity_id: self.entity_id,
            key: self.key.clone(),
            version: self.version,
            version_id: self.version_id,
            attributes: self.attributes.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for Revision<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
            && self.key == other.key
            && self.version == other.version
            && self.version_id == other.version_id
            && self.attributes == other.attributes
    }
}

impl<K: EntityKind> Debug for Revision<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("kind", &K::TAG)
            .field("entity_id", &self.entity_id)
            .field("key", &self.key)
            .field("version_id", &self.version_id)
            .field("attributes", &self.attributes)
            .finish()
    }
}
