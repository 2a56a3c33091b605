//! Structural fingerprints
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest over the fields that
//! define structural equality for an entity kind. Two revisions are
//! "attribute-equal" exactly when their fingerprints match; storage identity
//! never takes part.

/// A 32-byte content hash (Blake3)
///
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Start a field-wise fingerprint under a domain tag
    #[inline]
    #[must_use]
    pub fn fingerprint(domain: &str) -> FingerprintBuilder {
        FingerprintBuilder::new(domain)
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

/// Incremental fingerprint over length-prefixed fields
///
/// Length prefixes keep `("ab", "c")` and `("a", "bc")` distinct.
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
}

impl FingerprintBuilder {
    fn new(domain: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(&[0]);
        Self { hasher }
    }

    /// Feed a byte field
    #[must_use]
    pub fn bytes(mut self, field: &[u8]) -> Self {
        self.hasher.update(&(field.len() as u64).to_le_bytes());
        self.hasher.update(field);
        self
    }

    /// Feed a string field
    #[must_use]
    pub fn text(self, field: &str) -> Self {
        self.bytes(field.as_bytes())
    }

    /// Feed a float field; `-0.0` and `0.0` hash identically
    #[must_use]
    pub fn number(self, field: f64) -> Self {
        let normalized = if field == 0.0 { 0.0_f64 } else { field };
        self.bytes(&normalized.to_bits().to_le_bytes())
    }

    /// Finish and produce the hash
    #[must_use]
    pub fn finish(self) -> ContentHash {
        ContentHash(*self.hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = ContentHash::fingerprint("t").text("body").finish();
        let b = ContentHash::fingerprint("t").text("body").finish();
        let c = ContentHash::fingerprint("t").text("other").finish();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_fields_are_length_prefixed() {
        let a = ContentHash::fingerprint("t").text("ab").text("c").finish();
        let b = ContentHash::fingerprint("t").text("a").text("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_domain_separates_kinds() {
        let a = ContentHash::fingerprint("artifact").text("x").finish();
        let b = ContentHash::fingerprint("trace").text("x").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_treats_signed_zero_alike() {
        let a = ContentHash::fingerprint("s").number(0.0).finish();
        let b = ContentHash::fingerprint("s").number(-0.0).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn short_is_sixteen_hex_chars() {
        let short = ContentHash::fingerprint("s").text("x").finish().short();
        assert_eq!(short.len(), 16);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
