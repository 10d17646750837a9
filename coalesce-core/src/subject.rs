//! Lookup subjects and client identities.
//!
//! Both types are thin [`SmolStr`] newtypes: account addresses and IP
//! addresses fit in the inline representation, so cloning them while fanning
//! out a batch does not allocate.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifier of a value resolved through the origin, e.g. an account address.
///
/// A subject is always trimmed and never empty when built through
/// [`Subject::parse`].
///
/// # Example
///
/// ```
/// use coalesce_core::Subject;
///
/// let subject = Subject::parse("  7xLk17EQQ5KLDLDe44wCmupJKJjTGd8hs3eSVVhCx932 ").unwrap();
/// assert_eq!(subject.as_str(), "7xLk17EQQ5KLDLDe44wCmupJKJjTGd8hs3eSVVhCx932");
/// assert!(Subject::parse("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(SmolStr);

impl Subject {
    /// Creates a subject from an already normalized identifier.
    #[inline]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Trims surrounding whitespace and returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(SmolStr::new(trimmed)))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Subject {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Subject {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Identity a rate limit is accounted against.
///
/// The HTTP boundary derives it from the peer address; tests and benches use
/// arbitrary labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(SmolStr);

impl ClientIdentity {
    /// Creates an identity from an arbitrary label.
    #[inline]
    pub fn new(label: impl Into<SmolStr>) -> Self {
        Self(label.into())
    }

    /// Returns the identity as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientIdentity {
    fn from(addr: IpAddr) -> Self {
        Self(SmolStr::from(addr.to_string()))
    }
}

impl From<&str> for ClientIdentity {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
