//! Keys written to external caches.
//!
//! Every key carries a namespace prefix so that balance mirrors and credential
//! verdicts can share one Redis database:
//!
//! ```
//! use coalesce_core::{CacheKey, Subject};
//!
//! let key = CacheKey::balance(&Subject::from("wallet"));
//! assert_eq!(key.to_string(), "balance:wallet");
//!
//! let key = CacheKey::credential("secret");
//! assert_eq!(key.to_string(), "api_key:secret");
//! ```

use std::fmt;

use smol_str::SmolStr;

use crate::Subject;

const BALANCE_PREFIX: &str = "balance";
const CREDENTIAL_PREFIX: &str = "api_key";

/// A namespaced cache key, rendered as `{prefix}:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: SmolStr,
    id: SmolStr,
}

impl CacheKey {
    /// Creates a key from an arbitrary prefix and identifier.
    pub fn new(prefix: impl Into<SmolStr>, id: impl Into<SmolStr>) -> Self {
        Self {
            prefix: prefix.into(),
            id: id.into(),
        }
    }

    /// Key under which a resolved subject value is mirrored.
    pub fn balance(subject: &Subject) -> Self {
        Self::new(SmolStr::new_static(BALANCE_PREFIX), subject.as_str())
    }

    /// Key under which a credential verdict is shared between processes.
    pub fn credential(token: &str) -> Self {
        Self::new(SmolStr::new_static(CREDENTIAL_PREFIX), token)
    }

    /// Returns the namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the identifier part.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.id)
        } else {
            write!(f, "{}:{}", self.prefix, self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_renders_bare_id() {
        assert_eq!(CacheKey::new("", "plain").to_string(), "plain");
    }

    #[test]
    fn keys_with_same_parts_are_equal() {
        let subject = Subject::from("abc");
        assert_eq!(CacheKey::balance(&subject), CacheKey::new("balance", "abc"));
        assert_ne!(CacheKey::balance(&subject), CacheKey::credential("abc"));
    }
}
