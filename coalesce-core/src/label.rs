//! Names of external caches as they appear in logs and metrics.

use std::fmt;

use smol_str::SmolStr;

/// Name of an external cache, e.g. `redis` or `memory`.
///
/// ```
/// use coalesce_core::BackendLabel;
///
/// let label: BackendLabel = "redis".into();
/// assert_eq!(label.to_string(), "redis");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BackendLabel(SmolStr);

impl BackendLabel {
    /// Label from any string.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// Label from a literal, usable in `const` context.
    pub const fn new_static(name: &'static str) -> Self {
        Self(SmolStr::new_static(name))
    }

    /// The label text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for BackendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for BackendLabel {
    fn from(name: &'static str) -> Self {
        Self::new_static(name)
    }
}

impl From<String> for BackendLabel {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
