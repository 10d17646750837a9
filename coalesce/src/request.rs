use coalesce_core::Subject;
use thiserror::Error;

/// Maximum number of raw entries accepted in one batch.
pub const MAX_SUBJECTS: usize = 100;

/// Malformed lookup requests. Rejected before any cache or origin work.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The subject list was empty.
    #[error("no subjects provided")]
    Empty,
    /// The subject list exceeded the per-request cap.
    #[error("too many subjects (max {max}, got {got})")]
    TooMany {
        /// The cap.
        max: usize,
        /// Number of raw entries received.
        got: usize,
    },
    /// Every entry was blank.
    #[error("no valid subjects provided")]
    NoValidSubjects,
}

impl RequestError {
    /// Stable machine readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty_request",
            Self::TooMany { .. } => "too_many_subjects",
            Self::NoValidSubjects => "no_valid_subjects",
        }
    }
}

/// A normalized, non-empty list of subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectBatch(Vec<Subject>);

impl SubjectBatch {
    /// Normalize raw identifiers.
    ///
    /// The cap applies to the raw list, before blank entries are dropped.
    /// Remaining entries are trimmed and kept in their original order;
    /// duplicates are kept too.
    pub fn parse<I, S>(raw: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<S> = raw.into_iter().collect();
        if raw.is_empty() {
            return Err(RequestError::Empty);
        }
        if raw.len() > MAX_SUBJECTS {
            return Err(RequestError::TooMany {
                max: MAX_SUBJECTS,
                got: raw.len(),
            });
        }

        let subjects: Vec<Subject> = raw
            .iter()
            .filter_map(|id| Subject::parse(id.as_ref()))
            .collect();
        if subjects.is_empty() {
            return Err(RequestError::NoValidSubjects);
        }
        Ok(Self(subjects))
    }

    /// The subjects, in request order.
    pub fn subjects(&self) -> &[Subject] {
        &self.0
    }

    /// Number of subjects.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch holds no subjects.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the batch.
    pub fn into_inner(self) -> Vec<Subject> {
        self.0
    }
}

impl AsRef<[Subject]> for SubjectBatch {
    fn as_ref(&self) -> &[Subject] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_drops_blank_entries() {
        let batch = SubjectBatch::parse([" a ", "", "b", "  "]).unwrap();
        let ids: Vec<_> = batch.subjects().iter().map(Subject::as_str).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn rejects_empty_and_blank_lists() {
        assert_eq!(
            SubjectBatch::parse(Vec::<String>::new()),
            Err(RequestError::Empty)
        );
        assert_eq!(
            SubjectBatch::parse(["", " \t"]),
            Err(RequestError::NoValidSubjects)
        );
    }

    #[test]
    fn cap_counts_raw_entries() {
        let mut raw = vec![String::new(); MAX_SUBJECTS];
        raw.push("a".into());
        assert_eq!(
            SubjectBatch::parse(raw),
            Err(RequestError::TooMany { max: 100, got: 101 })
        );

        let raw = vec!["a".to_string(); MAX_SUBJECTS];
        assert_eq!(SubjectBatch::parse(raw).map(|b| b.len()), Ok(100));
    }
}
