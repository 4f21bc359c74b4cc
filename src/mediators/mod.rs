//! Mediators between transformation models and the document store.
//!
//! A mediator owns the document shaping for one dataset shape: it extracts a
//! tabular structure from a model, persists it across the data collection,
//! the coordinate index, and the metadata/summary documents, and can rebuild
//! the structure from those documents again.

pub mod grid_mediator;
pub mod point_mediator;

pub use grid_mediator::GridMediator;
pub use point_mediator::PointMediator;

use chrono::NaiveDateTime;

/// Selects data documents by their timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeQuery {
    pub at: Option<NaiveDateTime>,
    pub from: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
}

impl TimeQuery {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches exactly one timestamp.
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            at: Some(timestamp),
            ..Self::default()
        }
    }

    pub fn matches(&self, timestamp: NaiveDateTime) -> bool {
        if let Some(at) = self.at {
            return timestamp == at;
        }
        if let Some(from) = self.from {
            if timestamp < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > until {
                return false;
            }
        }
        true
    }
}

/// What a save wrote, for console reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub written: usize,
    /// Documents skipped because their key already existed.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, crate::ISO_8601).unwrap()
    }

    #[test]
    fn test_time_query_matching() {
        let all = TimeQuery::all();
        assert!(all.matches(t("2004-06-30T00:00:00")));

        let at = TimeQuery::at(t("2004-06-30T03:00:00"));
        assert!(at.matches(t("2004-06-30T03:00:00")));
        assert!(!at.matches(t("2004-06-30T06:00:00")));

        let range = TimeQuery {
            from: Some(t("2004-06-30T00:00:00")),
            until: Some(t("2004-06-30T06:00:00")),
            at: None,
        };
        assert!(range.matches(t("2004-06-30T03:00:00")));
        assert!(!range.matches(t("2004-06-30T09:00:00")));
    }
}
