//! Record status.
//!
//! Every document carries an `internalstatus` (set by the console that owns
//! it) and an `externalstatus` (set on behalf of the tenant). Both use the
//! same four values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Inactive,
    Archive,
    Delete,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::Active,
        RecordStatus::Inactive,
        RecordStatus::Archive,
        RecordStatus::Delete,
    ];

    pub fn value(self) -> i32 {
        match self {
            RecordStatus::Active => 1,
            RecordStatus::Inactive => 0,
            RecordStatus::Archive => -1,
            RecordStatus::Delete => -2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "inactive",
            RecordStatus::Archive => "archive",
            RecordStatus::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

/// The `:list` path segment of a paginated list route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    Status(RecordStatus),
    All,
    /// Active and inactive records.
    List,
}

impl ListFilter {
    /// Returns `None` for segments that are not a known filter; routes answer
    /// those with 404.
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "all" => Some(ListFilter::All),
            "list" => Some(ListFilter::List),
            other => RecordStatus::parse(other).map(ListFilter::Status),
        }
    }

    pub fn values(self) -> Vec<i32> {
        match self {
            ListFilter::All => vec![1, 0, -1, -2],
            ListFilter::Status(st) => vec![st.value()],
            ListFilter::List => vec![0, 1],
        }
    }
}

/// Status values matched by a list segment. Unknown segments fall back to
/// active + inactive.
pub fn match_status(list: &str) -> Vec<i32> {
    ListFilter::parse(list)
        .unwrap_or(ListFilter::List)
        .values()
}

/// Numeric value written for a status name. Unknown names mean active.
pub fn status_value(status: &str) -> i32 {
    RecordStatus::parse(status)
        .unwrap_or(RecordStatus::Active)
        .value()
}

/// Which status field a status-change request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    Internal,
    External,
}

impl StatusTarget {
    /// `None` for the plain route, `Some("ext")` for the external one. Any
    /// other segment is rejected.
    pub fn parse(segment: Option<&str>) -> Option<Self> {
        match segment {
            None => Some(StatusTarget::Internal),
            Some("ext") => Some(StatusTarget::External),
            Some(_) => None,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            StatusTarget::Internal => "internalstatus",
            StatusTarget::External => "externalstatus",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_status_known_segments() {
        assert_eq!(match_status("all"), vec![1, 0, -1, -2]);
        assert_eq!(match_status("active"), vec![1]);
        assert_eq!(match_status("inactive"), vec![0]);
        assert_eq!(match_status("archive"), vec![-1]);
        assert_eq!(match_status("delete"), vec![-2]);
        assert_eq!(match_status("list"), vec![0, 1]);
    }

    #[test]
    fn match_status_unknown_defaults_to_list() {
        assert_eq!(match_status("whatever"), vec![0, 1]);
    }

    #[test]
    fn status_value_defaults_to_active() {
        assert_eq!(status_value("inactive"), 0);
        assert_eq!(status_value("archive"), -1);
        assert_eq!(status_value("delete"), -2);
        assert_eq!(status_value("active"), 1);
        assert_eq!(status_value("bogus"), 1);
    }

    #[test]
    fn list_filter_guard() {
        assert_eq!(ListFilter::parse("all"), Some(ListFilter::All));
        assert_eq!(
            ListFilter::parse("archive"),
            Some(ListFilter::Status(RecordStatus::Archive))
        );
        assert_eq!(ListFilter::parse("recent"), None);
    }

    #[test]
    fn status_target_only_accepts_ext() {
        assert_eq!(StatusTarget::parse(None), Some(StatusTarget::Internal));
        assert_eq!(StatusTarget::parse(Some("ext")), Some(StatusTarget::External));
        assert_eq!(StatusTarget::parse(Some("int")), None);
        assert_eq!(StatusTarget::External.field(), "externalstatus");
    }
}
