use crate::error::ReleaseDateError;
use crate::space::{Space, SpaceKey};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date format used by the release modal pickers and in range strings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A scheduled temporary handover of a permanently owned space.
///
/// Lifecycle: draft (`submitted == false`, view ids set) -> submitted -> active -> removed.
/// `cancelled` marks an active release whose end was pulled forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseInfo {
    pub unique_id: usize,
    #[serde(default)]
    pub root_view_id: String,
    #[serde(default)]
    pub view_id: String,
    pub releaser_id: String,
    pub owner_id: String,
    pub owner_name: String,
    /// Copy of the space taken when the release was created. It goes stale;
    /// resolve the live space through [`ReleaseInfo::space_key`].
    pub space: Space,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl ReleaseInfo {
    pub(crate) fn draft(
        unique_id: usize,
        view_id: &str,
        releaser_id: &str,
        owner_id: &str,
        owner_name: &str,
        space: &Space,
    ) -> Self {
        Self {
            unique_id,
            root_view_id: view_id.to_string(),
            view_id: String::new(),
            releaser_id: releaser_id.to_string(),
            owner_id: owner_id.to_string(),
            owner_name: owner_name.to_string(),
            space: space.clone(),
            start_date: None,
            end_date: None,
            submitted: false,
            active: false,
            cancelled: false,
        }
    }

    pub fn space_key(&self) -> SpaceKey {
        self.space.key()
    }

    pub fn is_draft(&self) -> bool {
        !self.submitted
    }

    /// Finalize a draft: the view correlation ids are no longer needed.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
        self.root_view_id.clear();
        self.view_id.clear();
    }

    pub fn mark_active(&mut self) {
        self.active = true;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Local midnight at the start of the release.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_date.map(|d| d.and_time(NaiveTime::MIN))
    }

    /// Local midnight at the start of the end date.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.end_date.map(|d| d.and_time(NaiveTime::MIN))
    }

    /// `"2025-02-10 -> 2025-02-20"`, with `?` for unset dates.
    pub fn date_range(&self) -> String {
        let fmt = |d: Option<NaiveDate>| {
            d.map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        format!("{} -> {}", fmt(self.start_date), fmt(self.end_date))
    }

    /// Validate the dates picked so far against `today`.
    pub fn check(&self, today: NaiveDate) -> Result<(), ReleaseDateError> {
        let start = self.start_date.ok_or(ReleaseDateError::MissingStart)?;
        let end = self.end_date.ok_or(ReleaseDateError::MissingEnd)?;
        if start < today {
            return Err(ReleaseDateError::StartInPast);
        }
        if end < start {
            return Err(ReleaseDateError::EndBeforeStart);
        }
        Ok(())
    }

    /// True when this release intersects `other` by any of the boundary rules.
    ///
    /// Touching at a single date counts as overlapping.
    pub fn overlaps(&self, other: &ReleaseInfo) -> bool {
        let (Some(start), Some(end), Some(o_start), Some(o_end)) = (
            self.start_date,
            self.end_date,
            other.start_date,
            other.end_date,
        ) else {
            return false;
        };

        let shares_endpoint =
            start == o_start || end == o_end || start == o_end || end == o_start;
        let left = start < o_start && o_start < end && end < o_end;
        let right = o_start < start && start < o_end && o_end < end;
        let inside = o_start < start && start <= end && end < o_end;
        let outside = start < o_start && o_start <= o_end && o_end < end;

        shares_endpoint || left || right || inside || outside
    }
}

/// Validate the raw picker values of a release submission against `today`.
pub fn validate_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ReleaseDateError> {
    let start = match start.map(str::trim).filter(|s| !s.is_empty()) {
        None => return Err(ReleaseDateError::MissingStart),
        Some(raw) => parse_date(raw)
            .ok_or_else(|| ReleaseDateError::UnparseableStart(raw.to_string()))?,
    };
    let end = match end.map(str::trim).filter(|s| !s.is_empty()) {
        None => return Err(ReleaseDateError::MissingEnd),
        Some(raw) => parse_date(raw)
            .ok_or_else(|| ReleaseDateError::UnparseableEnd(raw.to_string()))?,
    };
    if start < today {
        return Err(ReleaseDateError::StartInPast);
    }
    if end < start {
        return Err(ReleaseDateError::EndBeforeStart);
    }
    Ok((start, end))
}

/// Parse a picker date (`YYYY-MM-DD`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}
