//! Error types for the lot, its release pools and the user roster.
//!
//! Variants that reach users (not found, conflicts, validation) carry their
//! message in `Display`; the managers show that text verbatim.

use crate::space::SpaceKey;
use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotError>;

/// Slot-level failures of a [`ReleasePool`](crate::release::ReleasePool).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("release id {id} out of range (capacity {capacity})")]
    OutOfRange { id: usize, capacity: usize },
    #[error("release slot {0} is empty")]
    Empty(usize),
    #[error("release slot {0} is not in use")]
    NotInUse(usize),
    #[error("release not found")]
    NotFound,
}

/// Date validation of a release being authored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseDateError {
    #[error("Start date is missing")]
    MissingStart,
    #[error("Start date `{0}` is not a valid date")]
    UnparseableStart(String),
    #[error("End date is missing")]
    MissingEnd,
    #[error("End date `{0}` is not a valid date")]
    UnparseableEnd(String),
    #[error("Start date cannot be in the past")]
    StartInPast,
    #[error("End date cannot be before the start date")]
    EndBeforeStart,
}

#[derive(Debug, Error)]
pub enum LotError {
    #[error("Space {0} does not exist")]
    NotFound(SpaceKey),

    #[error("Space {key} already exists")]
    AlreadyExists { key: SpaceKey },

    #[error("Sorry, space {key} was just reserved by {by} at {}", hhmm(.at))]
    Conflict {
        key: SpaceKey,
        by: String,
        at: Option<NaiveDateTime>,
    },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("This release request is no longer open, please start again")]
    DraftNotFound(String),

    #[error("{0}")]
    Validation(#[from] ReleaseDateError),

    #[error("The release overlaps with already scheduled releases: {}", .0.join(", "))]
    Overlap(Vec<String>),

    #[error("release {id} on {key} does not belong to that space")]
    ReleaseMismatch { key: SpaceKey, id: usize },

    #[error("release {id} on {key} is missing its dates")]
    IncompleteRelease { key: SpaceKey, id: usize },

    #[error("release pool for {key}: {source}")]
    Pool {
        key: SpaceKey,
        #[source]
        source: PoolError,
    },

    #[error("failed to write snapshot `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot `{path}`")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot `{path}` is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read snapshot `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", JoinedErrors(.0))]
    Multiple(Vec<LotError>),
}

impl LotError {
    /// Storage failures end the process; everything else is reported and skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Write { .. } | Self::Encode { .. } | Self::Corrupt { .. } | Self::Read { .. } => {
                true
            }
            Self::Multiple(errors) => errors.iter().any(LotError::is_fatal),
            _ => false,
        }
    }

    pub(crate) fn pool(key: &SpaceKey, source: PoolError) -> Self {
        Self::Pool {
            key: key.clone(),
            source,
        }
    }
}

fn hhmm(at: &Option<NaiveDateTime>) -> String {
    at.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "an unknown time".to_string())
}

struct JoinedErrors<'a>(&'a [LotError]);

impl fmt::Display for JoinedErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("User {name} ({id}) already exists")]
    DuplicateUser { name: String, id: String },

    #[error("Unknown user {0}")]
    UnknownUser(String),

    #[error("failed to write users `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode users `{path}`")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("users file `{path}` is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read users `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RosterError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DuplicateUser { .. } | Self::UnknownUser(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_reserver() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        let err = LotError::Conflict {
            key: SpaceKey::from("1st floor 10"),
            by: "alice".into(),
            at: Some(at),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("just reserved"));
        assert!(msg.contains("08:05"));
    }

    #[test]
    fn multiple_is_fatal_when_any_is() {
        let err = LotError::Multiple(vec![
            LotError::NotFound(SpaceKey::from("x")),
            LotError::Write {
                path: "lot.json".into(),
                source: std::io::Error::other("disk full"),
            },
        ]);
        assert!(err.is_fatal());
        assert!(!LotError::NotFound(SpaceKey::from("x")).is_fatal());
    }
}
