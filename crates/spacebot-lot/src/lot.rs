//! The in-memory lot: every space of one kind plus its scheduled releases.
//!
//! Every mutating operation rewrites the JSON snapshot before it returns, so a
//! crash never loses an acknowledged reservation. Drafts are written too but are
//! dropped again on load.

use crate::cutoff::Cutoff;
use crate::error::{LotError, Result};
use crate::release::{validate_range, ReleaseInfo, ReleaseMap, ReleaseRef};
use crate::space::{floor_label, Space, SpaceKey};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which spaces a floor listing shows besides the caller's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpaceFilter {
    Free,
    Taken,
    #[default]
    Any,
}

impl SpaceFilter {
    pub fn matches(&self, space: &Space) -> bool {
        match self {
            Self::Free => !space.reserved,
            Self::Taken => space.reserved,
            Self::Any => true,
        }
    }
}

/// Someone else's reservation was cleared by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displaced {
    pub victim_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRelease {
    pub at: ReleaseRef,
    /// The release starts soon enough that the space was freed right away.
    pub released_now: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDay {
    Today,
    Tomorrow,
}

/// Result of cancelling a temporary release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The release is gone and the owner holds the space again.
    Restored { key: SpaceKey },
    /// The release is gone but another release of the space is running.
    Withdrawn { key: SpaceKey },
    /// The space is borrowed; the owner gets it back at a later cutoff.
    Deferred {
        key: SpaceKey,
        borrower: String,
        day: ReturnDay,
        cutoff: Cutoff,
    },
}

impl CancelOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Restored { key } => {
                format!("The temporary release of {key} was cancelled, the space is yours again.")
            }
            Self::Withdrawn { key } => format!(
                "The scheduled release of {key} was cancelled. The space stays released under your current release."
            ),
            Self::Deferred {
                key,
                borrower,
                day,
                cutoff,
            } => {
                let day = match day {
                    ReturnDay::Today => "today",
                    ReturnDay::Tomorrow => "tomorrow",
                };
                format!(
                    "{key} is currently used by {borrower}. The release was cancelled and the space will come back to you {day} at {cutoff}."
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpacesLot {
    pub unit_spaces: BTreeMap<SpaceKey, Space>,
    pub to_be_released: ReleaseMap,
    pub filename: PathBuf,
}

impl SpacesLot {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            unit_spaces: BTreeMap::new(),
            to_be_released: ReleaseMap::new(),
            filename: filename.into(),
        }
    }

    /// Read a snapshot, discarding drafts. A missing file yields an empty lot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "snapshot not found, starting with an empty lot");
                return Ok(Self::new(path));
            }
            Err(source) => {
                return Err(LotError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut lot: SpacesLot =
            serde_json::from_str(&raw).map_err(|source| LotError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        lot.filename = path.to_path_buf();
        let dropped = lot.to_be_released.drop_drafts();

        info!(
            path = %path.display(),
            spaces = lot.unit_spaces.len(),
            dropped_drafts = dropped,
            "lot loaded"
        );
        Ok(lot)
    }

    /// Rewrite the whole snapshot: pretty JSON into a sibling temp file, then rename.
    pub fn synchronize_to_file(&self) -> Result<()> {
        let encoded = serde_json::to_string_pretty(self).map_err(|source| LotError::Encode {
            path: self.filename.clone(),
            source,
        })?;

        let mut tmp = self.filename.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, encoded)
            .and_then(|()| fs::rename(&tmp, &self.filename))
            .map_err(|source| LotError::Write {
                path: self.filename.clone(),
                source,
            })?;
        debug!(path = %self.filename.display(), "lot snapshot written");
        Ok(())
    }

    pub fn space(&self, key: &str) -> Option<&Space> {
        self.unit_spaces.get(key)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.unit_spaces.values()
    }

    // =========================================================================
    // Space administration
    // =========================================================================

    pub fn add_space(&mut self, space: Space) -> Result<()> {
        let key = space.key();
        if self.unit_spaces.contains_key(&key) {
            return Err(LotError::AlreadyExists { key });
        }
        info!(space = %key, "space added");
        self.unit_spaces.insert(key, space);
        self.synchronize_to_file()
    }

    /// Remove a space together with every release scheduled on it.
    pub fn remove_space(&mut self, key: &str) -> Result<Space> {
        let space = self
            .unit_spaces
            .remove(key)
            .ok_or_else(|| LotError::NotFound(key.into()))?;
        self.to_be_released.remove_space(key);
        info!(space = %key, "space removed");
        self.synchronize_to_file()?;
        Ok(space)
    }

    /// Drop every release of a space. Returns how many were dropped.
    pub fn purge_releases(&mut self, key: &str) -> Result<usize> {
        let Some(pool) = self.to_be_released.remove_space(key) else {
            return Ok(0);
        };
        let purged = pool.len();
        info!(space = %key, purged, "releases purged");
        self.synchronize_to_file()?;
        Ok(purged)
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Reserve a space for `user`.
    ///
    /// Reserving a space the caller already holds succeeds without changes, which
    /// absorbs double clicks.
    pub fn reserve(
        &mut self,
        key: &str,
        user: &str,
        user_id: &str,
        auto_release: bool,
        now: NaiveDateTime,
    ) -> Result<()> {
        let space = self
            .unit_spaces
            .get_mut(key)
            .ok_or_else(|| LotError::NotFound(key.into()))?;

        if space.reserved {
            if space.reserved_by_id == user_id {
                debug!(space = %key, user_id, "space already held by caller");
                return Ok(());
            }
            return Err(LotError::Conflict {
                key: space.key(),
                by: space.reserved_by.clone(),
                at: space.reserved_time,
            });
        }

        space.reserve(user, user_id, now, auto_release);
        info!(space = %key, user, user_id, auto_release, "space reserved");
        self.synchronize_to_file()
    }

    /// Clear the reservation on a space.
    ///
    /// When the caller was not the holder, the displaced holder is returned so
    /// they can be told.
    pub fn release(&mut self, key: &str, user: &str, user_id: &str) -> Result<Option<Displaced>> {
        let space = self
            .unit_spaces
            .get_mut(key)
            .ok_or_else(|| LotError::NotFound(key.into()))?;

        let previous = space.reserved.then(|| space.reserved_by_id.clone());
        space.free();
        info!(space = %key, user, user_id, "space released");
        self.synchronize_to_file()?;

        Ok(previous
            .filter(|prev| prev != user_id && !prev.is_empty())
            .map(|victim_id| Displaced {
                victim_id,
                message: format!("{user} released your space {key}"),
            }))
    }

    pub fn has_space(&self, user_id: &str) -> bool {
        self.spaces().any(|s| s.is_held_by(user_id))
    }

    pub fn has_permanent_space(&self, user_id: &str) -> bool {
        self.spaces().any(|s| s.is_held_by(user_id) && !s.auto_release)
    }

    /// True when one of the user's spaces is currently lent out.
    pub fn has_temp_release(&self, user_id: &str) -> bool {
        self.to_be_released
            .releases()
            .any(|r| r.active && r.owner_id == user_id)
    }

    /// The space the user owns: a permanent reservation first, then the space of
    /// one of their submitted releases.
    pub fn owned_space_by_user_id(&self, user_id: &str) -> Option<&Space> {
        if let Some(space) = self
            .spaces()
            .find(|s| s.is_held_by(user_id) && !s.auto_release)
        {
            return Some(space);
        }
        self.to_be_released
            .releases()
            .filter(|r| r.submitted && r.owner_id == user_id)
            .find_map(|r| self.unit_spaces.get(r.space_key().as_str()))
    }

    /// The permanent owner of a space as `(id, name)`, looking through an active
    /// release to the lender.
    pub fn owner_of(&self, key: &str) -> Option<(String, String)> {
        if let Some(active) = self
            .to_be_released
            .get(key)
            .and_then(|pool| pool.active().ok())
        {
            return Some((active.owner_id.clone(), active.owner_name.clone()));
        }
        self.unit_spaces
            .get(key)
            .filter(|s| s.reserved && !s.auto_release)
            .map(|s| (s.reserved_by_id.clone(), s.reserved_by.clone()))
    }

    /// Spaces on `floor` (a [`floor_label`]) matching `filter`, preceded by the
    /// spaces the user holds wherever they are.
    pub fn spaces_by_floor(&self, user_id: &str, floor: &str, filter: SpaceFilter) -> Vec<&Space> {
        let (mut own, mut rest): (Vec<&Space>, Vec<&Space>) =
            self.spaces().partition(|s| s.is_held_by(user_id));
        rest.retain(|s| s.floor_label() == floor && filter.matches(s));
        own.sort_by_key(|s| s.sort_key());
        rest.sort_by_key(|s| s.sort_key());
        own.extend(rest);
        own
    }

    /// The user's spaces, then free spaces, then taken ones, each group in
    /// `(floor, number)` order.
    pub fn spaces_info(&self, user_id: &str) -> Vec<&Space> {
        let (mut own, others): (Vec<&Space>, Vec<&Space>) =
            self.spaces().partition(|s| s.is_held_by(user_id));
        let (mut free, mut taken): (Vec<&Space>, Vec<&Space>) =
            others.into_iter().partition(|s| !s.reserved);
        own.sort_by_key(|s| s.sort_key());
        free.sort_by_key(|s| s.sort_key());
        taken.sort_by_key(|s| s.sort_key());
        own.extend(free);
        own.extend(taken);
        own
    }

    /// Distinct floors, ascending, as labels.
    pub fn all_floors(&self) -> Vec<String> {
        self.spaces()
            .map(|s| s.floor)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(floor_label)
            .collect()
    }

    // =========================================================================
    // Daily tick
    // =========================================================================

    /// Apply the daily cutoff at `now`.
    ///
    /// Auto-release reservations are cleared. Per space, releases whose end date
    /// was reached within the last 24h hand the space back to the owner and are
    /// removed; then releases starting within the next 24h free the space.
    /// Errors on single releases are collected and returned together after all
    /// spaces were processed.
    pub fn release_spaces(&mut self, now: NaiveDateTime) -> Result<()> {
        let day = Duration::hours(24);
        let mut errors = Vec::new();

        for space in self.unit_spaces.values_mut() {
            if space.reserved && space.auto_release {
                debug!(space = %space.key(), user = %space.reserved_by, "auto release");
                space.free();
            }
        }

        for (key, pool) in self.to_be_released.iter_mut() {
            let Some(space) = self.unit_spaces.get_mut(key.as_str()) else {
                warn!(space = %key, "releases scheduled on unknown space");
                errors.push(LotError::NotFound(key.clone()));
                continue;
            };

            let mut finished = Vec::new();
            for info in pool.all() {
                if info.is_draft() {
                    continue;
                }
                if info.space_key() != *key {
                    errors.push(LotError::ReleaseMismatch {
                        key: key.clone(),
                        id: info.unique_id,
                    });
                    continue;
                }
                let (Some(_), Some(end)) = (info.start_time(), info.end_time()) else {
                    errors.push(LotError::IncompleteRelease {
                        key: key.clone(),
                        id: info.unique_id,
                    });
                    continue;
                };

                let since_end = now - end;
                if since_end < Duration::zero() {
                    continue;
                }
                if since_end < day || info.active {
                    if since_end >= day {
                        warn!(space = %key, id = info.unique_id, "restoring overdue release");
                    }
                    space.reserve(&info.owner_name, &info.owner_id, now, false);
                    info!(space = %key, owner = %info.owner_name, id = info.unique_id, "space returned to owner");
                } else {
                    warn!(space = %key, id = info.unique_id, "dropping release that never activated");
                }
                finished.push(info.unique_id);
            }

            for id in finished {
                if let Err(err) = pool.remove(id) {
                    errors.push(LotError::pool(key, err));
                }
            }

            for info in pool.all_mut() {
                if info.is_draft() || info.active || info.space_key() != *key {
                    continue;
                }
                let Some(start) = info.start_time() else {
                    continue;
                };
                if start - now < day {
                    space.free();
                    info.mark_active();
                    info!(space = %key, owner = %info.owner_name, id = info.unique_id, "temporary release started");
                }
            }
        }

        if let Err(err) = self.synchronize_to_file() {
            errors.push(err);
        }

        match errors.len() {
            0 => Ok(()),
            _ => {
                for err in &errors {
                    warn!(error = %err, "release tick error");
                }
                Err(LotError::Multiple(errors))
            }
        }
    }

    // =========================================================================
    // Release drafts
    // =========================================================================

    /// Open a draft release of `key` bound to the booking modal `view_id`.
    ///
    /// Only the permanent owner of the space or an admin may release it.
    pub fn start_draft(
        &mut self,
        view_id: &str,
        user: &str,
        user_id: &str,
        key: &str,
        is_admin: bool,
    ) -> Result<ReleaseRef> {
        let space = self
            .unit_spaces
            .get(key)
            .ok_or_else(|| LotError::NotFound(key.into()))?
            .clone();
        let Some((owner_id, _)) = self.owner_of(key) else {
            return Err(LotError::PermissionDenied(format!(
                "Space {key} has no permanent owner"
            )));
        };
        if owner_id != user_id && !is_admin {
            return Err(LotError::PermissionDenied(format!(
                "Only the owner of {key} can release it"
            )));
        }

        let info = self.to_be_released.add(view_id, user, user_id, &space);
        let at = ReleaseRef {
            key: space.key(),
            id: info.unique_id,
        };
        self.synchronize_to_file()?;
        Ok(at)
    }

    /// Record the release modal `view_id` opened on top of `root_view_id`.
    pub fn bind_draft_view(&mut self, root_view_id: &str, view_id: &str) -> Result<Option<ReleaseRef>> {
        let Some(at) = self
            .to_be_released
            .find_where(|r| r.is_draft() && r.root_view_id == root_view_id && r.view_id.is_empty())
        else {
            return Ok(None);
        };
        self.to_be_released
            .release_mut(&at)
            .map_err(|err| LotError::pool(&at.key, err))?
            .view_id = view_id.to_string();
        self.synchronize_to_file()?;
        Ok(Some(at))
    }

    /// Set a date picked in the release modal `view_id`.
    pub fn set_draft_date(
        &mut self,
        view_id: &str,
        field: DateField,
        date: Option<NaiveDate>,
    ) -> Result<ReleaseInfo> {
        let at = self
            .to_be_released
            .find_by_view_id(view_id)
            .ok_or_else(|| LotError::DraftNotFound(view_id.to_string()))?;
        let info = self
            .to_be_released
            .release_mut(&at)
            .map_err(|err| LotError::pool(&at.key, err))?;
        match field {
            DateField::Start => info.start_date = date,
            DateField::End => info.end_date = date,
        }
        let info = info.clone();
        self.synchronize_to_file()?;
        Ok(info)
    }

    /// Drop the draft bound to a closed view, whether it is the release modal or
    /// the booking modal underneath it.
    pub fn discard_draft(&mut self, view_id: &str) -> Result<Option<SpaceKey>> {
        let removed = self
            .to_be_released
            .find_where(|r| r.is_draft() && r.view_id == view_id)
            .or_else(|| {
                self.to_be_released
                    .find_where(|r| r.is_draft() && r.root_view_id == view_id)
            });
        let Some(at) = removed else {
            return Ok(None);
        };
        self.to_be_released
            .remove(&at)
            .map_err(|err| LotError::pool(&at.key, err))?;
        debug!(space = %at.key, view_id, "release draft discarded");
        self.synchronize_to_file()?;
        Ok(Some(at.key))
    }

    /// Submit the draft of the release modal `view_id` with the raw picker values.
    ///
    /// Invalid or overlapping dates remove the draft. A release starting today,
    /// or tomorrow once today's cutoff has passed, frees the space immediately.
    pub fn submit_release(
        &mut self,
        view_id: &str,
        start: Option<&str>,
        end: Option<&str>,
        now: NaiveDateTime,
        cutoff: Cutoff,
    ) -> Result<SubmittedRelease> {
        let at = self
            .to_be_released
            .find_by_view_id(view_id)
            .ok_or_else(|| LotError::DraftNotFound(view_id.to_string()))?;
        let today = now.date();

        let (start, end) = match validate_range(start, end, today) {
            Ok(range) => range,
            Err(err) => {
                self.drop_release(&at)?;
                return Err(err.into());
            }
        };

        let info = self
            .to_be_released
            .release_mut(&at)
            .map_err(|err| LotError::pool(&at.key, err))?;
        info.start_date = Some(start);
        info.end_date = Some(end);
        let candidate = info.clone();

        let overlaps = self.to_be_released.check_overlap(&candidate);
        if !overlaps.is_empty() {
            self.drop_release(&at)?;
            return Err(LotError::Overlap(overlaps));
        }

        let released_now =
            start == today || (Some(start) == today.succ_opt() && cutoff.has_passed(now));

        let info = self
            .to_be_released
            .release_mut(&at)
            .map_err(|err| LotError::pool(&at.key, err))?;
        info.mark_submitted();
        if released_now {
            info.mark_active();
            if let Some(space) = self.unit_spaces.get_mut(at.key.as_str()) {
                space.free();
            }
        }
        info!(
            space = %at.key,
            id = at.id,
            range = %candidate.date_range(),
            released_now,
            "temporary release submitted"
        );
        self.synchronize_to_file()?;
        Ok(SubmittedRelease { at, released_now })
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a submitted release.
    ///
    /// | state | outcome |
    /// |---|---|
    /// | not started yet, another release of the space running | removed, space left as is |
    /// | not started yet | removed, owner restored |
    /// | started, space free or held by the owner | removed, owner restored |
    /// | started, borrowed, before cutoff | end moved to today, returns at today's cutoff |
    /// | started, borrowed, after cutoff | end moved to tomorrow, returns at tomorrow's cutoff |
    pub fn cancel_release(
        &mut self,
        at: &ReleaseRef,
        user_id: &str,
        is_admin: bool,
        now: NaiveDateTime,
        cutoff: Cutoff,
    ) -> Result<CancelOutcome> {
        let info = self
            .to_be_released
            .release(at)
            .map_err(|err| LotError::pool(&at.key, err))?
            .clone();
        if info.owner_id != user_id && !is_admin {
            return Err(LotError::PermissionDenied(format!(
                "Only {} can cancel this release",
                info.owner_name
            )));
        }
        let start = info.start_time().ok_or_else(|| LotError::IncompleteRelease {
            key: at.key.clone(),
            id: at.id,
        })?;
        let space = self
            .unit_spaces
            .get_mut(at.key.as_str())
            .ok_or_else(|| LotError::NotFound(at.key.clone()))?;

        let borrowed = space.reserved && space.reserved_by_id != info.owner_id;
        let not_started = start > now && !info.active;

        let outcome = if not_started || !borrowed {
            self.to_be_released
                .remove(at)
                .map_err(|err| LotError::pool(&at.key, err))?;
            let running = self
                .to_be_released
                .get(at.key.as_str())
                .is_some_and(|pool| pool.active().is_ok());
            if running {
                CancelOutcome::Withdrawn {
                    key: at.key.clone(),
                }
            } else {
                space.reserve(&info.owner_name, &info.owner_id, now, false);
                CancelOutcome::Restored {
                    key: at.key.clone(),
                }
            }
        } else {
            let (until, day) = if cutoff.has_passed(now) {
                (now.date().succ_opt().unwrap_or(now.date()), ReturnDay::Tomorrow)
            } else {
                (now.date(), ReturnDay::Today)
            };
            let release = self
                .to_be_released
                .release_mut(at)
                .map_err(|err| LotError::pool(&at.key, err))?;
            release.end_date = Some(until);
            release.mark_cancelled();
            CancelOutcome::Deferred {
                key: at.key.clone(),
                borrower: space.reserved_by.clone(),
                day,
                cutoff,
            }
        };

        info!(space = %at.key, id = at.id, user_id, ?outcome, "temporary release cancelled");
        self.synchronize_to_file()?;
        Ok(outcome)
    }

    fn drop_release(&mut self, at: &ReleaseRef) -> Result<()> {
        self.to_be_released
            .remove(at)
            .map_err(|err| LotError::pool(&at.key, err))?;
        self.synchronize_to_file()
    }
}
