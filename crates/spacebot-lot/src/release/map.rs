use super::info::ReleaseInfo;
use super::pool::ReleasePool;
use crate::error::PoolError;
use crate::space::{Space, SpaceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Releases indexed by the space they lend out, one pool per space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseMap {
    pools: BTreeMap<SpaceKey, ReleasePool>,
}

/// Where a release lives: its space and its slot in that space's pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseRef {
    pub key: SpaceKey,
    pub id: usize,
}

impl ReleaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a draft release of `space`, bound to the modal `view_id`.
    ///
    /// The owner is inherited from the active release when there is one: the space
    /// may currently be held by a borrower, who must not become the owner of a
    /// chained release.
    pub fn add(
        &mut self,
        view_id: &str,
        releaser_name: &str,
        releaser_id: &str,
        space: &Space,
    ) -> &mut ReleaseInfo {
        let pool = self.pools.entry(space.key()).or_default();
        let (owner_id, owner_name) = match pool.active() {
            Ok(active) => (active.owner_id.clone(), active.owner_name.clone()),
            Err(_) => (space.reserved_by_id.clone(), space.reserved_by.clone()),
        };
        tracing::debug!(
            space = %space.key(),
            releaser = releaser_name,
            owner = %owner_name,
            "release draft created"
        );
        pool.add(view_id, releaser_id, &owner_id, &owner_name, space)
    }

    pub fn get(&self, key: &str) -> Option<&ReleasePool> {
        self.pools.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ReleasePool> {
        self.pools.get_mut(key)
    }

    pub fn release(&self, at: &ReleaseRef) -> Result<&ReleaseInfo, PoolError> {
        self.pools
            .get(at.key.as_str())
            .ok_or(PoolError::NotFound)?
            .by_idx(at.id)
    }

    pub fn release_mut(&mut self, at: &ReleaseRef) -> Result<&mut ReleaseInfo, PoolError> {
        self.pools
            .get_mut(at.key.as_str())
            .ok_or(PoolError::NotFound)?
            .by_idx_mut(at.id)
    }

    pub fn remove(&mut self, at: &ReleaseRef) -> Result<ReleaseInfo, PoolError> {
        self.pools
            .get_mut(at.key.as_str())
            .ok_or(PoolError::NotFound)?
            .remove(at.id)
    }

    /// Drop the whole pool of a space.
    pub fn remove_space(&mut self, key: &str) -> Option<ReleasePool> {
        self.pools.remove(key)
    }

    /// Date ranges of submitted releases on the same space that collide with `release`.
    pub fn check_overlap(&self, release: &ReleaseInfo) -> Vec<String> {
        let Some(pool) = self.pools.get(release.space_key().as_str()) else {
            return Vec::new();
        };
        pool.all()
            .filter(|other| other.submitted && other.unique_id != release.unique_id)
            .filter(|other| release.overlaps(other))
            .map(ReleaseInfo::date_range)
            .collect()
    }

    /// Locate the draft whose release modal is `view_id`.
    pub fn find_by_view_id(&self, view_id: &str) -> Option<ReleaseRef> {
        self.find(|pool| pool.by_view_id(view_id))
    }

    /// Locate the draft pushed on top of the booking modal `root_view_id`.
    pub fn find_by_root_view_id(&self, root_view_id: &str) -> Option<ReleaseRef> {
        self.find(|pool| pool.by_root_view_id(root_view_id))
    }

    /// First release, in key order, matching `pred`.
    pub fn find_where(&self, pred: impl Fn(&ReleaseInfo) -> bool) -> Option<ReleaseRef> {
        self.pools.iter().find_map(|(key, pool)| {
            pool.all().find(|r| pred(r)).map(|info| ReleaseRef {
                key: key.clone(),
                id: info.unique_id,
            })
        })
    }

    /// Remove the release bound to `view_id`, returning the space it was on.
    pub fn remove_by_view_id(&mut self, view_id: &str) -> Option<SpaceKey> {
        let at = self.find_by_view_id(view_id)?;
        self.remove(&at).ok()?;
        Some(at.key)
    }

    /// Remove the release bound to `root_view_id` that never got its own view.
    pub fn remove_by_root_view_id(&mut self, root_view_id: &str) -> Option<SpaceKey> {
        let at = self.find_by_root_view_id(root_view_id)?;
        self.remove(&at).ok()?;
        Some(at.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpaceKey, &ReleasePool)> {
        self.pools.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SpaceKey, &mut ReleasePool)> {
        self.pools.iter_mut()
    }

    /// Every stored release, drafts included.
    pub fn releases(&self) -> impl Iterator<Item = &ReleaseInfo> {
        self.pools.values().flat_map(|pool| pool.all())
    }

    pub fn keys(&self) -> impl Iterator<Item = &SpaceKey> {
        self.pools.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.values().all(ReleasePool::is_empty)
    }

    /// Discard drafts and elide pools left empty. Returns the number of drafts dropped.
    pub(crate) fn drop_drafts(&mut self) -> usize {
        let mut dropped = 0;
        for pool in self.pools.values_mut() {
            pool.normalize();
            dropped += pool.retain(|r| r.submitted);
        }
        self.pools.retain(|_, pool| !pool.is_empty());
        dropped
    }

    fn find<'a>(
        &'a self,
        lookup: impl Fn(&'a ReleasePool) -> Result<&'a ReleaseInfo, PoolError>,
    ) -> Option<ReleaseRef> {
        self.pools.iter().find_map(|(key, pool)| {
            lookup(pool).ok().map(|info| ReleaseRef {
                key: key.clone(),
                id: info.unique_id,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::info::parse_date;

    fn owned_space() -> Space {
        let mut space = Space::new(1, 10);
        space.reserved = true;
        space.reserved_by = "alice".into();
        space.reserved_by_id = "U1".into();
        space
    }

    fn submit(map: &mut ReleaseMap, space: &Space, start: &str, end: &str) -> ReleaseRef {
        let info = map.add("V", "alice", "U1", space);
        info.start_date = parse_date(start);
        info.end_date = parse_date(end);
        info.mark_submitted();
        ReleaseRef {
            key: space.key(),
            id: info.unique_id,
        }
    }

    #[test]
    fn owner_comes_from_space_when_nothing_is_active() {
        let mut map = ReleaseMap::new();
        let info = map.add("V1", "alice", "U1", &owned_space());
        assert_eq!(info.owner_id, "U1");
        assert_eq!(info.owner_name, "alice");
        assert_eq!(info.root_view_id, "V1");
    }

    #[test]
    fn chained_release_inherits_owner_from_active_release() {
        let mut map = ReleaseMap::new();
        let space = owned_space();
        let first = submit(&mut map, &space, "2025-02-10", "2025-02-20");
        map.release_mut(&first).unwrap().mark_active();

        // bob borrowed the space in the meantime
        let mut borrowed = space.clone();
        borrowed.reserved_by = "bob".into();
        borrowed.reserved_by_id = "U2".into();

        let info = map.add("V2", "alice", "U1", &borrowed);
        assert_eq!(info.owner_id, "U1");
        assert_eq!(info.owner_name, "alice");
    }

    #[test]
    fn overlap_lists_conflicting_ranges() {
        let mut map = ReleaseMap::new();
        let space = owned_space();
        submit(&mut map, &space, "2025-02-10", "2025-02-20");

        let second = map.add("V2", "alice", "U1", &space);
        second.start_date = parse_date("2025-02-15");
        second.end_date = parse_date("2025-02-25");
        let second = second.clone();

        assert_eq!(
            map.check_overlap(&second),
            vec!["2025-02-10 -> 2025-02-20".to_string()]
        );
    }

    #[test]
    fn overlap_ignores_drafts_and_itself() {
        let mut map = ReleaseMap::new();
        let space = owned_space();
        let at = submit(&mut map, &space, "2025-02-10", "2025-02-20");
        let own = map.release(&at).unwrap().clone();
        assert!(map.check_overlap(&own).is_empty());

        let draft = map.add("V2", "alice", "U1", &space);
        draft.start_date = parse_date("2025-02-10");
        draft.end_date = parse_date("2025-02-20");

        let third = map.add("V3", "alice", "U1", &space);
        third.start_date = parse_date("2025-03-01");
        third.end_date = parse_date("2025-03-02");
        let third = third.clone();
        assert!(map.check_overlap(&third).is_empty());
    }

    #[test]
    fn remove_by_view_id_returns_space() {
        let mut map = ReleaseMap::new();
        let space = owned_space();
        let info = map.add("ROOT", "alice", "U1", &space);
        info.view_id = "CHILD".into();

        assert_eq!(map.find_by_root_view_id("ROOT").unwrap().key, space.key());
        assert_eq!(map.remove_by_view_id("CHILD"), Some(space.key()));
        assert_eq!(map.remove_by_view_id("CHILD"), None);
        // the empty pool may stay behind
        assert!(map.get(space.key().as_str()).is_some());
        assert!(map.is_empty());
    }

    #[test]
    fn drop_drafts_elides_empty_pools() {
        let mut map = ReleaseMap::new();
        let space = owned_space();
        map.add("ROOT", "alice", "U1", &space);
        let other = Space::new(2, 1);
        submit(&mut map, &other, "2025-02-10", "2025-02-20");

        assert_eq!(map.drop_drafts(), 1);
        assert!(map.get(space.key().as_str()).is_none());
        assert_eq!(map.get(other.key().as_str()).unwrap().len(), 1);
    }
}
