use super::info::ReleaseInfo;
use crate::error::PoolError;
use crate::space::Space;
use serde::{Deserialize, Serialize};

pub const INITIAL_CAPACITY: usize = 10;

/// Fixed-slot store of the releases scheduled on one space.
///
/// A release's `unique_id` is its slot index. Removal empties the slot without
/// shifting, so ids stay stable across removals and snapshot round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleasePool {
    capacity: usize,
    data: Vec<Option<ReleaseInfo>>,
}

impl Default for ReleasePool {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl ReleasePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            data: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a new draft in the first free slot, doubling capacity when full.
    pub fn add(
        &mut self,
        view_id: &str,
        releaser_id: &str,
        owner_id: &str,
        owner_name: &str,
        space: &Space,
    ) -> &mut ReleaseInfo {
        let idx = match self.data.iter().position(Option::is_none) {
            Some(idx) => idx,
            None => {
                let idx = self.capacity;
                self.capacity *= 2;
                self.data.resize(self.capacity, None);
                idx
            }
        };
        self.data[idx].insert(ReleaseInfo::draft(
            idx,
            view_id,
            releaser_id,
            owner_id,
            owner_name,
            space,
        ))
    }

    pub fn remove(&mut self, id: usize) -> Result<ReleaseInfo, PoolError> {
        let slot = self.slot_mut(id)?;
        slot.take().ok_or(PoolError::Empty(id))
    }

    /// Overwrite the slot named by `info.unique_id`.
    pub fn update(&mut self, info: ReleaseInfo) -> Result<(), PoolError> {
        let id = info.unique_id;
        let slot = self.slot_mut(id)?;
        match slot {
            Some(existing) => {
                *existing = info;
                Ok(())
            }
            None => Err(PoolError::NotInUse(id)),
        }
    }

    pub fn by_idx(&self, id: usize) -> Result<&ReleaseInfo, PoolError> {
        if id >= self.capacity {
            return Err(PoolError::OutOfRange {
                id,
                capacity: self.capacity,
            });
        }
        self.data[id].as_ref().ok_or(PoolError::Empty(id))
    }

    pub fn by_idx_mut(&mut self, id: usize) -> Result<&mut ReleaseInfo, PoolError> {
        self.slot_mut(id)?.as_mut().ok_or(PoolError::Empty(id))
    }

    pub fn by_root_view_id(&self, view_id: &str) -> Result<&ReleaseInfo, PoolError> {
        self.all()
            .find(|r| !view_id.is_empty() && r.root_view_id == view_id)
            .ok_or(PoolError::NotFound)
    }

    pub fn by_view_id(&self, view_id: &str) -> Result<&ReleaseInfo, PoolError> {
        self.all()
            .find(|r| !view_id.is_empty() && r.view_id == view_id)
            .ok_or(PoolError::NotFound)
    }

    /// The release currently lending the space out, if any.
    pub fn active(&self) -> Result<&ReleaseInfo, PoolError> {
        self.all().find(|r| r.active).ok_or(PoolError::NotFound)
    }

    pub fn all(&self) -> impl Iterator<Item = &ReleaseInfo> {
        self.data.iter().flatten()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut ReleaseInfo> {
        self.data.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(Option::is_none)
    }

    /// Drop every slot for which `keep` returns false. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&ReleaseInfo) -> bool) -> usize {
        let mut dropped = 0;
        for slot in &mut self.data {
            if slot.as_ref().is_some_and(|r| !keep(r)) {
                *slot = None;
                dropped += 1;
            }
        }
        dropped
    }

    /// Restore the slot invariants after deserialization: `data.len() == capacity`
    /// and each stored release carries its own index as id.
    pub(crate) fn normalize(&mut self) {
        self.capacity = self.capacity.max(self.data.len()).max(1);
        self.data.resize(self.capacity, None);
        for (idx, slot) in self.data.iter_mut().enumerate() {
            if let Some(info) = slot {
                info.unique_id = idx;
            }
        }
    }

    fn slot_mut(&mut self, id: usize) -> Result<&mut Option<ReleaseInfo>, PoolError> {
        let capacity = self.capacity;
        self.data
            .get_mut(id)
            .ok_or(PoolError::OutOfRange { id, capacity })
    }
}
