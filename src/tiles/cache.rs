use crate::{prelude::HashMap, tiles::id::TileId};

/// Observable state of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Absent,
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone)]
enum TileRecord<P> {
    Pending,
    Loaded(P),
    Failed,
}

/// Per-layer tile memo.
///
/// A slot moves `Absent -> Pending` once and then to exactly one terminal
/// state. Nothing ever moves a slot back, so each tile is fetched at most once
/// for the lifetime of the cache. There is no eviction; `clear` drops
/// everything when the owning layer goes away.
#[derive(Debug, Clone)]
pub struct TileCache<P> {
    records: HashMap<TileId, TileRecord<P>>,
}

impl<P> TileCache<P> {
    pub fn new() -> Self {
        Self {
            records: HashMap::default(),
        }
    }

    pub fn state(&self, tile: &TileId) -> TileState {
        match self.records.get(tile) {
            None => TileState::Absent,
            Some(TileRecord::Pending) => TileState::Pending,
            Some(TileRecord::Loaded(_)) => TileState::Loaded,
            Some(TileRecord::Failed) => TileState::Failed,
        }
    }

    /// Claims an absent slot. Returns `false` if the tile was seen before.
    pub fn reserve(&mut self, tile: TileId) -> bool {
        if self.records.contains_key(&tile) {
            return false;
        }
        self.records.insert(tile, TileRecord::Pending);
        true
    }

    /// Settles a pending slot. Slots that are not pending are left untouched.
    pub fn resolve(&mut self, tile: TileId, payload: Option<P>) -> bool {
        match self.records.get_mut(&tile) {
            Some(slot) if matches!(slot, TileRecord::Pending) => {
                *slot = match payload {
                    Some(p) => TileRecord::Loaded(p),
                    None => TileRecord::Failed,
                };
                true
            }
            _ => false,
        }
    }

    /// Stores a payload for a tile that needs no fetch.
    pub fn insert_loaded(&mut self, tile: TileId, payload: P) -> bool {
        self.reserve(tile) && self.resolve(tile, Some(payload))
    }

    pub fn get(&self, tile: &TileId) -> Option<&P> {
        match self.records.get(tile) {
            Some(TileRecord::Loaded(p)) => Some(p),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, state: TileState) -> usize {
        self.records
            .keys()
            .filter(|tile| self.state(tile) == state)
            .count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<P> Default for TileCache<P> {
    fn default() -> Self {
        Self::new()
    }
}
