//! Published artifacts.
//!
//! These tables live inside the pool's usage lock. Readers holding the lock
//! in shared mode index them directly; only a visibility barrier (holding
//! the lock exclusively) writes to them, and every write replaces a whole
//! entry tagged with the marker that barrier publishes.

use std::sync::Arc;

use kiln_core::{DependencyToken, VisibilityMarker};

use crate::accelerator::AcceleratorId;

pub(crate) struct CompletedEntry<A> {
    pub artifact: Arc<A>,
    pub visible_from: VisibilityMarker,
    pub dependency: DependencyToken,
}

impl<A> CompletedEntry<A> {
    #[inline]
    fn visible_artifact(&self, reader: VisibilityMarker) -> Option<&Arc<A>> {
        self.visible_from.visible_to(reader).then_some(&self.artifact)
    }
}

pub(crate) struct CompletedSlot<A> {
    /// Accelerator these entries were built for. Readers with any other
    /// accelerator see nothing.
    pub owner: Option<AcceleratorId>,
    pub entries: Vec<Option<CompletedEntry<A>>>,
}

impl<A> Default for CompletedSlot<A> {
    fn default() -> Self {
        Self {
            owner: None,
            entries: Vec::new(),
        }
    }
}

/// Completed artifacts of one kind, indexed by accelerator slot, then by
/// sequencer config index.
pub struct CompletedTable<A> {
    pub(crate) slots: Vec<CompletedSlot<A>>,
}

impl<A> Default for CompletedTable<A> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<A> CompletedTable<A> {
    /// Reader lookup: owner, entry and marker must all match.
    #[inline]
    pub(crate) fn get(
        &self,
        slot: u32,
        owner: AcceleratorId,
        config_index: u32,
        reader: VisibilityMarker,
    ) -> Option<&Arc<A>> {
        let slot = self.slots.get(slot as usize)?;
        if slot.owner != Some(owner) {
            return None;
        }
        slot.entries
            .get(config_index as usize)?
            .as_ref()?
            .visible_artifact(reader)
    }

    pub(crate) fn entry(&self, slot: u32, config_index: u32) -> Option<&CompletedEntry<A>> {
        self.slots
            .get(slot as usize)?
            .entries
            .get(config_index as usize)?
            .as_ref()
    }

    /// Makes sure `slot` belongs to `owner`, dropping whatever a previous
    /// owner left behind.
    pub(crate) fn bind(&mut self, slot: u32, owner: AcceleratorId) {
        let index = slot as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, CompletedSlot::default);
        }
        let slot = &mut self.slots[index];
        if slot.owner != Some(owner) {
            slot.owner = Some(owner);
            slot.entries.clear();
        }
    }

    pub(crate) fn unbind(&mut self, slot: u32) {
        if let Some(slot) = self.slots.get_mut(slot as usize) {
            slot.owner = None;
            slot.entries.clear();
        }
    }

    pub(crate) fn publish(&mut self, slot: u32, config_index: u32, entry: CompletedEntry<A>) {
        let Some(slot) = self.slots.get_mut(slot as usize) else {
            return;
        };
        let index = config_index as usize;
        if slot.entries.len() <= index {
            slot.entries.resize_with(index + 1, || None);
        }
        slot.entries[index] = Some(entry);
    }

    pub(crate) fn clear_entry(&mut self, slot: u32, config_index: u32) {
        if let Some(entry) = self
            .slots
            .get_mut(slot as usize)
            .and_then(|slot| slot.entries.get_mut(config_index as usize))
        {
            *entry = None;
        }
    }

    /// Drops the entries of an expired config from every slot.
    pub(crate) fn clear_config(&mut self, config_index: u32) {
        for slot in &mut self.slots {
            if let Some(entry) = slot.entries.get_mut(config_index as usize) {
                *entry = None;
            }
        }
    }

    pub(crate) fn published_count(&self) -> usize {
        self.slots
            .iter()
            .flat_map(|slot| slot.entries.iter())
            .filter(|entry| entry.is_some())
            .count()
    }

    /// Published entries whose dependency has gone stale and are still
    /// waiting for a rebuild.
    pub(crate) fn stale_count(&self) -> usize {
        self.slots
            .iter()
            .flat_map(|slot| slot.entries.iter().flatten())
            .filter(|entry| entry.dependency.is_stale())
            .count()
    }
}

/// A config's pipeline layout as seen by readers.
pub(crate) struct PublishedLayout<L> {
    pub layout: Arc<L>,
    pub visible_from: VisibilityMarker,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: u32, marker: u64) -> CompletedEntry<u32> {
        CompletedEntry {
            artifact: Arc::new(value),
            visible_from: VisibilityMarker::from_raw(marker),
            dependency: DependencyToken::new(),
        }
    }

    #[test]
    fn test_get_respects_marker_and_owner() {
        let owner = AcceleratorId::next();
        let mut table = CompletedTable::default();
        table.bind(2, owner);
        table.publish(2, 5, entry(11, 3));

        assert!(table.get(2, owner, 5, VisibilityMarker::from_raw(2)).is_none());
        assert_eq!(table.get(2, owner, 5, VisibilityMarker::from_raw(3)).map(|a| **a), Some(11));
        assert!(table.get(2, AcceleratorId::next(), 5, VisibilityMarker::from_raw(3)).is_none());
        assert!(table.get(2, owner, 4, VisibilityMarker::from_raw(3)).is_none());
        assert!(table.get(9, owner, 5, VisibilityMarker::from_raw(3)).is_none());
    }

    #[test]
    fn test_rebinding_drops_previous_entries() {
        let first = AcceleratorId::next();
        let second = AcceleratorId::next();
        let mut table = CompletedTable::default();
        table.bind(0, first);
        table.publish(0, 0, entry(1, 1));

        table.bind(0, first);
        assert_eq!(table.published_count(), 1);

        table.bind(0, second);
        assert_eq!(table.published_count(), 0);
        assert!(table.get(0, second, 0, VisibilityMarker::from_raw(1)).is_none());
    }

    #[test]
    fn test_clear_config() {
        let owner = AcceleratorId::next();
        let mut table = CompletedTable::default();
        table.bind(0, owner);
        table.publish(0, 0, entry(1, 1));
        table.publish(0, 1, entry(2, 1));

        table.clear_config(0);
        assert!(table.entry(0, 0).is_none());
        assert!(table.entry(0, 1).is_some());
    }
}
