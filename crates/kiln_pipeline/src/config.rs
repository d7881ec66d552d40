use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::description::SequencerConfigDesc;

/// Pool-scoped sequencer config id: `(pool_guid << 32) | local_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequencerConfigId(u64);

impl SequencerConfigId {
    #[must_use]
    pub fn new(pool_guid: u32, index: u32) -> Self {
        Self((u64::from(pool_guid) << 32) | u64::from(index))
    }

    #[inline]
    #[must_use]
    pub fn pool_guid(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Index into every accelerator's completed-artifact table.
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One rendering context artifacts are specialised against: a technique,
/// a selector set and the shape of the target being drawn into.
///
/// Like accelerators, configs are handed out as `Arc`s and held weakly by
/// the pool. When the last holder drops one, the next visibility barrier
/// releases every artifact built for it.
pub struct SequencerConfig {
    id: SequencerConfigId,
    desc: Arc<SequencerConfigDesc>,
    name: Mutex<String>,
}

impl SequencerConfig {
    pub(crate) fn new(id: SequencerConfigId, desc: Arc<SequencerConfigDesc>, name: &str) -> Self {
        Self {
            id,
            desc,
            name: Mutex::new(name.to_owned()),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SequencerConfigId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.id.index()
    }

    #[inline]
    #[must_use]
    pub fn pool_guid(&self) -> u32 {
        self.id.pool_guid()
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &SequencerConfigDesc {
        &self.desc
    }

    /// Human-readable name; every distinct name the config was requested
    /// under, joined with `|`.
    #[must_use]
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    /// Appends `name` unless it is empty or already part of the name.
    pub(crate) fn merge_name(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        let mut current = self.name.lock();
        if current.split('|').any(|part| part == name) {
            return;
        }
        if !current.is_empty() {
            current.push('|');
        }
        current.push_str(name);
    }
}

impl fmt::Debug for SequencerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerConfig")
            .field("id", &self.id)
            .field("name", &*self.name.lock())
            .field("technique", &self.desc.technique)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_packs_pool_and_index() {
        let id = SequencerConfigId::new(3, 17);
        assert_eq!(id.pool_guid(), 3);
        assert_eq!(id.index(), 17);
        assert_eq!(id.raw(), (3u64 << 32) | 17);
    }

    #[test]
    fn test_merge_name() {
        let config = SequencerConfig::new(SequencerConfigId::new(1, 0), Arc::default(), "forward");
        config.merge_name("forward");
        config.merge_name("");
        config.merge_name("shadow");
        config.merge_name("shadow");
        assert_eq!(config.name(), "forward|shadow");
    }
}
