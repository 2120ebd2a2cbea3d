// ── Sub-device directory ──
//
// Per-parent snapshot of sub-devices. A parent is either absent (never
// reported) or holds the complete list from its last full-list frame,
// possibly patched by later status frames.

use dashmap::DashMap;
use indexmap::IndexMap;

use crate::model::SubDevice;

/// Sub-devices keyed by parent did, then by child did.
#[derive(Debug, Default)]
pub struct SubDeviceDirectory {
    parents: DashMap<String, IndexMap<String, SubDevice>>,
}

impl SubDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the parent's snapshot wholesale. Returns the new snapshot.
    pub fn replace(&self, parent: &str, sub_devices: Vec<SubDevice>) -> Vec<SubDevice> {
        let map: IndexMap<String, SubDevice> = sub_devices
            .into_iter()
            .map(|s| (s.did.clone(), s))
            .collect();
        let snapshot = map.values().cloned().collect();
        self.parents.insert(parent.to_owned(), map);
        snapshot
    }

    /// Patch the online flag of the entry whose wire handle is `sub_did`.
    ///
    /// Returns `false` (and changes nothing) when the parent has no
    /// snapshot or the handle is not in it.
    pub fn set_online(&self, parent: &str, sub_did: u32, online: bool) -> bool {
        let Some(mut subs) = self.parents.get_mut(parent) else {
            return false;
        };
        match subs.values_mut().find(|s| s.sub_did == sub_did) {
            Some(sub) => {
                sub.is_online = online;
                true
            }
            None => false,
        }
    }

    /// Current snapshot, `None` if the parent never reported a list.
    pub fn snapshot(&self, parent: &str) -> Option<Vec<SubDevice>> {
        self.parents
            .get(parent)
            .map(|subs| subs.values().cloned().collect())
    }

    /// Whether the parent has reported a full list.
    pub fn contains(&self, parent: &str) -> bool {
        self.parents.contains_key(parent)
    }

    /// Look up one child by its cloud did.
    pub fn find(&self, parent: &str, did: &str) -> Option<SubDevice> {
        self.parents.get(parent)?.get(did).cloned()
    }

    pub fn clear(&self) {
        self.parents.clear();
    }
}
