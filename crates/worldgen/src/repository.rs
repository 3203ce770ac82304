use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coord::ZoneCoordinate;
use crate::zone::{EnemyId, EnemySpawn, ZoneData};

/// Anything that can address a repository entry.
pub trait AsZoneKey {
    fn zone_key(&self) -> String;
}

impl AsZoneKey for ZoneCoordinate {
    fn zone_key(&self) -> String {
        self.key()
    }
}

impl AsZoneKey for str {
    fn zone_key(&self) -> String {
        self.to_string()
    }
}

impl AsZoneKey for String {
    fn zone_key(&self) -> String {
        self.clone()
    }
}

/// Session cache of generated zones, keyed by encoded coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneRepository {
    zones: BTreeMap<String, ZoneData>,
}

impl ZoneRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<K: AsZoneKey + ?Sized>(&self, key: &K) -> Option<&ZoneData> {
        self.zones.get(&key.zone_key())
    }

    pub fn has<K: AsZoneKey + ?Sized>(&self, key: &K) -> bool {
        self.zones.contains_key(&key.zone_key())
    }

    /// Stores a freshly generated zone. An existing entry is never replaced;
    /// the call reports `false` instead.
    pub fn set<K: AsZoneKey + ?Sized>(&mut self, key: &K, zone: ZoneData) -> bool {
        let key = key.zone_key();
        if self.zones.contains_key(&key) {
            warn!(zone = %key, "zone_repository_overwrite_refused");
            return false;
        }
        self.zones.insert(key, zone);
        true
    }

    /// Replaces an entry that the repair path patched. Refuses to create
    /// new entries.
    pub fn replace_repaired<K: AsZoneKey + ?Sized>(&mut self, key: &K, zone: ZoneData) -> bool {
        match self.zones.get_mut(&key.zone_key()) {
            Some(slot) => {
                *slot = zone;
                true
            }
            None => false,
        }
    }

    pub fn delete<K: AsZoneKey + ?Sized>(&mut self, key: &K) -> Option<ZoneData> {
        self.zones.remove(&key.zone_key())
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn entries(&self) -> Vec<(String, ZoneData)> {
        self.zones
            .iter()
            .map(|(key, zone)| (key.clone(), zone.clone()))
            .collect()
    }

    /// Replaces the whole cache with saved entries, verbatim.
    pub fn restore(&mut self, entries: Vec<(String, ZoneData)>) {
        self.zones.clear();
        for (key, zone) in entries {
            if self.zones.insert(key.clone(), zone).is_some() {
                warn!(zone = %key, "zone_repository_restore_duplicate_key");
            }
        }
        debug!(zone_count = self.zones.len(), "zone_repository_restored");
    }
}

/// Enemies that were killed for good this session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefeatedEnemySet {
    ids: BTreeSet<EnemyId>,
}

impl DefeatedEnemySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EnemyId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &EnemyId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn entries(&self) -> Vec<EnemyId> {
        self.ids.iter().cloned().collect()
    }

    pub fn restore(&mut self, ids: Vec<EnemyId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn filter_alive(&self, spawns: &[EnemySpawn]) -> Vec<EnemySpawn> {
        spawns
            .iter()
            .filter(|spawn| !self.contains(&spawn.id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::TilePos;

    fn zone_with_enemy(coord: &ZoneCoordinate) -> ZoneData {
        let mut zone = ZoneData::blank(9);
        let pos = TilePos::new(2, 3);
        zone.enemies.push(EnemySpawn {
            id: EnemyId::for_spawn(coord, "rat", pos),
            kind: "rat".to_string(),
            pos,
        });
        zone
    }

    #[test]
    fn set_refuses_to_overwrite() {
        let coord = ZoneCoordinate::surface(1, 2);
        let mut repo = ZoneRepository::new();
        assert!(repo.set(&coord, zone_with_enemy(&coord)));
        assert!(!repo.set(&coord, ZoneData::blank(9)));
        assert_eq!(repo.get(&coord).expect("zone").enemies.len(), 1);
        assert!(repo.has("1,2,0"));
    }

    #[test]
    fn replace_repaired_only_touches_existing_entries() {
        let coord = ZoneCoordinate::surface(0, 0);
        let mut repo = ZoneRepository::new();
        assert!(!repo.replace_repaired(&coord, ZoneData::blank(9)));
        repo.set(&coord, zone_with_enemy(&coord));
        assert!(repo.replace_repaired(&coord, ZoneData::blank(9)));
        assert!(repo.get(&coord).expect("zone").enemies.is_empty());
    }

    #[test]
    fn entries_restore_round_trip() {
        let mut repo = ZoneRepository::new();
        for coord in [
            ZoneCoordinate::surface(0, 0),
            ZoneCoordinate::interior(0, 0),
            ZoneCoordinate::underground(0, 0, 3),
        ] {
            repo.set(&coord, zone_with_enemy(&coord));
        }
        let mut restored = ZoneRepository::new();
        restored.set(&ZoneCoordinate::surface(9, 9), ZoneData::blank(9));
        restored.restore(repo.entries());
        assert_eq!(restored, repo);
    }

    #[test]
    fn delete_and_clear() {
        let coord = ZoneCoordinate::surface(0, 1);
        let mut repo = ZoneRepository::new();
        repo.set(&coord, ZoneData::blank(9));
        assert!(repo.delete(&coord).is_some());
        assert!(repo.delete(&coord).is_none());
        repo.set(&coord, ZoneData::blank(9));
        repo.clear();
        assert!(repo.is_empty());
    }

    #[test]
    fn defeated_enemies_are_filtered() {
        let coord = ZoneCoordinate::surface(4, 4);
        let zone = zone_with_enemy(&coord);
        let mut defeated = DefeatedEnemySet::new();
        assert_eq!(defeated.filter_alive(&zone.enemies).len(), 1);
        defeated.insert(zone.enemies[0].id.clone());
        assert!(defeated.filter_alive(&zone.enemies).is_empty());
    }
}
