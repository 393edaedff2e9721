//! The per-session scan result list.
//!
//! Holds the latest observation for each device address in first-seen order.
//! A repeated address overwrites its entry in place, so row indices stay
//! stable for the lifetime of a session.

use serde::Serialize;

use crate::types::Observation;

/// Where an observation landed in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Upsert {
    /// A new address, appended at this index.
    Inserted(usize),
    /// A known address, overwritten at this index.
    Updated(usize),
}

impl Upsert {
    /// Index of the affected row.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Inserted(i) | Self::Updated(i) => i,
        }
    }

    /// Returns `true` if the observation created a new row.
    #[must_use]
    pub const fn is_insert(self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Insertion-ordered list holding at most one observation per address.
#[derive(Debug, Clone, Default)]
pub struct ScanResultList {
    entries: Vec<Observation>,
}

impl ScanResultList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record an observation, replacing any entry with the same address.
    pub fn upsert(&mut self, observation: Observation) -> Upsert {
        match self.position(&observation.address) {
            Some(index) => {
                self.entries[index] = observation;
                Upsert::Updated(index)
            }
            None => {
                self.entries.push(observation);
                Upsert::Inserted(self.entries.len() - 1)
            }
        }
    }

    /// Index of the entry for `address`, if present.
    #[must_use]
    pub fn position(&self, address: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.address == address)
    }

    /// Number of distinct devices seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.entries.get(index)
    }

    /// Entries in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.entries.iter()
    }

    /// Entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Observation] {
        &self.entries
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a ScanResultList {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(address: &str, name: &str, rssi: i16) -> Observation {
        Observation::new(address, Some(name.to_string()), rssi)
    }

    #[test]
    fn test_empty_list_has_zero_length() {
        let list = ScanResultList::new();
        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert!(list.get(0).is_none());
    }

    #[test]
    fn test_distinct_addresses_keep_arrival_order() {
        let mut list = ScanResultList::new();
        let addresses = [
            "00:00:00:00:00:03",
            "00:00:00:00:00:01",
            "00:00:00:00:00:02",
            "00:00:00:00:00:05",
        ];
        for (i, address) in addresses.iter().enumerate() {
            assert_eq!(list.upsert(obs(address, "dev", -60)), Upsert::Inserted(i));
        }

        assert_eq!(list.len(), addresses.len());
        let seen: Vec<&str> = list.iter().map(|o| o.address.as_str()).collect();
        assert_eq!(seen, addresses);
    }

    #[test]
    fn test_repeated_address_updates_in_place() {
        let mut list = ScanResultList::new();
        list.upsert(obs("11:11:11:11:11:11", "first", -30));
        list.upsert(obs("22:22:22:22:22:22", "second", -40));
        list.upsert(obs("33:33:33:33:33:33", "third", -50));

        let outcome = list.upsert(obs("22:22:22:22:22:22", "second", -90));

        assert_eq!(outcome, Upsert::Updated(1));
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(1).map(|o| o.rssi), Some(-90));
        assert_eq!(list.get(0).map(|o| o.rssi), Some(-30));
        assert_eq!(list.get(2).map(|o| o.rssi), Some(-50));
    }

    #[test]
    fn test_same_observation_twice_is_insert_then_update() {
        let mut list = ScanResultList::new();
        let o = obs("AA:BB:CC:DD:EE:FF", "tag", -70);

        assert_eq!(list.upsert(o.clone()), Upsert::Inserted(0));
        assert_eq!(list.upsert(o), Upsert::Updated(0));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_update_then_insert_scenario() {
        let mut list = ScanResultList::new();

        assert_eq!(list.upsert(obs("AA:BB", "X", -40)), Upsert::Inserted(0));
        assert_eq!(list.upsert(obs("AA:BB", "X", -55)), Upsert::Updated(0));
        assert_eq!(list.upsert(obs("CC:DD", "Y", -70)), Upsert::Inserted(1));

        let summary: Vec<(&str, Option<&str>, i16)> = list
            .iter()
            .map(|o| (o.address.as_str(), o.name.as_deref(), o.rssi))
            .collect();
        assert_eq!(
            summary,
            vec![("AA:BB", Some("X"), -55), ("CC:DD", Some("Y"), -70)]
        );
    }

    #[test]
    fn test_name_change_is_kept() {
        let mut list = ScanResultList::new();
        list.upsert(Observation::new("AA:BB:CC:DD:EE:FF", None, -70));
        list.upsert(obs("AA:BB:CC:DD:EE:FF", "late name", -71));

        assert_eq!(list.get(0).and_then(|o| o.name.as_deref()), Some("late name"));
    }

    #[test]
    fn test_clear_resets_positions() {
        let mut list = ScanResultList::new();
        list.upsert(obs("AA:BB:CC:DD:EE:01", "a", -1));
        list.upsert(obs("AA:BB:CC:DD:EE:02", "b", -2));
        list.clear();

        assert!(list.is_empty());
        assert_eq!(list.upsert(obs("AA:BB:CC:DD:EE:02", "b", -2)), Upsert::Inserted(0));
    }

    #[test]
    fn test_upsert_helpers() {
        assert_eq!(Upsert::Inserted(4).index(), 4);
        assert!(Upsert::Inserted(0).is_insert());
        assert!(!Upsert::Updated(2).is_insert());
    }
}
