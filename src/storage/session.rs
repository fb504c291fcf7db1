//! Session storage: the search phase and the pending wake-up.
//!
//! Together with the running flag these let a freshly started process pick
//! up exactly where the previous one left off.

use crate::model::{ScheduleEntry, SearchPhase};

use super::{Result, Storage, StorageError, keys};

impl Storage {
    /// The persisted search phase. Defaults to `Stopped`.
    pub fn search_phase(&self) -> Result<SearchPhase> {
        let Some(text) = self.get::<String>(keys::SEARCH_PHASE)? else {
            return Ok(SearchPhase::Stopped);
        };
        text.parse().map_err(|reason| StorageError::Corrupt {
            key: keys::SEARCH_PHASE,
            reason,
        })
    }

    pub fn set_search_phase(&self, phase: SearchPhase) -> Result<()> {
        self.put(keys::SEARCH_PHASE, &phase.as_str())
    }

    /// Whether searching was suspended by a place-notification click.
    pub fn is_suspended(&self) -> Result<bool> {
        Ok(self.get(keys::SEARCH_SUSPENDED)?.unwrap_or(false))
    }

    pub fn set_suspended(&self, suspended: bool) -> Result<()> {
        self.put(keys::SEARCH_SUSPENDED, &suspended)
    }

    /// The wake-up that was pending when state was last written.
    pub fn pending_wake(&self) -> Result<Option<ScheduleEntry>> {
        self.get_json(keys::PENDING_WAKE)
    }

    pub fn set_pending_wake(&self, entry: &ScheduleEntry) -> Result<()> {
        self.put_json(keys::PENDING_WAKE, entry)
    }

    pub fn clear_pending_wake(&self) -> Result<()> {
        self.remove(keys::PENDING_WAKE)
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use uuid::Uuid;

    use crate::model::{ScheduleEntry, SearchPhase, WakeAction};
    use crate::storage::test_support::test_storage;

    #[test]
    fn phase_defaults_to_stopped() {
        let (_dir, storage) = test_storage();
        assert_eq!(storage.search_phase().unwrap(), SearchPhase::Stopped);
    }

    #[test]
    fn set_and_get_phase() {
        let (_dir, storage) = test_storage();
        storage.set_search_phase(SearchPhase::Found).unwrap();
        assert_eq!(storage.search_phase().unwrap(), SearchPhase::Found);
    }

    #[test]
    fn suspended_defaults_to_false() {
        let (_dir, storage) = test_storage();
        assert!(!storage.is_suspended().unwrap());

        storage.set_suspended(true).unwrap();
        assert!(storage.is_suspended().unwrap());
    }

    #[test]
    fn pending_wake_round_trip() {
        let (_dir, storage) = test_storage();
        let entry = ScheduleEntry {
            id: Uuid::new_v4(),
            fire_at: Timestamp::from_second(1_800_000_000).unwrap(),
            action: WakeAction::ResumeSearch,
            exact: true,
        };

        storage.set_pending_wake(&entry).unwrap();
        assert_eq!(storage.pending_wake().unwrap(), Some(entry));

        storage.clear_pending_wake().unwrap();
        assert!(storage.pending_wake().unwrap().is_none());
    }
}
