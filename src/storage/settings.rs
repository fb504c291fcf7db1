//! Settings storage: search radius and the running flag.

use super::{Result, Storage, keys};

impl Storage {
    /// The POI search radius in meters, or the configured default.
    pub fn search_radius(&self) -> Result<u32> {
        Ok(self
            .get::<u32>(keys::SEARCH_RADIUS)?
            .unwrap_or(self.default_radius))
    }

    pub fn set_search_radius(&self, radius: u32) -> Result<()> {
        self.put(keys::SEARCH_RADIUS, &radius)
    }

    /// Whether the service should be running. Defaults to `false`.
    pub fn is_running(&self) -> Result<bool> {
        Ok(self.get::<bool>(keys::SERVICE_RUNNING)?.unwrap_or(false))
    }

    pub fn set_running(&self, running: bool) -> Result<()> {
        self.put(keys::SERVICE_RUNNING, &running)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{DEFAULT_SEARCH_RADIUS, test_support::test_storage};

    #[test]
    fn radius_defaults_to_one_kilometer() {
        let (_dir, storage) = test_storage();
        assert_eq!(storage.search_radius().unwrap(), DEFAULT_SEARCH_RADIUS);
        assert_eq!(DEFAULT_SEARCH_RADIUS, 1000);
    }

    #[test]
    fn radius_default_can_be_overridden() {
        let (_dir, storage) = test_storage();
        let storage = storage.with_default_radius(400);
        assert_eq!(storage.search_radius().unwrap(), 400);

        storage.set_search_radius(750).unwrap();
        assert_eq!(storage.search_radius().unwrap(), 750);
    }

    #[test]
    fn running_flag_defaults_to_false() {
        let (_dir, storage) = test_storage();
        assert!(!storage.is_running().unwrap());

        storage.set_running(true).unwrap();
        assert!(storage.is_running().unwrap());
    }
}
