//! Place storage: the most recently selected place.

use crate::model::PlaceRecord;

use super::{Result, Storage, keys};

impl Storage {
    /// The last selected place, if any.
    pub fn last_place(&self) -> Result<Option<PlaceRecord>> {
        self.get_json(keys::PLACE_DETAILS)
    }

    /// Replaces the last selected place.
    pub fn set_last_place(&self, place: &PlaceRecord) -> Result<()> {
        self.put_json(keys::PLACE_DETAILS, place)
    }

    /// Forgets the last selected place. Idempotent.
    pub fn clear_last_place(&self) -> Result<()> {
        self.remove(keys::PLACE_DETAILS)
    }
}
