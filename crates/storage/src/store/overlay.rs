#![forbid(unsafe_code)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use sm_core::ports::PersistenceStore;
use sm_core::{ExpandedState, OpenFlag, OpenFlagMap, OverlayState, ShelfError};

pub const OVERLAY_KEY: &str = "overlay";
pub const EXPANDED_KEY: &str = "expanded";
pub const OPEN_FLAGS_KEY: &str = "open_flags";
pub const OPEN_FLAG_DEFAULT_KEY: &str = "open_flag_default";

/// Typed records on top of a [`PersistenceStore`]. Load/save only; merging lives in the
/// reconciler.
///
/// An absent record loads as its empty value. A record that is present but does not parse is
/// `StoreUnavailable`.
#[derive(Debug)]
pub struct OverlayStore<P> {
    store: P,
}

impl<P: PersistenceStore> OverlayStore<P> {
    pub fn new(store: P) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &P {
        &self.store
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.store
    }

    pub fn load(&self) -> Result<OverlayState, ShelfError> {
        self.read_record(OVERLAY_KEY)
    }

    pub fn save(&mut self, overlay: &OverlayState) -> Result<(), ShelfError> {
        self.write_record(OVERLAY_KEY, overlay)
    }

    pub fn clear(&mut self) -> Result<(), ShelfError> {
        self.store.remove(OVERLAY_KEY)
    }

    pub fn load_expanded(&self) -> Result<ExpandedState, ShelfError> {
        self.read_record(EXPANDED_KEY)
    }

    pub fn save_expanded(&mut self, expanded: &ExpandedState) -> Result<(), ShelfError> {
        self.write_record(EXPANDED_KEY, expanded)
    }

    pub fn load_flags(&self) -> Result<OpenFlagMap, ShelfError> {
        self.read_record(OPEN_FLAGS_KEY)
    }

    pub fn save_flags(&mut self, flags: &OpenFlagMap) -> Result<(), ShelfError> {
        self.write_record(OPEN_FLAGS_KEY, flags)
    }

    pub fn load_default_flag(&self) -> Result<OpenFlag, ShelfError> {
        self.read_record(OPEN_FLAG_DEFAULT_KEY)
    }

    pub fn save_default_flag(&mut self, flag: OpenFlag) -> Result<(), ShelfError> {
        if flag == OpenFlag::Unset {
            return self.store.remove(OPEN_FLAG_DEFAULT_KEY);
        }
        self.write_record(OPEN_FLAG_DEFAULT_KEY, &flag)
    }

    fn read_record<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, ShelfError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(T::default());
        };
        serde_json::from_str(&raw).map_err(|err| {
            tracing::warn!(key, error = %err, "malformed persisted record");
            ShelfError::StoreUnavailable(format!("malformed record '{key}': {err}"))
        })
    }

    fn write_record<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ShelfError> {
        let raw = serde_json::to_string(value)
            .map_err(|err| ShelfError::StoreUnavailable(format!("encode '{key}': {err}")))?;
        self.store.set(key, &raw)
    }
}
