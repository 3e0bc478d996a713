//! Registry of shared gin index stores.
//!
//! Concurrent readers and writers of the same data part must reuse one store
//! object so segment dictionaries are cached once. The registry is an
//! explicitly owned object whose lifetime belongs to the enclosing process
//! context; it is passed by reference to readers and writers rather than
//! accessed as ambient global state, which keeps teardown and test isolation
//! explicit.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::index::deserializer::GinIndexStoreDeserializer;
use crate::index::store::GinIndexStore;
use crate::storage::Storage;

/// Registry mapping (index name, storage location) to a shared store.
///
/// The internal mutex guards only the registry map and is never held across
/// file I/O; racing `get` calls may both construct a store, in which case
/// the first registered one wins and the duplicate work is redundant, not
/// incorrect.
#[derive(Default)]
pub struct GinIndexStoreFactory {
    stores: Mutex<HashMap<(String, String), Arc<GinIndexStore>>>,
}

impl GinIndexStoreFactory {
    pub fn new() -> GinIndexStoreFactory {
        GinIndexStoreFactory {
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Get the shared store for `name` at the storage location, constructing
    /// and registering it on first use. Returns `Ok(None)` when no index
    /// files exist at the location.
    pub fn get(
        &self,
        name: &str,
        storage: Arc<dyn Storage>,
    ) -> Result<Option<Arc<GinIndexStore>>> {
        let key = (name.to_string(), storage.location());

        if let Some(store) = self.stores.lock().get(&key) {
            return Ok(Some(store.clone()));
        }

        if !GinIndexStore::exists_on(storage.as_ref(), name) {
            return Ok(None);
        }

        let store = Arc::new(GinIndexStore::open(name, storage)?);

        // Preload descriptors and dictionaries while no lock is held
        let mut deserializer = GinIndexStoreDeserializer::new(store.clone());
        deserializer.read_segments()?;
        deserializer.read_segment_dictionaries()?;

        let mut stores = self.stores.lock();
        Ok(Some(stores.entry(key).or_insert(store).clone()))
    }

    /// Drop all registry entries whose storage location falls under
    /// `part_path`. In-flight readers holding a shared store keep using it;
    /// the next `get` for the path constructs a fresh store.
    pub fn remove(&self, part_path: &str) {
        self.stores
            .lock()
            .retain(|(_, location), _| !location.starts_with(part_path));
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.lock().is_empty()
    }
}
