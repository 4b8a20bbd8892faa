//! In-memory store with snapshot-swap transactions

use super::{CompositeStore, StoreState};
use composer_core::Result;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Composite store kept in memory
///
/// Readers clone an `Arc` of the current state. Writers are serialized by a
/// mutex, edit a private copy and publish it only if the edit succeeds.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<Arc<StoreState>>,
    writer: Mutex<()>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `state`
    #[must_use]
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        }
    }

    /// Serialize every record to JSON
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SerializationError` if encoding fails
    pub fn to_json(&self) -> Result<String> {
        let state = Arc::clone(&self.state.read());
        Ok(serde_json::to_string_pretty(state.as_ref())?)
    }

    /// Restore a store from JSON produced by [`InMemoryStore::to_json`]
    ///
    /// # Errors
    ///
    /// Returns `ComposerError::SerializationError` if decoding fails
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(serde_json::from_str(json)?))
    }

    /// Write the records to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), "saved composite store");
        Ok(())
    }

    /// Load records from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if reading or decoding fails
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl CompositeStore for InMemoryStore {
    fn snapshot(&self) -> Result<Arc<StoreState>> {
        Ok(Arc::clone(&self.state.read()))
    }

    fn transact(&self, change: &mut dyn FnMut(&mut StoreState) -> Result<()>) -> Result<()> {
        let _writer = self.writer.lock();
        let mut draft = StoreState::clone(&self.state.read());
        change(&mut draft)?;
        *self.state.write() = Arc::new(draft);
        Ok(())
    }
}
