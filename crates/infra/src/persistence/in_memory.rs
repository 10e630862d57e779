use std::sync::{PoisonError, RwLock};

use super::r#trait::{PersistenceError, PersistenceGateway, StoreSnapshot};

/// In-memory gateway.
///
/// Intended for tests/dev: state is lost with the process.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    snapshot: RwLock<StoreSnapshot>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot (e.g. a fixture).
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Copy of whatever was last committed.
    pub fn committed(&self) -> StoreSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn load(&self) -> Result<StoreSnapshot, PersistenceError> {
        let snapshot = self.committed();
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn commit(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let mut current = self
            .snapshot
            .write()
            .map_err(|_| PersistenceError::Unavailable("lock poisoned".to_string()))?;
        *current = snapshot.clone();
        Ok(())
    }
}
