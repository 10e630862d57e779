use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::r#trait::{PersistenceError, PersistenceGateway, StoreSnapshot};

/// Single-document JSON store.
///
/// Each commit writes the full snapshot to a sibling temp file, syncs it and renames it
/// over the document, so readers see either the old or the new snapshot.
#[derive(Debug)]
pub struct JsonFileGateway {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonFileGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistenceGateway for JsonFileGateway {
    fn load(&self) -> Result<StoreSnapshot, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "store document not found; starting empty");
                return Ok(StoreSnapshot::default());
            }
            Err(err) => return Err(err.into()),
        };

        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.validate()?;
        tracing::debug!(
            path = %self.path.display(),
            batches = snapshot.batches.len(),
            bills = snapshot.bills.len(),
            "store loaded"
        );
        Ok(snapshot)
    }

    fn commit(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| PersistenceError::Unavailable("writer lock poisoned".to_string()))?;

        let bytes = serde_json::to_vec_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}
