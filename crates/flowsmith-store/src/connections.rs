use fd_lock::RwLock;
use std::fs::{self, OpenOptions};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::records::ConnectionDescriptor;
use crate::store::{Record, RecordStore};

const LOCK_FILE: &str = ".lock";

impl RecordStore {
    /// Return the connection named `template.name`, creating it from
    /// `template` if it does not exist yet.
    ///
    /// Idempotent by name. Creators in other processes are serialized by a
    /// file lock, and the no-clobber create means a racing writer that slips
    /// past the lock still loses cleanly and reads the winner's record.
    /// The boolean is `true` when this call created the record.
    pub fn get_or_create_connection(
        &self,
        template: ConnectionDescriptor,
    ) -> Result<(ConnectionDescriptor, bool), StoreError> {
        // Validates the name before anything touches the filesystem
        let record_path = self.record_path::<ConnectionDescriptor>(&template.key())?;

        let dir = self.collection_dir::<ConnectionDescriptor>();
        fs::create_dir_all(&dir).map_err(|e| StoreError::Write {
            path: dir.to_string(),
            reason: e.to_string(),
        })?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::Lock {
                path: lock_path.to_string(),
                reason: e.to_string(),
            })?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock.write().map_err(|e| StoreError::Lock {
            path: lock_path.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(existing) = self.find::<ConnectionDescriptor>(&template.name)? {
            debug!(connection = %existing.name, path = %record_path, "Connection already exists");
            return Ok((existing, false));
        }

        if self.insert_new(&template)? {
            info!(connection = %template.name, host = %template.host, "Created connection");
            let mut created = template;
            // The stored copy never carries the password
            created.password = None;
            Ok((created, true))
        } else {
            let existing = self.load::<ConnectionDescriptor>(&template.name)?;
            Ok((existing, false))
        }
    }

    /// All known connections
    pub fn list_connections(&self) -> Result<Vec<ConnectionDescriptor>, StoreError> {
        self.list()
    }
}
