use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::State;
use crate::storage::{EventRecord, Storage};
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

/// File-based storage implementation using append-only logs and snapshots.
///
/// Files:
/// - `audit.log`: Append-only audit log (bincode serialized)
/// - `state.bin`: State snapshot (bincode serialized State + u64 last_event_id)
/// - `state.bin.tmp`: Temporary file for atomic snapshot writes
pub struct FileStorage {
    audit_log_path: PathBuf,
    state_path: PathBuf,
    state_tmp_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with paths from config
    pub fn new(config: &Config) -> Self {
        FileStorage {
            audit_log_path: config.get_audit_log_path(),
            state_path: config.get_state_path(),
            state_tmp_path: config.get_state_path().with_extension("bin.tmp"),
        }
    }

    /// Create FileStorage with custom paths (for testing)
    pub fn with_paths(audit_log_path: PathBuf, state_path: PathBuf) -> Self {
        let state_tmp_path = state_path.with_extension("bin.tmp");
        FileStorage {
            audit_log_path,
            state_path,
            state_tmp_path,
        }
    }

    /// Ensure the data directory exists
    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.audit_log_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::StateError(format!("Failed to create data directory: {}", e)))?;
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn append_event(&mut self, event: &EventRecord) -> Result<()> {
        self.ensure_dir()?;

        let event_bytes = bincode::serialize(event)
            .map_err(|e| Error::StateError(format!("Failed to serialize event: {}", e)))?;

        // Open file in append mode
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(|e| Error::StateError(format!("Failed to open audit log for append: {}", e)))?;

        // Write length prefix (u64 little-endian) + event data
        let len = event_bytes.len() as u64;
        file.write_all(&len.to_le_bytes())
            .map_err(|e| Error::StateError(format!("Failed to write event length: {}", e)))?;
        file.write_all(&event_bytes)
            .map_err(|e| Error::StateError(format!("Failed to write event data: {}", e)))?;

        // Fsync for crash safety (append-only semantics)
        file.sync_all()
            .map_err(|e| Error::StateError(format!("Failed to fsync audit log: {}", e)))?;

        Ok(())
    }

    fn load_state(&self) -> Result<Option<(State, u64)>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.state_path)
            .map_err(|e| Error::StateError(format!("Failed to open state file: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::StateError(format!("Failed to read state file: {}", e)))?;

        // Format: [State bytes][last_event_id: u64]
        if data.len() < 8 {
            return Err(Error::StateError("State file too short".to_string()));
        }

        let last_event_id_bytes = &data[data.len() - 8..];
        let last_event_id = u64::from_le_bytes([
            last_event_id_bytes[0],
            last_event_id_bytes[1],
            last_event_id_bytes[2],
            last_event_id_bytes[3],
            last_event_id_bytes[4],
            last_event_id_bytes[5],
            last_event_id_bytes[6],
            last_event_id_bytes[7],
        ]);

        let state_bytes = &data[..data.len() - 8];
        let state: State = bincode::deserialize(state_bytes)
            .map_err(|e| Error::StateError(format!("Failed to deserialize state: {}", e)))?;

        Ok(Some((state, last_event_id)))
    }

    fn persist_state(&mut self, state: &State, last_event_id: u64) -> Result<()> {
        self.ensure_dir()?;

        let state_bytes = bincode::serialize(state)
            .map_err(|e| Error::StateError(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file
        let mut file = File::create(&self.state_tmp_path)
            .map_err(|e| Error::StateError(format!("Failed to create temp state file: {}", e)))?;

        file.write_all(&state_bytes)
            .map_err(|e| Error::StateError(format!("Failed to write state: {}", e)))?;
        file.write_all(&last_event_id.to_le_bytes())
            .map_err(|e| Error::StateError(format!("Failed to write last_event_id: {}", e)))?;

        // Fsync before rename (crash safety)
        file.sync_all()
            .map_err(|e| Error::StateError(format!("Failed to fsync temp state file: {}", e)))?;
        drop(file); // Close file before rename

        // Atomic rename (crash-safe snapshot)
        fs::rename(&self.state_tmp_path, &self.state_path)
            .map_err(|e| Error::StateError(format!("Failed to rename temp state file: {}", e)))?;

        // Fsync parent directory (ensure rename is persisted)
        if let Some(parent) = self.state_path.parent() {
            let parent_file = File::open(parent)
                .map_err(|e| Error::StateError(format!("Failed to open parent directory: {}", e)))?;
            parent_file
                .sync_all()
                .map_err(|e| Error::StateError(format!("Failed to fsync parent directory: {}", e)))?;
        }

        Ok(())
    }

    fn load_events_from(&self, from_event_id: u64) -> Result<Vec<EventRecord>> {
        if !self.audit_log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.audit_log_path)
            .map_err(|e| Error::StateError(format!("Failed to open audit log: {}", e)))?;
        let mut reader = BufReader::new(file);

        let mut events = Vec::new();
        let mut current_id = 0u64;

        loop {
            // Read length prefix
            let mut len_buf = [0u8; 8];
            match reader.read_exact(&mut len_buf) {
                Ok(_) => {
                    let len = u64::from_le_bytes(len_buf) as usize;
                    let mut event_buf = vec![0u8; len];
                    reader
                        .read_exact(&mut event_buf)
                        .map_err(|e| Error::StateError(format!("Failed to read event data: {}", e)))?;

                    // Only include events from from_event_id onwards
                    if current_id >= from_event_id {
                        let event: EventRecord = bincode::deserialize(&event_buf).map_err(|e| {
                            Error::StateError(format!("Failed to deserialize event: {}", e))
                        })?;
                        events.push(event);
                    }

                    current_id += 1;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => {
                    return Err(Error::StateError(format!("Failed to read audit log: {}", e)));
                }
            }
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::state::{Contact, Lead, State};
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let audit_log_path = temp_dir.path().join("audit.log");
        let state_path = temp_dir.path().join("state.bin");
        let storage = FileStorage::with_paths(audit_log_path, state_path);
        (storage, temp_dir)
    }

    fn event(at: i64, action: &str) -> EventRecord {
        EventRecord::new(at, "L1", action, "{}".to_string())
    }

    #[test]
    fn test_append_and_load_event() {
        let (mut storage, _temp_dir) = create_test_storage();

        storage.append_event(&event(100, "intake")).unwrap();
        let events = storage.load_events_from(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "intake");
        assert_eq!(events[0].lead_id, "L1");
    }

    #[test]
    fn test_load_events_from_offset() {
        let (mut storage, _temp_dir) = create_test_storage();

        for i in 0..5 {
            storage.append_event(&event(i, "qualify")).unwrap();
        }

        let events = storage.load_events_from(2).unwrap();
        assert_eq!(events.len(), 3); // event ids 2, 3, 4
        assert_eq!(events[0].at, 2);
    }

    #[test]
    fn test_persist_and_load_state() {
        let (mut storage, _temp_dir) = create_test_storage();

        let mut state = State::new();
        let mut lead = Lead::new(
            "L1".to_string(),
            "sess".to_string(),
            "Main Door".to_string(),
            Contact::default(),
            1_000,
        );
        lead.status = Stage::QuoteSent;
        state.insert_lead(lead);
        state.rotation_cursor = 7;

        storage.persist_state(&state, 5).unwrap();

        let loaded = storage.load_state().unwrap();
        assert!(loaded.is_some());
        let (loaded_state, last_event_id) = loaded.unwrap();
        assert_eq!(last_event_id, 5);
        assert_eq!(loaded_state, state);
        assert_eq!(loaded_state.lead("L1").unwrap().status, Stage::QuoteSent);
    }

    #[test]
    fn test_load_state_none() {
        let (storage, _temp_dir) = create_test_storage();
        let loaded = storage.load_state().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_snapshot_overwrite_is_atomic_replace() {
        let (mut storage, _temp_dir) = create_test_storage();

        let mut state = State::new();
        storage.persist_state(&state, 1).unwrap();
        state.queue_for_review("L1-x-y-X");
        storage.persist_state(&state, 2).unwrap();

        let (loaded, id) = storage.load_state().unwrap().unwrap();
        assert_eq!(id, 2);
        assert_eq!(loaded.review_queue, vec!["L1-x-y-X".to_string()]);
    }
}
