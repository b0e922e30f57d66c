use std::collections::HashMap;
use std::path::PathBuf;

use skynet_core::types::{SessionEntry, SessionKey};
use tracing::instrument;

use crate::atomic::{read_json_opt, write_json_atomic};
use crate::error::Result;

/// Whole-registry read/write for the session index.
/// Small (hundreds of entries) — loaded and rewritten in full, never
/// patched in place, to keep the temp-rename invariant simple.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            path: root.into().join("sessions").join("index.json"),
        }
    }

    /// Corruption of the session store is FATAL at startup —
    /// the caller should abort rather than silently reset the registry.
    #[instrument(skip(self))]
    pub fn load_sessions(&self) -> Result<HashMap<SessionKey, SessionEntry>> {
        let entries: Vec<SessionEntry> = match read_json_opt(&self.path)? {
            Some(e) => e,
            None => return Ok(HashMap::new()),
        };
        let mut map = HashMap::new();
        for entry in entries {
            map.insert(entry.session_key.clone(), entry);
        }
        Ok(map)
    }

    #[instrument(skip(self, entries))]
    pub fn save_sessions(&self, entries: &HashMap<SessionKey, SessionEntry>) -> Result<()> {
        let list: Vec<&SessionEntry> = entries.values().collect();
        write_json_atomic(&self.path, &list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::ChatType;

    fn entry(channel: &str, conv: &str, session_id: &str) -> SessionEntry {
        SessionEntry {
            session_key: SessionKey::new(channel, conv),
            session_id: session_id.to_string(),
            channel: channel.to_string(),
            chat_type: ChatType::Direct,
            group_id: None,
            display_name: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            rotated_count: 0,
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut map = HashMap::new();
        let e = entry("discord", "u1", "sess-1");
        map.insert(e.session_key.clone(), e);
        store.save_sessions(&map).unwrap();

        let loaded = store.load_sessions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&SessionKey::new("discord", "u1")].session_id, "sess-1");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load_sessions().unwrap().is_empty());
    }
}
