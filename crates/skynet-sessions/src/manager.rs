use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use skynet_core::types::{new_sortable_id, ChatType, SessionEntry, SessionKey};
use skynet_persistence::SessionStore;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use crate::error::Result;

/// Metadata supplied by the Dispatcher when resolving a session for the
/// first time.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    pub chat_type: ChatType,
    pub group_id: Option<String>,
    pub display_name: Option<String>,
}

/// In-memory registry mapping `SessionKey` to the active `SessionEntry`,
/// backed by the whole-registry `SessionStore` for durability.
///
/// Reads take a snapshot `Arc` clone of the map (lock-free beyond the
/// initial `RwLock::read`); writes build a new map from a clone and swap
/// it in, so reads stay lock-free beyond the initial view clone. A
/// second, async `get_or_create` lock serializes the
/// create path so two concurrent first-messages for the same key
/// provably agree on one winner (spec Testable Property 2).
pub struct SessionManager {
    store: SessionStore,
    view: RwLock<Arc<HashMap<SessionKey, SessionEntry>>>,
    create_lock: AsyncMutex<()>,
}

impl SessionManager {
    pub fn load(store: SessionStore) -> Result<Self> {
        let initial = store.load_sessions()?;
        Ok(Self {
            store,
            view: RwLock::new(Arc::new(initial)),
            create_lock: AsyncMutex::new(()),
        })
    }

    fn snapshot(&self) -> Arc<HashMap<SessionKey, SessionEntry>> {
        self.view.read().unwrap().clone()
    }

    fn install(&self, next: HashMap<SessionKey, SessionEntry>) -> Result<()> {
        self.store.save_sessions(&next)?;
        *self.view.write().unwrap() = Arc::new(next);
        Ok(())
    }

    /// Atomic upsert: returns the existing entry for `key`, or creates and
    /// persists a new one. Exactly one caller wins the create; concurrent
    /// callers observe the same `session_id`.
    #[instrument(skip(self, metadata), fields(key = %key))]
    pub async fn get_or_create(&self, key: &SessionKey, metadata: SessionMetadata) -> Result<SessionEntry> {
        if let Some(entry) = self.snapshot().get(key) {
            debug!("session registry hit");
            return Ok(entry.clone());
        }

        let _guard = self.create_lock.lock().await;
        // Re-check: another caller may have won the race while we waited.
        if let Some(entry) = self.snapshot().get(key) {
            return Ok(entry.clone());
        }

        let entry = SessionEntry {
            session_key: key.clone(),
            session_id: new_sortable_id(),
            channel: key.channel.clone(),
            chat_type: metadata.chat_type,
            group_id: metadata.group_id,
            display_name: metadata.display_name,
            created_at: chrono::Utc::now().to_rfc3339(),
            rotated_count: 0,
        };

        let mut next = (*self.snapshot()).clone();
        next.insert(key.clone(), entry.clone());
        self.install(next)?;
        Ok(entry)
    }

    /// Allocate a fresh `session_id` for `key`. The old id's transcript
    /// stays on disk, unreferenced by the active map.
    /// Returns `None` if no entry exists for `key`.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn rotate(&self, key: &SessionKey) -> Result<Option<SessionEntry>> {
        let _guard = self.create_lock.lock().await;
        let mut next = (*self.snapshot()).clone();
        let Some(entry) = next.get_mut(key) else {
            return Ok(None);
        };
        entry.session_id = new_sortable_id();
        entry.rotated_count += 1;
        let updated = entry.clone();
        self.install(next)?;
        Ok(Some(updated))
    }

    /// Snapshot of all active entries.
    pub fn list(&self) -> Vec<SessionEntry> {
        self.snapshot().values().cloned().collect()
    }

    pub fn get(&self, key: &SessionKey) -> Option<SessionEntry> {
        self.snapshot().get(key).cloned()
    }
}
