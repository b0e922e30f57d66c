use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use skynet_core::types::Message;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use crate::error::Result;

/// Append-only, crash-safe transcript storage keyed by `session_id`.
///
/// Each session's file gets its own `tokio::sync::Mutex`, held in a
/// `DashMap` so concurrent appends to the *same* session_id serialize
/// while different sessions proceed in parallel.
pub struct TranscriptStore {
    root: PathBuf,
    locks: DashMap<String, std::sync::Arc<AsyncMutex<()>>>,
}

impl TranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join("sessions").join(format!("{session_id}.transcript"))
    }

    fn lock_for(&self, session_id: &str) -> std::sync::Arc<AsyncMutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| std::sync::Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Atomically append one serialized message record. Durability: the
    /// write is flushed and synced before returning, so the append
    /// survives a crash immediately following return.
    #[instrument(skip(self, message), fields(session_id))]
    pub async fn append(&self, session_id: &str, message: &Message) -> Result<()> {
        let guard = self.lock_for(session_id);
        let _permit = guard.lock().await;

        let path = self.path_for(session_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(message)?;
        let path_owned = path;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path_owned)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .expect("append task panicked")?;
        Ok(())
    }

    /// Return the last `limit` entries (or all, if `limit` is `None`) in
    /// append order. A malformed line is logged and skipped rather than
    /// failing the whole read.
    #[instrument(skip(self), fields(session_id, limit))]
    pub async fn read(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let path = self.path_for(session_id);
        let all = read_all(&path)?;
        Ok(match limit {
            Some(n) if all.len() > n => all[all.len() - n..].to_vec(),
            _ => all,
        })
    }
}

fn read_all(path: &Path) -> Result<Vec<Message>> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut messages = Vec::new();
    for (lineno, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(m) => messages.push(m),
            Err(e) => warn!(path = %path.display(), lineno, error = %e, "skipping corrupt transcript line"),
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::Role;

    #[tokio::test]
    async fn append_then_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        store.append("s1", &Message::user("hello")).await.unwrap();
        store.append("s1", &Message::assistant("hi", vec![])).await.unwrap();

        let read = store.read("s1", None).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].role, Role::User);
        assert_eq!(read[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn read_of_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        let read = store.read("nope", None).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        store.append("s1", &Message::user("good")).await.unwrap();
        let path = dir.path().join("sessions").join("s1.transcript");
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "{{not valid json").unwrap();
        store.append("s1", &Message::user("also good")).await.unwrap();

        let read = store.read("s1", None).await.unwrap();
        assert_eq!(read.len(), 2);
    }

    #[tokio::test]
    async fn limit_returns_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path());
        for i in 0..5 {
            store.append("s1", &Message::user(format!("m{i}"))).await.unwrap();
        }
        let read = store.read("s1", Some(2)).await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].text, "m3");
        assert_eq!(read[1].text, "m4");
    }
}
