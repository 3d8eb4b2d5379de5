//! Transcript persistence contract and the key-value backed implementation.
//!
//! A transcript store reads and writes a flat, ordered list of messages.
//! Every save replaces the whole transcript; there is no merge.

use parley_types::chat::Message;
use parley_types::error::PersistenceError;

use super::kv_store::KvStore;

/// Scope used for transcripts that belong to no signed-in user.
pub const LOCAL_SCOPE: &str = "local";

/// Persistence adapter for a single chat transcript.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait TranscriptStore: Send + Sync {
    /// Load the stored transcript. A store with nothing saved yields an empty list.
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, PersistenceError>> + Send;

    /// Replace the stored transcript with `transcript`.
    fn save(
        &self,
        transcript: &[Message],
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;

    /// Conversation this store is bound to, if any.
    fn conversation_id(&self) -> Option<String>;
}

/// Transcript stored as one JSON array under a fixed key in a [`KvStore`].
pub struct KvTranscriptStore<K: KvStore> {
    kv: K,
    scope: String,
    key: String,
}

impl<K: KvStore> KvTranscriptStore<K> {
    pub fn new(kv: K, scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kv,
            scope: scope.into(),
            key: key.into(),
        }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<K: KvStore> TranscriptStore for KvTranscriptStore<K> {
    async fn load(&self) -> Result<Vec<Message>, PersistenceError> {
        let value = self.kv.get(&self.scope, &self.key).await?;
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| PersistenceError::Deserialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, transcript: &[Message]) -> Result<(), PersistenceError> {
        let value = serde_json::to_value(transcript)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.kv.set(&self.scope, &self.key, &value).await?;
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::error::RepositoryError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryKv {
        entries: Mutex<HashMap<(String, String), serde_json::Value>>,
    }

    impl KvStore for MemoryKv {
        async fn get(
            &self,
            scope: &str,
            key: &str,
        ) -> Result<Option<serde_json::Value>, RepositoryError> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(&(scope.to_string(), key.to_string())).cloned())
        }

        async fn set(
            &self,
            scope: &str,
            key: &str,
            value: &serde_json::Value,
        ) -> Result<(), RepositoryError> {
            let mut entries = self.entries.lock().unwrap();
            entries.insert((scope.to_string(), key.to_string()), value.clone());
            Ok(())
        }

        async fn delete(&self, scope: &str, key: &str) -> Result<(), RepositoryError> {
            let mut entries = self.entries.lock().unwrap();
            entries.remove(&(scope.to_string(), key.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_missing_key_is_empty() {
        let store = KvTranscriptStore::new(MemoryKv::default(), LOCAL_SCOPE, "chat-storage");
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order() {
        let store = KvTranscriptStore::new(MemoryKv::default(), LOCAL_SCOPE, "chat-storage");
        let transcript = vec![Message::user("hi"), Message::assistant("hello")];
        store.save(&transcript).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, transcript);
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let store = KvTranscriptStore::new(MemoryKv::default(), LOCAL_SCOPE, "chat-storage");
        store
            .save(&[Message::user("a"), Message::assistant("b")])
            .await
            .unwrap();
        store.save(&[]).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_deserialization_error() {
        let kv = MemoryKv::default();
        kv.set(LOCAL_SCOPE, "chat-storage", &serde_json::json!({"not": "a list"}))
            .await
            .unwrap();
        let store = KvTranscriptStore::new(kv, LOCAL_SCOPE, "chat-storage");

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let kv = MemoryKv::default();
        kv.set("user-1", "chat-storage", &serde_json::json!([]))
            .await
            .unwrap();
        let store = KvTranscriptStore::new(kv, LOCAL_SCOPE, "chat-storage");
        store.save(&[Message::user("mine")]).await.unwrap();

        let mine = store.kv().get(LOCAL_SCOPE, "chat-storage").await.unwrap().unwrap();
        assert_eq!(mine.as_array().map(Vec::len), Some(1));
        let other = store.kv().get("user-1", "chat-storage").await.unwrap().unwrap();
        assert_eq!(other, serde_json::json!([]));
    }
}
