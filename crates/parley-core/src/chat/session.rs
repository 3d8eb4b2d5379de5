//! Session manager for chat sessions.
//!
//! Owns the transcript and the loading/error flags of one chat session,
//! talks to the completion client, and persists through a transcript store.
//! At most one completion request is outstanding at a time; responses that
//! arrive after a `clear()` or `retry()` are discarded using a generation
//! counter.

use std::sync::{Mutex, MutexGuard};

use parley_types::chat::{Message, MessageRole, SessionState};
use parley_types::config::ChatConfig;
use parley_types::error::{ChatError, MESSAGE_EMPTY};
use parley_types::identity::Identity;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::llm::client::CompletionClient;
use crate::storage::transcript::TranscriptStore;

/// Result of a `send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant replied; the reply was appended to the transcript.
    Replied(Message),
    /// The completion failed; `error` is set on the session state.
    Failed,
    /// Nothing was sent (invalid input, not ready, or a request is outstanding).
    Rejected,
    /// A response arrived for a superseded generation and was dropped.
    Discarded,
}

struct Inner {
    state: SessionState,
    generation: u64,
}

/// Manages the state of a single chat session.
///
/// Generic over `CompletionClient` and `TranscriptStore` so parley-core never
/// depends on parley-infra. State lives behind a `std::sync::Mutex` that is
/// never held across an `.await`; every mutation publishes a snapshot on a
/// watch channel.
pub struct SessionManager<C: CompletionClient, S: TranscriptStore> {
    client: C,
    store: S,
    identity: Option<Identity>,
    max_message_length: usize,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionState>,
}

impl<C: CompletionClient, S: TranscriptStore> SessionManager<C, S> {
    /// Create a manager with an empty transcript.
    ///
    /// Call [`hydrate`](Self::hydrate) to load the stored transcript.
    pub fn new(client: C, store: S, config: &ChatConfig) -> Self {
        let state = SessionState {
            active_conversation_id: store.conversation_id(),
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(state.clone());
        Self {
            client,
            store,
            identity: None,
            max_message_length: config.max_message_length,
            inner: Mutex::new(Inner {
                state,
                generation: 0,
            }),
            state_tx,
        }
    }

    /// Attach the signed-in identity forwarded to the completion client.
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// Subscribe to state snapshots. The receiver sees the latest state immediately.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Load the persisted transcript, replacing the in-memory one.
    ///
    /// Never fails: a store error is logged and leaves an empty transcript.
    pub async fn hydrate(&self) {
        let transcript = match self.store.load().await {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!(error = %e, "Failed to load transcript, starting empty");
                Vec::new()
            }
        };
        let count = transcript.len();

        let mut inner = self.lock();
        inner.state.transcript = transcript;
        self.publish(&inner);
        drop(inner);

        debug!(messages = count, "Session hydrated");
    }

    /// Send a user message and wait for the assistant's reply.
    #[tracing::instrument(skip(self, content), fields(chars = content.chars().count()))]
    pub async fn send(&self, content: &str) -> SendOutcome {
        let text = content.trim();

        let (request, generation) = {
            let mut inner = self.lock();
            if inner.state.is_loading {
                debug!("Send rejected: a request is already outstanding");
                return SendOutcome::Rejected;
            }
            if let Err(e) = self.validate(text) {
                inner.state.error = Some(e.to_string());
                self.publish(&inner);
                return SendOutcome::Rejected;
            }

            inner.state.transcript.push(Message::user(text));
            inner.state.is_loading = true;
            inner.state.error = None;
            inner.generation += 1;
            self.publish(&inner);
            (inner.state.transcript.clone(), inner.generation)
        };

        let _loading = LoadingGuard {
            manager: self,
            generation,
        };

        self.persist(&request).await;

        let result = self
            .client
            .complete(&request, self.identity.as_ref())
            .await;

        let outcome = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(
                    generation,
                    current = inner.generation,
                    "Discarding stale completion response"
                );
                return SendOutcome::Discarded;
            }

            inner.state.is_loading = false;
            let outcome = match result {
                Ok(reply) => {
                    let reply = Message::assistant(reply);
                    inner.state.transcript.push(reply.clone());
                    SendOutcome::Replied(reply)
                }
                Err(e) => {
                    warn!(error = %e, "Completion failed");
                    inner.state.error = Some(e.to_string());
                    SendOutcome::Failed
                }
            };
            self.publish(&inner);
            outcome
        };

        if let SendOutcome::Replied(_) = outcome {
            let transcript = self.lock().state.transcript.clone();
            self.persist(&transcript).await;
        }

        outcome
    }

    /// Reissue the most recent user message.
    ///
    /// Returns `None` (and changes nothing) when a request is outstanding or
    /// there is no user message to retry.
    pub async fn retry(&self) -> Option<SendOutcome> {
        let (content, truncated) = {
            let mut inner = self.lock();
            if inner.state.is_loading {
                debug!("Retry ignored: a request is already outstanding");
                return None;
            }
            let position = inner
                .state
                .transcript
                .iter()
                .rposition(|m| m.role == MessageRole::User)?;

            let content = inner.state.transcript[position].content.clone();
            inner.state.transcript.truncate(position);
            inner.state.error = None;
            inner.generation += 1;
            self.publish(&inner);
            (content, inner.state.transcript.clone())
        };

        info!(kept = truncated.len(), "Retrying last user message");
        self.persist(&truncated).await;
        Some(self.send(&content).await)
    }

    /// Empty the transcript, clear error and loading, and persist the empty transcript.
    ///
    /// Any response still in flight is discarded when it arrives.
    pub async fn clear(&self) {
        {
            let mut inner = self.lock();
            inner.state.transcript.clear();
            inner.state.error = None;
            inner.state.is_loading = false;
            inner.generation += 1;
            self.publish(&inner);
        }
        self.persist(&[]).await;
        info!("Session cleared");
    }

    /// Set or clear the error. Setting an error also clears the loading flag.
    pub fn set_error(&self, error: Option<String>) {
        let mut inner = self.lock();
        if error.is_some() {
            inner.state.is_loading = false;
        }
        inner.state.error = error;
        self.publish(&inner);
    }

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.is_empty() {
            return Err(ChatError::Validation(MESSAGE_EMPTY.to_string()));
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::Validation(format!(
                "Message cannot exceed {} characters.",
                self.max_message_length
            )));
        }
        self.client.check_ready()
    }

    async fn persist(&self, transcript: &[Message]) {
        if let Err(e) = self.store.save(transcript).await {
            warn!(error = %e, messages = transcript.len(), "Failed to persist transcript");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("session state lock poisoned")
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }
}

/// Clears `is_loading` if a send is dropped before its response is handled.
///
/// A no-op once the send has finished or the generation has moved on.
struct LoadingGuard<'a, C: CompletionClient, S: TranscriptStore> {
    manager: &'a SessionManager<C, S>,
    generation: u64,
}

impl<C: CompletionClient, S: TranscriptStore> Drop for LoadingGuard<'_, C, S> {
    fn drop(&mut self) {
        let mut inner = self.manager.lock();
        if inner.generation == self.generation && inner.state.is_loading {
            inner.state.is_loading = false;
            self.manager.publish(&inner);
            debug!(generation = self.generation, "Send cancelled before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::error::{API_KEY_MISSING, PersistenceError};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct StubClient {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        requests: Mutex<Vec<Vec<Message>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        ready: bool,
    }

    impl StubClient {
        fn replying(replies: Vec<Result<String, ChatError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                gate: None,
                ready: true,
            }
        }

        fn gated(gate: Arc<Notify>, replies: Vec<Result<String, ChatError>>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::replying(replies)
            }
        }

        fn not_ready() -> Self {
            Self {
                ready: false,
                ..Self::replying(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CompletionClient for StubClient {
        fn check_ready(&self) -> Result<(), ChatError> {
            if self.ready {
                Ok(())
            } else {
                Err(ChatError::Configuration(API_KEY_MISSING.to_string()))
            }
        }

        async fn complete(
            &self,
            transcript: &[Message],
            _identity: Option<&Identity>,
        ) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(transcript.to_vec());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<Message>>,
        saves: AtomicUsize,
        fail: bool,
    }

    impl MemoryStore {
        fn with(transcript: Vec<Message>) -> Self {
            Self {
                saved: Mutex::new(transcript),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn saved(&self) -> Vec<Message> {
            self.saved.lock().unwrap().clone()
        }
    }

    impl TranscriptStore for MemoryStore {
        async fn load(&self) -> Result<Vec<Message>, PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Deserialization("bad json".to_string()));
            }
            Ok(self.saved())
        }

        async fn save(&self, transcript: &[Message]) -> Result<(), PersistenceError> {
            if self.fail {
                return Err(PersistenceError::Storage("disk full".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = transcript.to_vec();
            Ok(())
        }

        fn conversation_id(&self) -> Option<String> {
            None
        }
    }

    fn config() -> ChatConfig {
        ChatConfig::default()
    }

    fn manager(client: StubClient) -> SessionManager<StubClient, MemoryStore> {
        SessionManager::new(client, MemoryStore::default(), &config())
    }

    fn roles(state: &SessionState) -> Vec<MessageRole> {
        state.transcript.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_send_success_appends_user_then_assistant() {
        let mgr = manager(StubClient::replying(vec![Ok("4".to_string())]));

        let outcome = mgr.send("What is 2+2?").await;

        let state = mgr.state();
        assert!(matches!(outcome, SendOutcome::Replied(ref m) if m.content == "4"));
        assert_eq!(roles(&state), vec![MessageRole::User, MessageRole::Assistant]);
        assert_eq!(state.transcript[0].content, "What is 2+2?");
        assert_eq!(state.transcript[1].content, "4");
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert_eq!(mgr.store().saved(), state.transcript);
    }

    #[tokio::test]
    async fn test_send_trims_content_and_passes_full_transcript() {
        let mgr = manager(StubClient::replying(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
        ]));

        mgr.send("  hello  ").await;
        mgr.send("again").await;

        let requests = mgr.client().requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), 1);
        assert_eq!(requests[0][0].content, "hello");
        // Second request carries the prior exchange plus the new user message, once.
        let contents: Vec<_> = requests[1].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "first", "again"]);
    }

    #[tokio::test]
    async fn test_send_empty_sets_error_and_leaves_transcript() {
        let mgr = manager(StubClient::replying(vec![]));

        assert_eq!(mgr.send("").await, SendOutcome::Rejected);
        assert_eq!(mgr.send("   ").await, SendOutcome::Rejected);

        let state = mgr.state();
        assert!(state.transcript.is_empty());
        assert_eq!(state.error.as_deref(), Some("Message cannot be empty"));
        assert!(!state.is_loading);
        assert_eq!(mgr.client().calls(), 0);
    }

    #[tokio::test]
    async fn test_send_too_long_is_rejected() {
        let mgr = manager(StubClient::replying(vec![]));
        let long = "x".repeat(4001);

        assert_eq!(mgr.send(&long).await, SendOutcome::Rejected);

        let state = mgr.state();
        assert!(state.transcript.is_empty());
        assert_eq!(
            state.error.as_deref(),
            Some("Message cannot exceed 4000 characters.")
        );
    }

    #[tokio::test]
    async fn test_send_at_length_limit_is_accepted() {
        let mgr = manager(StubClient::replying(vec![Ok("ok".to_string())]));
        let exact = "y".repeat(4000);

        assert!(matches!(mgr.send(&exact).await, SendOutcome::Replied(_)));
    }

    #[tokio::test]
    async fn test_send_without_api_key_fails_before_appending() {
        let mgr = manager(StubClient::not_ready());

        assert_eq!(mgr.send("hello").await, SendOutcome::Rejected);

        let state = mgr.state();
        assert!(state.transcript.is_empty());
        assert_eq!(state.error.as_deref(), Some(API_KEY_MISSING));
        assert_eq!(mgr.client().calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_user_message() {
        let mgr = manager(StubClient::replying(vec![Err(ChatError::remote(
            401,
            Some("Invalid API key".to_string()),
        ))]));

        assert_eq!(mgr.send("hi").await, SendOutcome::Failed);

        let state = mgr.state();
        assert_eq!(state.error.as_deref(), Some("Invalid API key"));
        assert!(!state.is_loading);
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].role, MessageRole::User);
        assert_eq!(mgr.store().saved().len(), 1);
    }

    #[tokio::test]
    async fn test_second_send_while_loading_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mgr = manager(StubClient::gated(gate.clone(), vec![Ok("done".to_string())]));
        let mut rx = mgr.subscribe();

        let (first, second) = tokio::join!(mgr.send("one"), async {
            rx.wait_for(|s| s.is_loading).await.unwrap();
            let second = mgr.send("two").await;
            gate.notify_one();
            second
        });

        assert!(matches!(first, SendOutcome::Replied(_)));
        assert_eq!(second, SendOutcome::Rejected);
        assert_eq!(mgr.client().calls(), 1);

        let state = mgr.state();
        assert_eq!(state.transcript.len(), 2);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_retry_while_loading_is_noop() {
        let gate = Arc::new(Notify::new());
        let mgr = manager(StubClient::gated(gate.clone(), vec![Ok("done".to_string())]));
        let mut rx = mgr.subscribe();

        let (first, (retried, len_while_loading)) = tokio::join!(mgr.send("one"), async {
            rx.wait_for(|s| s.is_loading).await.unwrap();
            let retried = mgr.retry().await;
            let len = mgr.state().transcript.len();
            gate.notify_one();
            (retried, len)
        });

        assert!(retried.is_none());
        assert_eq!(len_while_loading, 1);
        assert_eq!(mgr.client().calls(), 1);
        assert!(matches!(first, SendOutcome::Replied(_)));
        assert_eq!(mgr.state().transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_retry_without_user_message_is_noop() {
        let mgr = SessionManager::new(
            StubClient::replying(vec![]),
            MemoryStore::with(vec![Message::assistant("hello")]),
            &config(),
        );
        mgr.hydrate().await;
        mgr.set_error(Some("Request failed".to_string()));

        assert!(mgr.retry().await.is_none());

        let state = mgr.state();
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].content, "hello");
        assert_eq!(state.error.as_deref(), Some("Request failed"));
        assert_eq!(mgr.client().calls(), 0);
        assert_eq!(mgr.store().saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_after_failure_reissues_last_message() {
        let mgr = manager(StubClient::replying(vec![
            Err(ChatError::Transport("connection refused".to_string())),
            Ok("hello there".to_string()),
        ]));

        assert_eq!(mgr.send("hi").await, SendOutcome::Failed);
        assert!(mgr.state().error.is_some());

        let outcome = mgr.retry().await;
        assert!(matches!(outcome, Some(SendOutcome::Replied(_))));

        let state = mgr.state();
        let contents: Vec<_> = state.transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello there"]);
        assert!(state.error.is_none());
        assert!(!state.is_loading);

        // The retried request looks exactly like a fresh send of "hi".
        let requests = mgr.client().requests.lock().unwrap().clone();
        assert_eq!(requests[1].len(), 1);
        assert_eq!(requests[1][0].content, "hi");
    }

    #[tokio::test]
    async fn test_retry_drops_reply_after_last_user_message() {
        let mgr = manager(StubClient::replying(vec![
            Ok("a1".to_string()),
            Ok("a2".to_string()),
            Ok("a2 again".to_string()),
        ]));
        mgr.send("q1").await;
        mgr.send("q2").await;

        mgr.retry().await;

        let contents: Vec<_> = mgr
            .state()
            .transcript
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2 again"]);
    }

    #[tokio::test]
    async fn test_clear_empties_state_and_store() {
        let mgr = manager(StubClient::replying(vec![Ok("reply".to_string())]));
        mgr.send("hello").await;
        mgr.set_error(Some("something".to_string()));

        mgr.clear().await;

        let state = mgr.state();
        assert!(state.transcript.is_empty());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert!(mgr.store().saved().is_empty());

        mgr.clear().await;
        assert_eq!(mgr.state(), state);
    }

    #[tokio::test]
    async fn test_stale_response_after_clear_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mgr = manager(StubClient::gated(gate.clone(), vec![Ok("late".to_string())]));
        let mut rx = mgr.subscribe();

        let (outcome, ()) = tokio::join!(mgr.send("question"), async {
            rx.wait_for(|s| s.is_loading).await.unwrap();
            mgr.clear().await;
            gate.notify_one();
        });

        assert_eq!(outcome, SendOutcome::Discarded);
        let state = mgr.state();
        assert!(state.transcript.is_empty());
        assert!(!state.is_loading);
        assert!(mgr.store().saved().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_send_clears_loading() {
        let gate = Arc::new(Notify::new());
        let mgr = manager(StubClient::gated(gate, vec![]));

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), mgr.send("hang")).await;
        assert!(result.is_err());

        let state = mgr.state();
        assert!(!state.is_loading);
        assert_eq!(state.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_set_error_forces_loading_off() {
        let gate = Arc::new(Notify::new());
        let mgr = manager(StubClient::gated(gate.clone(), vec![Ok("r".to_string())]));
        let mut rx = mgr.subscribe();

        tokio::join!(mgr.send("q"), async {
            rx.wait_for(|s| s.is_loading).await.unwrap();
            mgr.set_error(Some("boom".to_string()));
            let state = mgr.state();
            assert!(!state.is_loading);
            assert_eq!(state.error.as_deref(), Some("boom"));
            gate.notify_one();
        });

        mgr.set_error(None);
        assert!(mgr.state().error.is_none());
    }

    #[tokio::test]
    async fn test_hydrate_loads_stored_transcript() {
        let stored = vec![Message::user("earlier"), Message::assistant("reply")];
        let mgr = SessionManager::new(
            StubClient::replying(vec![]),
            MemoryStore::with(stored.clone()),
            &config(),
        );

        mgr.hydrate().await;

        assert_eq!(mgr.state().transcript, stored);
    }

    #[tokio::test]
    async fn test_hydrate_failure_starts_empty_and_save_failures_are_swallowed() {
        let mgr = SessionManager::new(
            StubClient::replying(vec![Ok("still works".to_string())]),
            MemoryStore::failing(),
            &config(),
        );

        mgr.hydrate().await;
        assert!(mgr.state().transcript.is_empty());

        let outcome = mgr.send("hello").await;
        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert!(mgr.state().error.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_observes_loading_then_idle() {
        let mgr = manager(StubClient::replying(vec![Ok("hi".to_string())]));
        let rx = mgr.subscribe();

        mgr.send("hello").await;

        let latest = rx.borrow().clone();
        assert_eq!(latest.transcript.len(), 2);
        assert!(!latest.is_loading);
    }
}
