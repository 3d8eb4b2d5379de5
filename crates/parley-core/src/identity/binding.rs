//! Binding between an identity provider and the rest of the client.
//!
//! `IdentityBinding` reads the current session once, then follows the
//! provider's auth events until it is dropped. Consumers read the resulting
//! [`AuthState`] through a watch channel.

use parley_types::error::ChatError;
use parley_types::identity::{AuthEvent, AuthState, Identity};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::identity::provider::IdentityProvider;

/// Live view of who is signed in.
///
/// The listener task is cancelled when the binding is dropped.
pub struct IdentityBinding {
    state_rx: watch::Receiver<AuthState>,
    cancellation: CancellationToken,
}

impl IdentityBinding {
    /// Bind to `provider`: look up the current session and start listening
    /// for auth events.
    ///
    /// A failed lookup is logged and treated as signed out; the binding is
    /// ready either way.
    pub async fn bind<P: IdentityProvider>(provider: &P) -> Self {
        // Subscribe before the lookup so no event can slip between the two.
        let events = provider.subscribe();

        let current_user = match provider.current_session().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Session lookup failed, treating as signed out");
                None
            }
        };
        debug!(signed_in = current_user.is_some(), "Identity binding ready");

        let (state_tx, state_rx) = watch::channel(AuthState {
            current_user,
            is_ready: true,
        });
        let cancellation = CancellationToken::new();
        tokio::spawn(listen(events, state_tx, cancellation.clone()));

        Self {
            state_rx,
            cancellation,
        }
    }

    /// Current auth state snapshot.
    pub fn state(&self) -> AuthState {
        self.state_rx.borrow().clone()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<Identity> {
        self.state_rx.borrow().current_user.clone()
    }

    /// Subscribe to auth state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_rx.clone()
    }

    /// The signed-in user, or `ChatError::Unauthenticated`.
    pub fn require_user(&self) -> Result<Identity, ChatError> {
        self.current_user().ok_or(ChatError::Unauthenticated)
    }
}

impl Drop for IdentityBinding {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

async fn listen(
    mut events: broadcast::Receiver<AuthEvent>,
    state_tx: watch::Sender<AuthState>,
    cancellation: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancellation.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(AuthEvent::SignedIn(identity)) => {
                info!(user_id = %identity.id, "Signed in");
                state_tx.send_modify(|state| state.current_user = Some(identity));
            }
            Ok(AuthEvent::SignedOut) => {
                info!("Signed out");
                state_tx.send_modify(|state| state.current_user = None);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Auth event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Auth event listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_types::error::AuthError;
    use parley_types::identity::FederatedProvider;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct StubProvider {
        session: Mutex<Option<Identity>>,
        events: broadcast::Sender<AuthEvent>,
        broken: bool,
    }

    impl StubProvider {
        fn new(session: Option<Identity>) -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                session: Mutex::new(session),
                events,
                broken: false,
            }
        }

        fn emit(&self, event: AuthEvent) {
            let _ = self.events.send(event);
        }
    }

    impl IdentityProvider for StubProvider {
        async fn current_session(&self) -> Result<Option<Identity>, AuthError> {
            if self.broken {
                return Err(AuthError::Storage("unreachable".to_string()));
            }
            Ok(self.session.lock().unwrap().clone())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> Result<Identity, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_up(&self, _email: &str, _password: &str) -> Result<Identity, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_in_with_provider(
            &self,
            provider: FederatedProvider,
        ) -> Result<Identity, AuthError> {
            Err(AuthError::UnsupportedProvider(provider.to_string()))
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::now_v7(),
            email: "ada@example.com".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_bind_reads_existing_session() {
        let user = identity();
        let provider = StubProvider::new(Some(user.clone()));

        let binding = IdentityBinding::bind(&provider).await;

        let state = binding.state();
        assert!(state.is_ready);
        assert_eq!(state.current_user, Some(user.clone()));
        assert_eq!(binding.require_user().unwrap(), user);
    }

    #[tokio::test]
    async fn test_require_user_when_signed_out() {
        let provider = StubProvider::new(None);
        let binding = IdentityBinding::bind(&provider).await;

        assert!(binding.state().is_ready);
        assert!(matches!(
            binding.require_user(),
            Err(ChatError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_failed_lookup_is_ready_and_signed_out() {
        let provider = StubProvider {
            broken: true,
            ..StubProvider::new(Some(identity()))
        };
        let binding = IdentityBinding::bind(&provider).await;

        let state = binding.state();
        assert!(state.is_ready);
        assert!(state.current_user.is_none());
    }

    #[tokio::test]
    async fn test_follows_auth_events() {
        let provider = StubProvider::new(None);
        let binding = IdentityBinding::bind(&provider).await;
        let mut rx = binding.subscribe();
        let user = identity();

        provider.emit(AuthEvent::SignedIn(user.clone()));
        rx.wait_for(|s| s.current_user.is_some()).await.unwrap();
        assert_eq!(binding.current_user(), Some(user));

        provider.emit(AuthEvent::SignedOut);
        rx.wait_for(|s| s.current_user.is_none()).await.unwrap();
        assert!(binding.require_user().is_err());
    }

    #[tokio::test]
    async fn test_drop_stops_listener() {
        let provider = StubProvider::new(None);
        let binding = IdentityBinding::bind(&provider).await;
        let mut rx = binding.subscribe();
        assert_eq!(provider.events.receiver_count(), 1);

        drop(binding);

        // The watch sender lives in the listener task; it closes when the task exits.
        assert!(rx.changed().await.is_err());
        assert_eq!(provider.events.receiver_count(), 0);
    }
}
