//! IdentityProvider trait definition.
//!
//! Implementations live in parley-infra (e.g., `LocalIdentityProvider`).

use parley_types::error::AuthError;
use parley_types::identity::{AuthEvent, FederatedProvider, Identity};
use tokio::sync::broadcast;

/// Trait for identity backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Every change
/// of the signed-in user is pushed to subscribers as an [`AuthEvent`].
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in user, if any.
    fn current_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Identity>, AuthError>> + Send;

    /// Subscribe to sign-in and sign-out events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Sign in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;

    /// Create an account and sign in as it.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;

    /// Sign in through a third-party provider.
    fn sign_in_with_provider(
        &self,
        provider: FederatedProvider,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;
}
