//! Local identity provider backed by the SQLite `users` table.
//!
//! Accounts are email + Argon2id password hash. The signed-in user id is kept
//! in the key-value store so a session survives across CLI invocations.
//! Federated sign-in needs a hosted identity service and is refused here.

use chrono::Utc;
use parley_core::identity::provider::IdentityProvider;
use parley_core::storage::kv_store::KvStore;
use parley_types::error::AuthError;
use parley_types::identity::{AuthEvent, FederatedProvider, Identity};
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto::password::{hash_password, verify_dummy, verify_password};
use crate::sqlite::kv::SqliteKvStore;
use crate::sqlite::pool::{DatabasePool, format_datetime, parse_datetime};

/// Key-value scope holding the current session.
const SESSION_SCOPE: &str = "auth";
const SESSION_KEY: &str = "session";

/// Shortest password accepted at sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// SQLite-backed [`IdentityProvider`].
#[derive(Clone)]
pub struct LocalIdentityProvider {
    pool: DatabasePool,
    kv: SqliteKvStore,
    events: broadcast::Sender<AuthEvent>,
}

impl LocalIdentityProvider {
    pub fn new(pool: DatabasePool) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            kv: SqliteKvStore::new(pool.clone()),
            pool,
            events,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<(Identity, String)>, AuthError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => {
                let user_row = UserRow::from_row(&row).map_err(storage_error)?;
                let hash = user_row.password_hash.clone();
                Ok(Some((user_row.into_identity()?, hash)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, AuthError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => Ok(Some(
                UserRow::from_row(&row)
                    .map_err(storage_error)?
                    .into_identity()?,
            )),
            None => Ok(None),
        }
    }

    async fn start_session(&self, identity: &Identity) -> Result<(), AuthError> {
        self.kv
            .set(
                SESSION_SCOPE,
                SESSION_KEY,
                &serde_json::Value::String(identity.id.to_string()),
            )
            .await?;
        let _ = self.events.send(AuthEvent::SignedIn(identity.clone()));
        info!(user_id = %identity.id, "Session started");
        Ok(())
    }
}

struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_identity(self) -> Result<Identity, AuthError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| AuthError::Storage(format!("invalid user id: {e}")))?;
        Ok(Identity {
            id,
            email: self.email,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn storage_error(e: sqlx::Error) -> AuthError {
    AuthError::Storage(e.to_string())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

impl IdentityProvider for LocalIdentityProvider {
    async fn current_session(&self) -> Result<Option<Identity>, AuthError> {
        let Some(value) = self.kv.get(SESSION_SCOPE, SESSION_KEY).await? else {
            return Ok(None);
        };
        let Some(user_id) = value.as_str() else {
            warn!("Ignoring malformed stored session");
            return Ok(None);
        };
        self.find_by_id(user_id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    #[tracing::instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let Some((identity, stored_hash)) = self.find_by_email(&email).await? else {
            verify_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };

        let valid = verify_password(password, &stored_hash)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        self.start_session(&identity).await?;
        Ok(identity)
    }

    #[tracing::instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LENGTH));
        }
        let password_hash =
            hash_password(password).map_err(|e| AuthError::Storage(e.to_string()))?;

        let identity = Identity {
            id: Uuid::now_v7(),
            email,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(identity.id.to_string())
            .bind(&identity.email)
            .bind(&password_hash)
            .bind(format_datetime(&identity.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.message().contains("UNIQUE") {
                        return AuthError::EmailTaken(identity.email.clone());
                    }
                }
                storage_error(e)
            })?;

        info!(user_id = %identity.id, "Account created");
        self.start_session(&identity).await?;
        Ok(identity)
    }

    async fn sign_in_with_provider(
        &self,
        provider: FederatedProvider,
    ) -> Result<Identity, AuthError> {
        Err(AuthError::UnsupportedProvider(provider.to_string()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.kv.delete(SESSION_SCOPE, SESSION_KEY).await?;
        let _ = self.events.send(AuthEvent::SignedOut);
        info!("Session ended");
        Ok(())
    }
}
