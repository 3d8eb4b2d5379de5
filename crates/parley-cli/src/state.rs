//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the CLI commands.
//! Core services are generic over repository/provider traits; AppState pins
//! them to the SQLite-backed infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::chat::service::ConversationService;
use parley_core::identity::binding::IdentityBinding;
use parley_infra::config::{load_config, resolve_data_dir};
use parley_infra::credentials::ApiKeyChain;
use parley_infra::identity::local::LocalIdentityProvider;
use parley_infra::keychain::KeychainProvider;
use parley_infra::llm::create_client;
use parley_infra::llm::openai_compat::OpenAiCompatClient;
use parley_infra::sqlite::conversation::SqliteConversationRepository;
use parley_infra::sqlite::kv::SqliteKvStore;
use parley_infra::sqlite::pool::DatabasePool;
use parley_types::config::ParleyConfig;
use parley_types::identity::Identity;

/// Concrete conversation service pinned to SQLite.
pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub conversation_service: Arc<ConcreteConversationService>,
    pub identity_provider: LocalIdentityProvider,
    pub kv_store: SqliteKvStore,
    pub keychain: KeychainProvider,
    pub api_keys: ApiKeyChain,
    pub config: Arc<ParleyConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::open(&data_dir).await?;

        let conversation_service =
            ConversationService::new(SqliteConversationRepository::new(db_pool.clone()));

        let keychain = KeychainProvider::new();
        let api_keys = ApiKeyChain::for_config(&config.completion, keychain.clone());

        Ok(Self {
            conversation_service: Arc::new(conversation_service),
            identity_provider: LocalIdentityProvider::new(db_pool.clone()),
            kv_store: SqliteKvStore::new(db_pool.clone()),
            keychain,
            api_keys,
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }

    /// Build a completion client from the `[completion]` config section and the key chain.
    pub fn completion_client(&self) -> anyhow::Result<OpenAiCompatClient> {
        Ok(create_client(&self.config.completion, &self.api_keys)?)
    }

    /// Bind to the identity provider and return the live binding.
    pub async fn identity_binding(&self) -> IdentityBinding {
        IdentityBinding::bind(&self.identity_provider).await
    }

    /// The signed-in user, or an error telling the user how to sign in.
    pub async fn require_user(&self) -> anyhow::Result<Identity> {
        self.identity_binding()
            .await
            .require_user()
            .map_err(|e| anyhow::anyhow!("{e}. Run `parley login` or `parley signup` first."))
    }
}
