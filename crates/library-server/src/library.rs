//! Process-wide services shared by every request.

use std::sync::Arc;
use std::time::Duration;

use library_domain::LoaderConfig;
use library_storage::{DataStore, User};
use uuid::Uuid;

use crate::auth::{IdentityProvider, SessionStore};
use crate::config::ServerConfig;
use crate::context::RequestContext;
use crate::error::LibraryResult;
use crate::events::LibraryBus;

/// Store, event bus and session table, plus the loader settings used to build
/// request contexts.
///
/// Cloning is cheap; all clones share the same services.
pub struct Library<S> {
    store: Arc<S>,
    bus: LibraryBus,
    sessions: Arc<SessionStore<S>>,
    loader_config: LoaderConfig,
}

impl<S> Clone for Library<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
            sessions: Arc::clone(&self.sessions),
            loader_config: self.loader_config.clone(),
        }
    }
}

impl<S> std::fmt::Debug for Library<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("bus", &self.bus)
            .field("loader_config", &self.loader_config)
            .finish_non_exhaustive()
    }
}

impl<S: DataStore> Library<S> {
    /// Wires the services from a loaded configuration.
    pub fn new(store: Arc<S>, config: &ServerConfig) -> Self {
        Self::with_loader_config(
            Arc::clone(&store),
            SessionStore::new(store, config.auth.shared_password.clone())
                .with_ttl(Duration::from_secs(config.auth.session_ttl_secs)),
            config.loader.to_loader_config(),
        )
    }

    /// Wires the services with explicit parts.
    pub fn with_loader_config(
        store: Arc<S>,
        sessions: SessionStore<S>,
        loader_config: LoaderConfig,
    ) -> Self {
        Self {
            store,
            bus: LibraryBus::new(),
            sessions: Arc::new(sessions),
            loader_config,
        }
    }

    /// Builds a fresh context for one operation.
    pub fn context(&self, identity: Option<User>, request_id: impl Into<String>) -> RequestContext<S> {
        RequestContext::new(
            Arc::clone(&self.store),
            identity,
            request_id,
            &self.loader_config,
        )
    }

    /// Builds a context for work that is not tied to an inbound request,
    /// such as resolving one delivered event.
    pub fn background_context(&self) -> RequestContext<S> {
        self.context(None, Uuid::new_v4().to_string())
    }

    /// Resolves an optional bearer credential to a user.
    pub async fn authenticate(&self, credential: Option<&str>) -> LibraryResult<Option<User>> {
        match credential {
            Some(credential) => self.sessions.resolve(credential).await,
            None => Ok(None),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn bus(&self) -> &LibraryBus {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionStore<S> {
        &self.sessions
    }
}
