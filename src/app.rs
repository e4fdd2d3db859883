//! Wiring of the session, catalog and library stores around one backend.

use crate::catalog::CatalogStore;
use crate::gateway::Backend;
use crate::library::LibraryStore;
use crate::navigation::{self, Navigation};
use crate::session::{SessionError, SessionManager};
use crate::storage::ClientStorage;
use std::sync::Arc;
use tracing::{debug, info};

pub struct AppContext {
    backend: Arc<dyn Backend>,
    session: Arc<SessionManager>,
    catalog: CatalogStore,
    library: LibraryStore,
}

impl AppContext {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn ClientStorage>) -> Self {
        let session = Arc::new(SessionManager::new(backend.clone(), storage.clone()));
        let catalog = CatalogStore::new(backend.clone(), session.clone());
        let library = LibraryStore::new(backend.clone(), session.clone(), storage);
        Self {
            backend,
            session,
            catalog,
            library,
        }
    }

    /// Resolves the session, then loads catalog and library side by side.
    pub async fn initialize(&mut self) {
        self.session.initialize().await;
        tokio::join!(self.catalog.initialize(), self.library.initialize());
        info!(
            authenticated = self.session.is_authenticated(),
            moods = self.catalog.moods().len(),
            "Application initialized"
        );
    }

    /// Signs in and loads the user's library.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        self.session.login(email, password).await?;
        self.library.initialize().await;
        Ok(())
    }

    /// Signs out. The library is only dropped when the sign-out went through.
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        self.session.logout().await?;
        self.library.clear();
        Ok(())
    }

    /// Applies the auth guard for `path` against the live session.
    pub fn navigate(&self, path: &str) -> Navigation {
        let route = navigation::resolve(path);
        let outcome = navigation::guard(route, self.session.is_authenticated());
        debug!("Navigating to {} ({}): {:?}", path, route, outcome);
        outcome
    }

    pub fn teardown(&self) {
        self.session.teardown();
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut CatalogStore {
        &mut self.catalog
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut LibraryStore {
        &mut self.library
    }
}
