//! Initialized application over a seeded in-memory backend

use super::constants::*;
use super::fixtures::create_test_backend;
use moodtunes::gateway::MemoryGateway;
use moodtunes::storage::MemoryStorage;
use moodtunes::AppContext;
use std::sync::Arc;

pub struct TestApp {
    pub gateway: Arc<MemoryGateway>,
    pub storage: Arc<MemoryStorage>,
    pub app: AppContext,
    /// Id of the `TEST_EMAIL` user
    pub user_id: String,
}

#[allow(dead_code)]
impl TestApp {
    /// Seeded backend, application initialized, nobody signed in.
    pub async fn spawn() -> Self {
        let (gateway, user_id) = create_test_backend()
            .await
            .expect("Failed to create test backend");
        let storage = Arc::new(MemoryStorage::new());
        let mut app = AppContext::new(gateway.clone(), storage.clone());
        app.initialize().await;
        Self {
            gateway,
            storage,
            app,
            user_id,
        }
    }

    /// Same as [`spawn`](Self::spawn) with the test user signed in.
    pub async fn signed_in() -> Self {
        let mut test_app = Self::spawn().await;
        test_app
            .app
            .login(TEST_EMAIL, TEST_PASS)
            .await
            .expect("Failed to sign in test user");
        test_app
    }

    /// A second application sharing the backend, as after a restart.
    pub async fn restart(&self) -> AppContext {
        let mut app = AppContext::new(self.gateway.clone(), self.storage.clone());
        app.initialize().await;
        app
    }
}
