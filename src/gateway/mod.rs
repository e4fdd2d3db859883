//! Remote data gateway.
//!
//! A thin abstraction over the hosted backend: generic table access plus the
//! auth API. There is exactly one network call per operation and no retries;
//! callers decide what to fall back to.

mod auth;
mod error;
mod memory;
mod query;
mod rest;

pub use auth::{AuthChangeEvent, AuthListener, AuthListeners, ListenerId};
pub use error::{
    GatewayError, UNDEFINED_COLUMN_CODE, UNDEFINED_TABLE_CODE, UNIQUE_VIOLATION_CODE,
};
pub use memory::{MemoryGateway, Operation};
pub use query::{Filter, Order, Query};
pub use rest::{RestGateway, SESSION_STORAGE_KEY};

use crate::models::{AuthUser, Session};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Returns the rows matching the query.
    async fn select(&self, query: &Query) -> Result<Vec<Value>, GatewayError>;

    /// Returns the number of rows matching the filters without fetching them.
    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, GatewayError>;

    /// Inserts all rows in one request and returns them as stored.
    /// The request is all-or-nothing: one bad row fails the whole batch.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, GatewayError>;

    /// Applies the patch to the matching rows and returns them as stored.
    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, GatewayError>;

    /// Deletes the matching rows and returns them.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, GatewayError>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Returns the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, GatewayError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, GatewayError>;

    /// Registers a new account. No session is established; the account is
    /// confirmed out of band.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError>;

    async fn sign_out(&self) -> Result<(), GatewayError>;

    fn on_auth_state_change(&self, listener: AuthListener) -> ListenerId;

    fn remove_auth_listener(&self, id: ListenerId);
}

/// Combined trait for a full backend (tables + auth).
pub trait Backend: DataGateway + AuthGateway {}

impl<T: DataGateway + AuthGateway> Backend for T {}

/// Decodes raw rows into typed models.
pub fn decode<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, GatewayError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(GatewayError::from))
        .collect()
}

/// Serializes a model into a row for insertion.
pub fn encode<T: serde::Serialize>(row: &T) -> Result<Value, GatewayError> {
    Ok(serde_json::to_value(row)?)
}
