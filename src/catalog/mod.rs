//! Mood and track catalog.

mod store;

pub use store::CatalogStore;

use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
