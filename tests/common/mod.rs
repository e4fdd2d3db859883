//! Common test infrastructure
//!
//! This module provides everything the end-to-end tests need: a seeded
//! in-memory backend with registered users, and an initialized application
//! on top of it. Tests should only import from this module, not from
//! internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestApp, TEST_EMAIL};
//!
//! #[tokio::test]
//! async fn test_profile_name() {
//!     let app = TestApp::signed_in().await;
//!     let profile = app.app.library().profile().unwrap();
//!     assert_eq!(profile.email.as_deref(), Some(TEST_EMAIL));
//! }
//! ```

mod constants;
mod fixtures;
mod harness;

// Public API - this is what tests import
pub use constants::*;
pub use harness::TestApp;

#[allow(unused_imports)]
pub use fixtures::{create_test_backend, track_id_for_mood, track_without_mood};
