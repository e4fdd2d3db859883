//! End-to-end tests for the session lifecycle
//!
//! Tests login, registration, logout, restore and external session changes.

mod common;

use common::{TestApp, BARE_EMAIL, TEST_EMAIL, TEST_PASS};
use moodtunes::models::PendingProfile;
use moodtunes::session::{last_known_authenticated, AuthState, CurrentUser, SessionError};
use moodtunes::storage::{ClientStorage, PENDING_PROFILE_KEY};

// =============================================================================
// Login / logout
// =============================================================================

#[tokio::test]
async fn test_initialize_without_session() {
    let test_app = TestApp::spawn().await;
    let session = test_app.app.session();

    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(!last_known_authenticated(test_app.storage.as_ref()));
}

#[tokio::test]
async fn test_login_sets_session_user() {
    let test_app = TestApp::signed_in().await;
    let session = test_app.app.session();

    assert_eq!(session.state(), AuthState::Authenticated);
    assert!(session.is_authenticated());
    match session.user() {
        Some(CurrentUser::SessionUser(user)) => assert_eq!(user.id, test_app.user_id),
        other => panic!("unexpected user: {:?}", other),
    }
    assert!(last_known_authenticated(test_app.storage.as_ref()));
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let mut test_app = TestApp::spawn().await;

    let err = test_app.app.login(TEST_EMAIL, "wrong-password").await.unwrap_err();

    assert!(err.to_string().contains("Invalid login credentials"));
    assert!(!test_app.app.session().is_authenticated());
    assert_eq!(test_app.app.session().state(), AuthState::Unauthenticated);
    assert!(test_app.app.session().last_error().is_some());
}

#[tokio::test]
async fn test_login_with_empty_credentials_is_rejected_locally() {
    let mut test_app = TestApp::spawn().await;

    let result = test_app.app.login("", TEST_PASS).await;

    assert!(matches!(result, Err(SessionError::MissingCredentials)));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let mut test_app = TestApp::signed_in().await;

    test_app.app.logout().await.unwrap();

    assert!(!test_app.app.session().is_authenticated());
    assert!(test_app.app.session().user().is_none());
    assert!(!last_known_authenticated(test_app.storage.as_ref()));
}

#[tokio::test]
async fn test_failed_logout_keeps_session() {
    let mut test_app = TestApp::signed_in().await;
    test_app.gateway.fail_sign_out(Some("network unreachable"));

    assert!(test_app.app.logout().await.is_err());

    assert!(test_app.app.session().is_authenticated());
    assert!(test_app.app.session().last_error().is_some());
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_stages_pending_profile() {
    let test_app = TestApp::spawn().await;

    let user = test_app
        .app
        .session()
        .register(
            "grace.hopper@example.com",
            "cobol1959",
            Some(PendingProfile {
                first_name: Some("Amazing".to_string()),
                last_name: Some("Grace".to_string()),
            }),
        )
        .await
        .unwrap();

    assert!(!user.id.is_empty());
    assert!(!test_app.app.session().is_authenticated());
    assert!(test_app.storage.get(PENDING_PROFILE_KEY).unwrap().is_some());
}

#[tokio::test]
async fn test_register_existing_email_fails() {
    let test_app = TestApp::spawn().await;

    let err = test_app
        .app
        .session()
        .register(BARE_EMAIL, "whatever1", None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("already registered"));
}

// =============================================================================
// Restore and external changes
// =============================================================================

#[tokio::test]
async fn test_restart_restores_session_with_profile() {
    let test_app = TestApp::signed_in().await;

    let restarted = test_app.restart().await;

    assert!(restarted.session().is_authenticated());
    match restarted.session().user() {
        Some(CurrentUser::Profile(profile)) => {
            assert_eq!(profile.id, test_app.user_id);
            assert_eq!(profile.first_name.as_deref(), Some("Jane"));
        }
        other => panic!("unexpected user: {:?}", other),
    }
    restarted.teardown();
}

#[tokio::test]
async fn test_restart_refreshes_expired_session() {
    let test_app = TestApp::signed_in().await;
    let old_token = test_app.app.session().session().unwrap().access_token;
    test_app.gateway.expire_session();

    let restarted = test_app.restart().await;

    let session = restarted.session().session().unwrap();
    assert!(restarted.session().is_authenticated());
    assert_ne!(session.access_token, old_token);
}

#[tokio::test]
async fn test_external_sign_out_clears_state() {
    let test_app = TestApp::signed_in().await;

    test_app.gateway.revoke_session();

    let session = test_app.app.session();
    assert!(!session.is_authenticated());
    assert!(session.session().is_none());
    assert!(session.user().is_none());
}

#[tokio::test]
async fn test_teardown_removes_listener() {
    let test_app = TestApp::spawn().await;
    assert_eq!(test_app.gateway.listener_count(), 1);

    test_app.app.teardown();

    assert_eq!(test_app.gateway.listener_count(), 0);
}
