//! HTTP gateway for a hosted PostgREST + GoTrue backend.

use super::auth::{AuthChangeEvent, AuthListener, AuthListeners, ListenerId};
use super::error::GatewayError;
use super::query::{Filter, Query};
use super::{AuthGateway, DataGateway};
use crate::models::{AuthUser, Session};
use crate::storage::{self, ClientStorage};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client storage key holding the serialized auth session.
pub const SESSION_STORAGE_KEY: &str = "moodtunes.auth.session";

const PREFER: &str = "Prefer";

/// Token endpoint payload returned by sign-in and refresh.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    storage: Option<Arc<dyn ClientStorage>>,
    listeners: AuthListeners,
}

impl RestGateway {
    /// Create a gateway for the project at `base_url` (e.g. "https://xyz.supabase.co").
    pub fn new(base_url: &str, anon_key: &str, timeout_sec: u64) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
            storage: None,
            listeners: AuthListeners::new(),
        })
    }

    /// Persist the session in `storage` and restore any session saved there
    /// by a previous run.
    pub fn with_storage(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        match storage::read_json::<Session>(storage.as_ref(), SESSION_STORAGE_KEY) {
            Ok(Some(session)) => {
                info!("Restored persisted session for user {}", session.user.id);
                self.session = RwLock::new(Some(session));
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read persisted session: {}", e),
        }
        self.storage = Some(storage);
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session.clone();
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match &session {
            Some(session) => storage::write_json(storage.as_ref(), SESSION_STORAGE_KEY, session),
            None => storage.remove(SESSION_STORAGE_KEY),
        };
        if let Err(e) = result {
            warn!("Failed to persist session: {}", e);
        }
    }

    /// Request carrying the project key and the caller's bearer token.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self
            .current_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", token))
    }

    async fn send_rest(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let (code, message) = parse_error_body(&body, status);
        Err(GatewayError::Api {
            status,
            code,
            message,
        })
    }

    async fn send_auth(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let (_, message) = parse_error_body(&body, status);
        Err(GatewayError::Auth(message))
    }

    async fn rows(response: Response) -> Result<Vec<Value>, GatewayError> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(vec![]);
        }
        match serde_json::from_str(&text)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(vec![]),
            row => Ok(vec![row]),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, GatewayError> {
        let url = self.auth_url("token?grant_type=refresh_token");
        let response = self
            .send_auth(
                self.client
                    .post(&url)
                    .header("apikey", &self.anon_key)
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into_session())
    }
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query_pair).collect()
}

/// Extracts `(code, message)` from a PostgREST or GoTrue error body.
fn parse_error_body(body: &Value, status: u16) -> (Option<String>, String) {
    let code = body
        .get("code")
        .or_else(|| body.get("error_code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {}", status));
    (code, message)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range(header: Option<&HeaderValue>) -> Option<u64> {
    header?.to_str().ok()?.rsplit('/').next()?.parse().ok()
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, GatewayError> {
        debug!(table = %query.table, "select");
        let url = self.table_url(&query.table);
        let response = self
            .send_rest(self.request(Method::GET, &url).query(&query.to_query_pairs()))
            .await?;
        Self::rows(response).await
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, GatewayError> {
        let url = self.table_url(table);
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(filter_pairs(filters));
        let response = self
            .send_rest(
                self.request(Method::HEAD, &url)
                    .header(PREFER, "count=exact")
                    .query(&pairs),
            )
            .await?;
        parse_content_range(response.headers().get(CONTENT_RANGE)).ok_or_else(|| {
            GatewayError::api(
                response.status().as_u16(),
                None,
                format!("missing row count for {}", table),
            )
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, GatewayError> {
        debug!(table, rows = rows.len(), "insert");
        let url = self.table_url(table);
        let response = self
            .send_rest(
                self.request(Method::POST, &url)
                    .header(PREFER, "return=representation")
                    .json(&rows),
            )
            .await?;
        Self::rows(response).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, GatewayError> {
        let url = self.table_url(table);
        let response = self
            .send_rest(
                self.request(Method::PATCH, &url)
                    .header(PREFER, "return=representation")
                    .query(&filter_pairs(filters))
                    .json(&patch),
            )
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, GatewayError> {
        let url = self.table_url(table);
        let response = self
            .send_rest(
                self.request(Method::DELETE, &url)
                    .header(PREFER, "return=representation")
                    .query(&filter_pairs(filters)),
            )
            .await?;
        Self::rows(response).await
    }
}

#[async_trait]
impl AuthGateway for RestGateway {
    async fn get_session(&self) -> Result<Option<Session>, GatewayError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            info!("Session expired without refresh token, dropping it");
            self.set_session(None);
            self.listeners.notify(AuthChangeEvent::SignedOut, None);
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.set_session(Some(refreshed.clone()));
                self.listeners
                    .notify(AuthChangeEvent::TokenRefreshed, Some(&refreshed));
                Ok(Some(refreshed))
            }
            Err(GatewayError::Auth(message)) => {
                warn!("Session refresh rejected: {}", message);
                self.set_session(None);
                self.listeners.notify(AuthChangeEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, GatewayError> {
        let url = self.auth_url("token?grant_type=password");
        let response = self
            .send_auth(
                self.client
                    .post(&url)
                    .header("apikey", &self.anon_key)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        let session = response.json::<TokenResponse>().await?.into_session();
        self.set_session(Some(session.clone()));
        self.listeners
            .notify(AuthChangeEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        let url = self.auth_url("signup");
        let response = self
            .send_auth(
                self.client
                    .post(&url)
                    .header("apikey", &self.anon_key)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        let body: Value = response.json().await?;
        // With auto-confirm the user comes wrapped in a session payload.
        let user = body.get("user").cloned().unwrap_or(body);
        Ok(serde_json::from_value(user)?)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        if self.current_session().is_some() {
            let url = self.auth_url("logout");
            self.send_auth(self.request(Method::POST, &url)).await?;
        }
        self.set_session(None);
        self.listeners.notify(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_auth_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
