//! In-process backend.
//!
//! Keeps tables as JSON rows and behaves like the hosted backend where the
//! stores care: serial ids, unique constraints, unknown relations and columns
//! reported with the Postgres error codes, all-or-nothing batch inserts and a
//! password auth API. Tests use its failure injection hooks to drive the
//! fallback paths.

use super::auth::{AuthChangeEvent, AuthListener, AuthListeners, ListenerId};
use super::error::{GatewayError, UNDEFINED_COLUMN_CODE, UNIQUE_VIOLATION_CODE};
use super::query::{Filter, Query};
use super::{AuthGateway, DataGateway};
use crate::models::{AuthUser, Session};
use async_trait::async_trait;
use rand::Rng;
use rand_distr::Alphanumeric;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

struct MemoryTable {
    columns: Vec<String>,
    serial_id: bool,
    unique_constraints: Vec<Vec<String>>,
    rows: Vec<Value>,
    next_id: i64,
}

impl MemoryTable {
    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    fn violates_unique(&self, candidate: &Value, pending: &[Value]) -> Option<String> {
        for constraint in &self.unique_constraints {
            let clash = self.rows.iter().chain(pending.iter()).any(|existing| {
                constraint.iter().all(|col| {
                    let a = existing.get(col).unwrap_or(&Value::Null);
                    let b = candidate.get(col).unwrap_or(&Value::Null);
                    !a.is_null() && a == b
                })
            });
            if clash {
                return Some(constraint.join(", "));
            }
        }
        None
    }
}

struct Account {
    user: AuthUser,
    salt: String,
    digest: String,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    failures: HashMap<(String, Operation), String>,
    batch_rejections: HashSet<String>,
    calls: HashMap<(String, Operation), usize>,
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    sign_out_failure: Option<String>,
}

pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    listeners: AuthListeners,
    session_ttl_secs: i64,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// Creates a backend with no tables at all.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            listeners: AuthListeners::new(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }

    /// Creates a backend with every table the application uses.
    pub fn with_schema() -> Self {
        let gateway = Self::new();
        gateway.create_table("moods", &["id", "name", "description", "created_at"], true);
        gateway.add_unique("moods", &["name"]);
        gateway.create_table(
            "music",
            &["id", "title", "artist", "album", "genre", "mood_id", "created_at"],
            true,
        );
        gateway.create_table(
            "playlists",
            &["id", "user_id", "name", "description", "created_at"],
            true,
        );
        gateway.create_table(
            "playlist_tracks",
            &["id", "playlist_id", "music_id", "position", "created_at"],
            true,
        );
        gateway.add_unique("playlist_tracks", &["playlist_id", "music_id"]);
        gateway.create_table(
            "liked_tracks",
            &["id", "user_id", "music_id", "created_at"],
            true,
        );
        gateway.add_unique("liked_tracks", &["user_id", "music_id"]);
        gateway.create_table(
            "profiles",
            &["id", "email", "first_name", "last_name", "created_at"],
            false,
        );
        gateway.add_unique("profiles", &["id"]);
        gateway.create_table(
            "tracks",
            &["id", "title", "artist", "album", "genre", "mood", "created_at"],
            true,
        );
        gateway
    }

    pub fn with_session_ttl(mut self, ttl_secs: i64) -> Self {
        self.session_ttl_secs = ttl_secs;
        self
    }

    pub fn create_table(&self, name: &str, columns: &[&str], serial_id: bool) {
        self.lock().tables.insert(
            name.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                serial_id,
                unique_constraints: vec![],
                rows: vec![],
                next_id: 1,
            },
        );
    }

    pub fn drop_table(&self, name: &str) {
        self.lock().tables.remove(name);
    }

    pub fn add_unique(&self, table: &str, columns: &[&str]) {
        if let Some(t) = self.lock().tables.get_mut(table) {
            t.unique_constraints
                .push(columns.iter().map(|c| c.to_string()).collect());
        }
    }

    /// Snapshot of a table's rows, empty if the table does not exist.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Makes every `op` on `table` fail with `message` until cleared.
    pub fn inject_failure(&self, table: &str, op: Operation, message: &str) {
        self.lock()
            .failures
            .insert((table.to_string(), op), message.to_string());
    }

    pub fn clear_failure(&self, table: &str, op: Operation) {
        self.lock().failures.remove(&(table.to_string(), op));
    }

    /// Makes inserts of more than one row into `table` fail.
    pub fn reject_batch_inserts(&self, table: &str) {
        self.lock().batch_rejections.insert(table.to_string());
    }

    pub fn fail_sign_out(&self, message: Option<&str>) {
        self.lock().sign_out_failure = message.map(str::to_string);
    }

    /// How many times `op` was attempted on `table`, failed attempts included.
    pub fn call_count(&self, table: &str, op: Operation) -> usize {
        self.lock()
            .calls
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    /// Seeds rows directly, bypassing constraints and call accounting.
    pub fn put_rows(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.lock();
        if let Some(t) = state.tables.get_mut(table) {
            for mut row in rows {
                if t.serial_id && row.get("id").is_none() {
                    if let Some(obj) = row.as_object_mut() {
                        obj.insert("id".to_string(), Value::from(t.next_id));
                    }
                    t.next_id += 1;
                }
                t.rows.push(row);
            }
        }
    }

    /// Makes the current session look expired.
    pub fn expire_session(&self) {
        if let Some(session) = self.lock().session.as_mut() {
            session.expires_at = Some(chrono::Utc::now().timestamp() - 1);
        }
    }

    /// Drops the session as if it had been revoked from another device.
    pub fn revoke_session(&self) {
        self.lock().session = None;
        self.listeners.notify(AuthChangeEvent::SignedOut, None);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_session(&self, user: AuthUser) -> Session {
        Session {
            access_token: random_token(64),
            refresh_token: Some(random_token(32)),
            expires_at: Some(chrono::Utc::now().timestamp() + self.session_ttl_secs),
            user,
        }
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn password_digest(salt: &str, password: &str) -> String {
    Sha256::digest(format!("{}{}", salt, password).as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn unknown_column(table: &str, column: &str) -> GatewayError {
    GatewayError::api(
        400,
        Some(UNDEFINED_COLUMN_CODE),
        format!("column {}.{} does not exist", table, column),
    )
}

/// Checks injected failures, table existence and filter columns, and
/// records the call.
fn check_access<'a>(
    state: &'a mut MemoryState,
    table: &str,
    op: Operation,
    filters: &[Filter],
) -> Result<&'a mut MemoryTable, GatewayError> {
    *state.calls.entry((table.to_string(), op)).or_insert(0) += 1;
    if let Some(message) = state.failures.get(&(table.to_string(), op)) {
        return Err(GatewayError::api(500, None, message.clone()));
    }
    let t = state
        .tables
        .get_mut(table)
        .ok_or_else(|| GatewayError::relation_missing(table))?;
    for filter in filters {
        if !t.has_column(filter.column()) {
            return Err(unknown_column(table, filter.column()));
        }
    }
    Ok(t)
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.lock();
        let t = check_access(&mut state, &query.table, Operation::Select, &query.filters)?;

        let projection = query.projected_columns();
        if let Some(columns) = &projection {
            if let Some(missing) = columns.iter().find(|c| !t.has_column(c)) {
                return Err(unknown_column(&query.table, missing));
            }
        }

        let mut rows: Vec<Value> = t
            .rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            if !t.has_column(&order.column) {
                return Err(unknown_column(&query.table, &order.column));
            }
            rows.sort_by(|a, b| {
                let ord = compare_cells(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(columns) = projection {
            rows = rows
                .into_iter()
                .map(|row| {
                    let projected: Map<String, Value> = columns
                        .iter()
                        .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                        .collect();
                    Value::Object(projected)
                })
                .collect();
        }
        Ok(rows)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, GatewayError> {
        let mut state = self.lock();
        let t = check_access(&mut state, table, Operation::Count, filters)?;
        Ok(t.rows
            .iter()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
            .count() as u64)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.lock();
        let reject_batch = state.batch_rejections.contains(table);
        let t = check_access(&mut state, table, Operation::Insert, &[])?;

        if reject_batch && rows.len() > 1 {
            return Err(GatewayError::api(
                400,
                None,
                format!("batch insert into {} rejected", table),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut next_id = t.next_id;
        let mut pending: Vec<Value> = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut obj) = row else {
                return Err(GatewayError::api(400, None, "row must be a JSON object"));
            };
            if let Some(column) = obj.keys().find(|k| !t.has_column(k)) {
                return Err(GatewayError::api(
                    400,
                    Some(UNDEFINED_COLUMN_CODE),
                    format!("column \"{}\" of relation \"{}\" does not exist", column, table),
                ));
            }
            if t.serial_id && obj.get("id").map_or(true, Value::is_null) {
                obj.insert("id".to_string(), Value::from(next_id));
                next_id += 1;
            }
            if t.has_column("created_at") && obj.get("created_at").map_or(true, Value::is_null) {
                obj.insert("created_at".to_string(), Value::from(now.clone()));
            }
            for column in &t.columns {
                obj.entry(column.clone()).or_insert(Value::Null);
            }
            let candidate = Value::Object(obj);
            if let Some(constraint) = t.violates_unique(&candidate, &pending) {
                return Err(GatewayError::api(
                    409,
                    Some(UNIQUE_VIOLATION_CODE),
                    format!(
                        "duplicate key value violates unique constraint on {} ({})",
                        table, constraint
                    ),
                ));
            }
            pending.push(candidate);
        }

        debug!(table, rows = pending.len(), "memory insert");
        t.next_id = next_id;
        t.rows.extend(pending.iter().cloned());
        Ok(pending)
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.lock();
        let t = check_access(&mut state, table, Operation::Update, filters)?;
        let Value::Object(patch) = patch else {
            return Err(GatewayError::api(400, None, "patch must be a JSON object"));
        };
        if let Some(column) = patch.keys().find(|k| !t.has_column(k)) {
            return Err(unknown_column(table, column));
        }

        let mut updated = vec![];
        for row in t.rows.iter_mut() {
            if !filters.iter().all(|f| f.matches(row)) {
                continue;
            }
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in &patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, GatewayError> {
        let mut state = self.lock();
        let t = check_access(&mut state, table, Operation::Delete, filters)?;
        let (deleted, kept): (Vec<Value>, Vec<Value>) = t
            .rows
            .drain(..)
            .partition(|row| filters.iter().all(|f| f.matches(row)));
        t.rows = kept;
        Ok(deleted)
    }
}

#[async_trait]
impl AuthGateway for MemoryGateway {
    async fn get_session(&self) -> Result<Option<Session>, GatewayError> {
        let refreshed = {
            let mut state = self.lock();
            let Some(current) = state.session.clone() else {
                return Ok(None);
            };
            if !current.is_expired() {
                return Ok(Some(current));
            }
            if current.refresh_token.is_none() {
                state.session = None;
                None
            } else {
                let session = self.new_session(current.user.clone());
                state.session = Some(session.clone());
                Some(session)
            }
        };
        match &refreshed {
            Some(session) => self
                .listeners
                .notify(AuthChangeEvent::TokenRefreshed, Some(session)),
            None => self.listeners.notify(AuthChangeEvent::SignedOut, None),
        }
        Ok(refreshed)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, GatewayError> {
        let session = {
            let mut state = self.lock();
            let account = state
                .accounts
                .get(&email.to_lowercase())
                .filter(|a| a.digest == password_digest(&a.salt, password))
                .ok_or_else(|| GatewayError::Auth("Invalid login credentials".to_string()))?;
            let session = self.new_session(account.user.clone());
            state.session = Some(session.clone());
            session
        };
        self.listeners
            .notify(AuthChangeEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, GatewayError> {
        if !email.contains('@') {
            return Err(GatewayError::Auth(format!(
                "Unable to validate email address: invalid format ({})",
                email
            )));
        }
        if password.len() < 6 {
            return Err(GatewayError::Auth(
                "Password should be at least 6 characters".to_string(),
            ));
        }
        let mut state = self.lock();
        let key = email.to_lowercase();
        if state.accounts.contains_key(&key) {
            return Err(GatewayError::Auth("User already registered".to_string()));
        }
        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        let salt = random_token(16);
        let digest = password_digest(&salt, password);
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                salt,
                digest,
            },
        );
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.lock();
            if let Some(message) = &state.sign_out_failure {
                return Err(GatewayError::Auth(message.clone()));
            }
            state.session = None;
        }
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
