//! Per-upstream-origin virtualized browser state: a cookie jar plus
//! localStorage/sessionStorage key-value buckets.
//!
//! Locking is two-level so unrelated origins never contend: a top-level
//! read-write lock guards the origin map, and each origin session carries
//! its own read-write lock. Lookups take the top read lock, drop it, then
//! lock the session; creation double-checks under the top write lock. No
//! lock is ever held across an await point.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, header};
use cookie::Cookie;
use parking_lot::RwLock;
use time::OffsetDateTime;

/// A cookie as stored in the jar. Identity for replacement is
/// `(name, case-insensitive path)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: Option<OffsetDateTime>,
}

impl StoredCookie {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires, Some(at) if at < now)
    }
}

#[derive(Default)]
struct OriginState {
    cookies: Vec<StoredCookie>,
    local_storage: HashMap<String, String>,
    session_storage: HashMap<String, String>,
}

#[derive(Default)]
struct OriginSession {
    state: RwLock<OriginState>,
}

/// Thread-safe store of per-origin sessions. Origins are created lazily on
/// first reference and live for the process lifetime.
#[derive(Default)]
pub struct SessionStore {
    origins: RwLock<HashMap<String, Arc<OriginSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, origin: &str) -> Option<Arc<OriginSession>> {
        self.origins.read().get(origin).cloned()
    }

    fn get_or_create(&self, origin: &str) -> Arc<OriginSession> {
        if let Some(session) = self.lookup(origin) {
            return session;
        }
        let mut origins = self.origins.write();
        // Double-check: another writer may have raced us here.
        origins.entry(origin.to_string()).or_default().clone()
    }

    /// Parse every `Set-Cookie` header and upsert into the origin's jar.
    /// Replacement is in place by `(name, case-insensitive path)`; new
    /// cookies append.
    pub fn absorb_set_cookies(&self, origin: &str, headers: &HeaderMap) {
        let mut parsed = Vec::new();
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Ok(cookie) = Cookie::parse(raw) else { continue };
            let expires = cookie
                .max_age()
                .map(|age| OffsetDateTime::now_utc() + age)
                .or_else(|| cookie.expires_datetime());
            parsed.push(StoredCookie {
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
                path: cookie.path().unwrap_or("").to_string(),
                expires,
            });
        }
        if parsed.is_empty() {
            return;
        }

        let session = self.get_or_create(origin);
        let mut state = session.state.write();
        for cookie in parsed {
            match state
                .cookies
                .iter_mut()
                .find(|c| c.name == cookie.name && c.path.eq_ignore_ascii_case(&cookie.path))
            {
                Some(existing) => *existing = cookie,
                None => state.cookies.push(cookie),
            }
        }
    }

    /// Build the `Cookie` request header value for an origin, skipping
    /// expired cookies. Empty string when the origin has no usable cookies.
    pub fn cookie_header(&self, origin: &str) -> String {
        let Some(session) = self.lookup(origin) else {
            return String::new();
        };
        let state = session.state.read();
        let now = OffsetDateTime::now_utc();
        state
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Snapshot of the stored cookies for an origin.
    pub fn get_cookies(&self, origin: &str) -> Vec<StoredCookie> {
        match self.lookup(origin) {
            Some(session) => session.state.read().cookies.clone(),
            None => Vec::new(),
        }
    }

    /// Remove the first cookie matching `name` from the origin's jar.
    pub fn delete_cookie(&self, origin: &str, name: &str) {
        let Some(session) = self.lookup(origin) else { return };
        let mut state = session.state.write();
        if let Some(idx) = state.cookies.iter().position(|c| c.name == name) {
            state.cookies.remove(idx);
        }
    }

    pub fn set_local(&self, origin: &str, key: &str, value: &str) {
        let session = self.get_or_create(origin);
        session
            .state
            .write()
            .local_storage
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_local(&self, origin: &str, key: &str) -> Option<String> {
        self.lookup(origin)?.state.read().local_storage.get(key).cloned()
    }

    pub fn delete_local(&self, origin: &str, key: &str) {
        if let Some(session) = self.lookup(origin) {
            session.state.write().local_storage.remove(key);
        }
    }

    pub fn clear_local(&self, origin: &str) {
        if let Some(session) = self.lookup(origin) {
            session.state.write().local_storage.clear();
        }
    }

    pub fn set_session(&self, origin: &str, key: &str, value: &str) {
        let session = self.get_or_create(origin);
        session
            .state
            .write()
            .session_storage
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_session(&self, origin: &str, key: &str) -> Option<String> {
        self.lookup(origin)?.state.read().session_storage.get(key).cloned()
    }

    pub fn delete_session(&self, origin: &str, key: &str) {
        if let Some(session) = self.lookup(origin) {
            session.state.write().session_storage.remove(key);
        }
    }

    pub fn clear_session(&self, origin: &str) {
        if let Some(session) = self.lookup(origin) {
            session.state.write().session_storage.clear();
        }
    }

    /// Wipe every origin's state.
    pub fn clear_all(&self) {
        self.origins.write().clear();
    }
}
