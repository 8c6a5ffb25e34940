//! In-memory session store.
//!
//! Round state and tokens live server-side, keyed by a `sid` cookie. Each
//! session sits behind its own lock so guess submissions for one session are
//! serialized while other sessions proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::game::Round;

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "sid";

/// Per-client session state.
#[derive(Debug, Default, Clone)]
pub struct Session {
    /// Anti-CSRF state issued at login, consumed at callback
    pub oauth_state: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub round: Option<Round>,
}

/// Shared map of sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its identifier.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(Session::default())));
        id
    }

    /// Look up the lock handle for a session.
    pub async fn entry(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.inner.read().await.get(&id).cloned()
    }
}

/// Extract the session id from the request's `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Uuid::parse_str(value.trim()).ok()
        } else {
            None
        }
    })
}

/// Build the `Set-Cookie` value for a session id.
pub fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}
