use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::principal::Identity;
use crate::config::StorageKeys;
use crate::error::{SessionError, SessionResult};
use crate::storage::KeyValueStorage;
use crate::tprintln;

/// Client-held authentication state.
///
/// Either fully authenticated (access token and identity both present) or fully anonymous.
/// Fields are private so no caller can build the half-authenticated shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self { Self::default() }

    /// An empty access token cannot be persisted and read back, so it yields an
    /// anonymous session.
    pub fn authenticated(access_token: impl Into<String>, refresh_token: Option<String>, identity: Identity) -> Self {
        let access_token = access_token.into();
        if access_token.is_empty() { return Self::anonymous(); }
        Self {
            access_token: Some(access_token),
            refresh_token: refresh_token.filter(|s| !s.is_empty()),
            identity: Some(identity),
        }
    }

    pub fn access_token(&self) -> Option<&str> { self.access_token.as_deref() }
    pub fn refresh_token(&self) -> Option<&str> { self.refresh_token.as_deref() }
    pub fn identity(&self) -> Option<&Identity> { self.identity.as_ref() }
    pub fn is_authenticated(&self) -> bool { self.access_token.is_some() }
    pub fn username(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.username.as_str()) }

    /// Expiry of the access token when it is a JWT carrying an `exp` claim.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token.as_deref().and_then(jwt_expiry)
    }

    /// True only for a JWT access token whose `exp` lies at or before `now`.
    /// Opaque tokens are never considered expired on the client.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Decode the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() { return None; }
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Durable home of the session across restarts.
///
/// The three fields are always written in one batch. An absent refresh token is stored as
/// an empty string so the batch shape never changes.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    keys: StorageKeys,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, keys: StorageKeys) -> Self {
        Self { storage, keys }
    }

    pub fn with_default_keys(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::new(storage, StorageKeys::default())
    }

    pub fn keys(&self) -> &StorageKeys { &self.keys }

    /// Read the persisted session. Never fails: unreadable, unparseable or half-written
    /// state is logged, wiped and reported as anonymous.
    pub fn load(&self) -> Session {
        match self.try_load() {
            Ok(sess) => sess,
            Err(e) => {
                warn!(target: "crisp::session", code = e.code_str(), "discarding persisted session: {}", e);
                if let Err(ce) = self.clear() {
                    warn!(target: "crisp::session", "clearing discarded session failed: {}", ce);
                }
                Session::anonymous()
            }
        }
    }

    fn try_load(&self) -> SessionResult<Session> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let access = non_empty(self.storage.get(&self.keys.access_token)?);
        let refresh = non_empty(self.storage.get(&self.keys.refresh_token)?);
        let user = non_empty(self.storage.get(&self.keys.identity)?);
        match (access, user) {
            (None, None) if refresh.is_none() => Ok(Session::anonymous()),
            (None, None) => Err(SessionError::corruption("refresh token without access token")),
            (Some(_), None) => Err(SessionError::corruption("access token without identity")),
            (None, Some(_)) => Err(SessionError::corruption("identity without access token")),
            (Some(access), Some(user)) => {
                let identity = Identity::from_json(&user)?;
                debug!(target: "crisp::session", user = %identity.username, "loaded persisted session");
                Ok(Session::authenticated(access, refresh, identity))
            }
        }
    }

    /// Persist the session; an anonymous session clears storage.
    pub fn save(&self, session: &Session) -> SessionResult<()> {
        let (Some(access), Some(identity)) = (session.access_token(), session.identity()) else {
            return self.clear();
        };
        let user = identity.to_json()?;
        self.storage.set_all(&[
            (self.keys.access_token.as_str(), access.to_string()),
            (self.keys.refresh_token.as_str(), session.refresh_token().unwrap_or("").to_string()),
            (self.keys.identity.as_str(), user),
        ])?;
        tprintln!("session.save user={} refresh={}", identity.username, session.refresh_token().is_some());
        Ok(())
    }

    pub fn clear(&self) -> SessionResult<()> {
        self.storage.remove_all(&[
            self.keys.access_token.as_str(),
            self.keys.refresh_token.as_str(),
            self.keys.identity.as_str(),
        ])?;
        tprintln!("session.clear");
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
