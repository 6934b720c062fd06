use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{SessionError, SessionResult};

// Keys owned by the typed fields, camelCase aliases included
const RESERVED_KEYS: &[&str] = &["username", "role", "is_admin", "isAdmin", "is_staff", "isStaff"];

/// User identity attached to an authenticated session.
///
/// None of the role fields are trusted to agree with each other. Flags that arrive with a
/// non-boolean value are treated as absent rather than rejected; when both spellings of a
/// flag are present the snake_case one wins if it holds a boolean. Any fields this crate
/// does not interpret (organization, email, ...) are carried along in `extra` so the
/// dashboards reading the stored user record still find them. `extra` never holds a key
/// that would shadow a typed field on the next load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Map<String, Value>")]
pub struct Identity {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_staff: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

// Removes both spellings; the snake_case boolean wins over the camelCase one
fn take_flag(map: &mut Map<String, Value>, snake: &str, camel: &str) -> Option<bool> {
    let snake = map.remove(snake).and_then(|v| v.as_bool());
    let camel = map.remove(camel).and_then(|v| v.as_bool());
    snake.or(camel)
}

impl TryFrom<Map<String, Value>> for Identity {
    type Error = String;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let username = match map.remove("username") {
            Some(Value::String(s)) => s,
            Some(other) => return Err(format!("username must be a string, got {}", other)),
            None => return Err("missing field `username`".to_string()),
        };
        let role = match map.remove("role") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let is_admin = take_flag(&mut map, "is_admin", "isAdmin");
        let is_staff = take_flag(&mut map, "is_staff", "isStaff");
        Ok(Self { username, role, is_admin, is_staff, extra: map })
    }
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into(), ..Default::default() }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_admin_flag(mut self, v: bool) -> Self {
        self.is_admin = Some(v);
        self
    }

    pub fn with_staff_flag(mut self, v: bool) -> Self {
        self.is_staff = Some(v);
        self
    }

    /// Attach an uninterpreted field. Keys belonging to the typed fields are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn extra(&self) -> &Map<String, Value> { &self.extra }

    pub fn role_str(&self) -> Option<&str> { self.role.as_deref() }

    /// Parse the persisted JSON form.
    pub fn from_json(text: &str) -> SessionResult<Self> {
        serde_json::from_str(text).map_err(|e| SessionError::corruption(format!("identity: {}", e)))
    }

    pub fn to_json(&self) -> SessionResult<String> {
        serde_json::to_string(self).map_err(|e| SessionError::write(format!("identity: {}", e)))
    }
}

// First non-empty string found along any of the key paths
fn pick_str(body: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        let mut cur = body;
        for seg in path.iter() { cur = cur.get(*seg)?; }
        cur.as_str().filter(|s| !s.is_empty()).map(|s| s.to_string())
    })
}

/// Resolved result of a successful login or registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub identity: Option<Identity>,
}

impl AuthResult {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, identity: Identity) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            identity: Some(identity),
        }
    }

    /// Extract the three logical fields from whatever shape the backend returned.
    ///
    /// Tokens may sit under a `tokens` object (`tokens.access` / `tokens.refresh`) or at the
    /// top level under several spellings; the user record may be `user` or `identity`.
    /// Missing pieces are left as `None`; `require` decides whether the result is usable.
    pub fn from_response(body: &Value) -> Self {
        let access_token = pick_str(body, &[
            &["tokens", "access"], &["access"], &["access_token"], &["accessToken"], &["token"],
        ]);
        let refresh_token = pick_str(body, &[
            &["tokens", "refresh"], &["refresh"], &["refresh_token"], &["refreshToken"],
        ]);
        let identity = ["user", "identity"].iter()
            .filter_map(|k| body.get(*k))
            .find(|v| v.is_object())
            .and_then(|v| match serde_json::from_value::<Identity>(v.clone()) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(target: "crisp::api", "ignoring unparseable user record: {}", e);
                    None
                }
            });
        Self { access_token, refresh_token, identity }
    }

    /// All three fields or a `MissingAuthPayload` naming the first one absent.
    pub fn require(self) -> SessionResult<(String, String, Identity)> {
        let access = self.access_token.filter(|s| !s.is_empty()).ok_or_else(|| SessionError::missing("access_token"))?;
        let refresh = self.refresh_token.filter(|s| !s.is_empty()).ok_or_else(|| SessionError::missing("refresh_token"))?;
        let identity = self.identity.ok_or_else(|| SessionError::missing("identity"))?;
        Ok((access, refresh, identity))
    }
}
