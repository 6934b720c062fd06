//! Runtime configuration.
//!
//! Every field has a default so an absent or partial JSON file is fine. Environment
//! variables (`CRISP_*`) override whatever the file said.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::guard::RouteCategory;

/// Storage keys for the three persisted session fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: "crisp_auth_token".into(),
            refresh_token: "crisp_refresh_token".into(),
            identity: "crisp_user".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the session document
    pub dir: PathBuf,
    pub file_name: String,
    pub keys: StorageKeys,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from(".crisp"), file_name: "session.json".into(), keys: StorageKeys::default() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub login_path: String,
    pub register_path: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            login_path: "/auth/login/".into(),
            register_path: "/auth/register/".into(),
            timeout_secs: 30,
        }
    }
}

/// Named navigation targets plus additional path → category entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouteConfig {
    pub root: String,
    pub login: String,
    pub dashboard: String,
    pub extra: BTreeMap<String, RouteCategory>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { root: "/".into(), login: "/login".into(), dashboard: "/dashboard".into(), extra: BTreeMap::new() }
    }
}

/// Who may open trust management.
///
/// The front-end copies disagreed: some let `publisher` in, others required an
/// administrator. `PrivilegedRole` is the default; deployments can tighten it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    #[default]
    PrivilegedRole,
    AdminOnly,
}

impl std::str::FromStr for TrustPolicy {
    type Err = SessionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "privileged_role" | "privileged" => Ok(TrustPolicy::PrivilegedRole),
            "admin_only" | "admin" => Ok(TrustPolicy::AdminOnly),
            other => Err(SessionError::config(format!("unknown trust policy '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub routes: RouteConfig,
    pub trust_policy: TrustPolicy,
}

impl Config {
    /// Read a JSON config file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(target: "crisp::config", "no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|e| SessionError::config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice::<Config>(&bytes).map_err(|e| SessionError::config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `CRISP_*` overrides from the process environment.
    pub fn apply_env(self) -> SessionResult<Self> {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> SessionResult<Self> {
        if let Some(dir) = var("CRISP_STORAGE_DIR") { self.storage.dir = PathBuf::from(dir); }
        if let Some(base) = var("CRISP_API_BASE") { self.api.base_url = base.trim_end_matches('/').to_string(); }
        if let Some(p) = var("CRISP_TRUST_POLICY") { self.trust_policy = p.parse()?; }
        if let Some(t) = var("CRISP_API_TIMEOUT_SECS") {
            self.api.timeout_secs = t.trim().parse::<u64>()
                .map_err(|_| SessionError::config(format!("CRISP_API_TIMEOUT_SECS must be an integer, got '{}'", t)))?;
        }
        Ok(self)
    }

    pub fn storage_path(&self) -> PathBuf { self.storage.dir.join(&self.storage.file_name) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("crisp.json");
        std::fs::write(&p, r#"{"api": {"base_url": "https://crisp.example/api"}, "trust_policy": "admin_only"}"#).unwrap();
        let cfg = Config::load(&p).unwrap();
        assert_eq!(cfg.api.base_url, "https://crisp.example/api");
        assert_eq!(cfg.api.login_path, "/auth/login/");
        assert_eq!(cfg.trust_policy, TrustPolicy::AdminOnly);
        assert_eq!(cfg.storage.keys, StorageKeys::default());
    }

    #[test]
    fn missing_file_is_default() {
        let cfg = Config::load("/definitely/not/here/crisp.json").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn bad_json_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("crisp.json");
        std::fs::write(&p, "{").unwrap();
        assert_eq!(Config::load(&p).unwrap_err().code_str(), "config");
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CRISP_STORAGE_DIR", "/tmp/crisp-state"),
            ("CRISP_API_BASE", "http://api.local:9000/api/"),
            ("CRISP_TRUST_POLICY", "admin-only"),
            ("CRISP_API_TIMEOUT_SECS", "5"),
        ].into_iter().collect();
        let cfg = Config::default().apply_vars(|k| vars.get(k).map(|s| s.to_string())).unwrap();
        assert_eq!(cfg.storage.dir, PathBuf::from("/tmp/crisp-state"));
        assert_eq!(cfg.api.base_url, "http://api.local:9000/api");
        assert_eq!(cfg.trust_policy, TrustPolicy::AdminOnly);
        assert_eq!(cfg.api.timeout_secs, 5);
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        let err = Config::default().apply_vars(|k| (k == "CRISP_TRUST_POLICY").then(|| "everyone".to_string())).unwrap_err();
        assert_eq!(err.code_str(), "config");
        let err = Config::default().apply_vars(|k| (k == "CRISP_API_TIMEOUT_SECS").then(|| "soon".to_string())).unwrap_err();
        assert_eq!(err.code_str(), "config");
    }

    #[test]
    fn extra_routes_deserialize() {
        let cfg: Config = serde_json::from_str(r#"{"routes": {"extra": {"/reports": "dashboard", "/faq": "public"}}}"#).unwrap();
        assert_eq!(cfg.routes.extra.get("/reports"), Some(&RouteCategory::Dashboard));
        assert_eq!(cfg.routes.login, "/login");
    }
}
