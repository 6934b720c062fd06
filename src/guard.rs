//! Route guarding.
//!
//! Decides, for every navigation, whether the requested path renders or where the user is
//! sent instead. The decision is a pure function of (session, path, trust policy); applying
//! it to a router lives in `lifecycle`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{RouteConfig, TrustPolicy};
use crate::identity::{classify, has_privileged_role, Session};

/// Access policy class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    /// Landing page and static information
    Public,
    /// Login, forgot-password, reset-password
    AuthEntry,
    Registration,
    Dashboard,
    UserManagement,
    TrustManagement,
}

/// Outcome of guarding one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
    RedirectToRoot,
}

impl AccessDecision {
    /// Path to navigate to, `None` for `Allow`.
    pub fn redirect_target<'a>(&self, routes: &'a RouteConfig) -> Option<&'a str> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::RedirectToLogin => Some(routes.login.as_str()),
            AccessDecision::RedirectToDashboard => Some(routes.dashboard.as_str()),
            AccessDecision::RedirectToRoot => Some(routes.root.as_str()),
        }
    }

    pub fn is_allow(&self) -> bool { matches!(self, AccessDecision::Allow) }
}

/// Who is navigating, derived from the session on every evaluation and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessState {
    Anonymous,
    /// Authenticated non-administrator; `privileged` for roles like `publisher`.
    AuthenticatedUser { privileged: bool },
    AuthenticatedAdmin,
}

impl AccessState {
    pub fn derive(session: &Session) -> Self {
        if !session.is_authenticated() { return AccessState::Anonymous; }
        let identity = session.identity();
        let is_admin = classify(identity).is_admin;
        if is_admin {
            AccessState::AuthenticatedAdmin
        } else {
            AccessState::AuthenticatedUser { privileged: has_privileged_role(identity, false) }
        }
    }

    pub fn is_authenticated(&self) -> bool { !matches!(self, AccessState::Anonymous) }
}

/// The access policy table. `None` category means the path is unknown.
pub fn decide(state: AccessState, category: Option<RouteCategory>, trust: TrustPolicy) -> AccessDecision {
    use AccessDecision::*;
    use AccessState::*;
    let Some(category) = category else { return RedirectToRoot; };
    match (category, state) {
        (RouteCategory::Public, _) => Allow,

        (RouteCategory::AuthEntry, Anonymous) => Allow,
        (RouteCategory::AuthEntry, _) => RedirectToDashboard,

        (RouteCategory::Registration, Anonymous) => Allow,
        (RouteCategory::Registration, AuthenticatedAdmin) => Allow,
        (RouteCategory::Registration, AuthenticatedUser { .. }) => RedirectToDashboard,

        (RouteCategory::Dashboard, Anonymous) => RedirectToLogin,
        (RouteCategory::Dashboard, _) => Allow,

        (RouteCategory::UserManagement, Anonymous) => RedirectToLogin,
        (RouteCategory::UserManagement, AuthenticatedAdmin) => Allow,
        (RouteCategory::UserManagement, AuthenticatedUser { .. }) => RedirectToDashboard,

        (RouteCategory::TrustManagement, Anonymous) => RedirectToLogin,
        (RouteCategory::TrustManagement, AuthenticatedAdmin) => Allow,
        (RouteCategory::TrustManagement, AuthenticatedUser { privileged: true }) => match trust {
            TrustPolicy::PrivilegedRole => Allow,
            TrustPolicy::AdminOnly => RedirectToDashboard,
        },
        (RouteCategory::TrustManagement, AuthenticatedUser { privileged: false }) => RedirectToDashboard,
    }
}

/// Strip query and fragment, drop trailing slashes (root excepted) and lowercase.
pub fn normalize_path(path: &str) -> String {
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    let p = path[..end].trim();
    let p = p.trim_end_matches('/');
    if p.is_empty() { return "/".to_string(); }
    let mut out = String::with_capacity(p.len() + 1);
    if !p.starts_with('/') { out.push('/'); }
    out.push_str(&p.to_lowercase());
    out
}

const DEFAULT_ROUTES: &[(&str, RouteCategory)] = &[
    ("/", RouteCategory::Public),
    ("/about", RouteCategory::Public),
    ("/contact", RouteCategory::Public),
    ("/privacy", RouteCategory::Public),
    ("/terms", RouteCategory::Public),
    ("/login", RouteCategory::AuthEntry),
    ("/forgot-password", RouteCategory::AuthEntry),
    ("/reset-password", RouteCategory::AuthEntry),
    ("/register", RouteCategory::Registration),
    ("/dashboard", RouteCategory::Dashboard),
    ("/user-management", RouteCategory::UserManagement),
    ("/trust-management", RouteCategory::TrustManagement),
];

static DEFAULT_TABLE: Lazy<RouteTable> = Lazy::new(|| {
    let mut t = RouteTable { entries: HashMap::new() };
    for (path, cat) in DEFAULT_ROUTES { t.insert(path, *cat); }
    t
});

/// Path → category lookup over normalised paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    entries: HashMap<String, RouteCategory>,
}

impl Default for RouteTable {
    fn default() -> Self { DEFAULT_TABLE.clone() }
}

impl RouteTable {
    /// Defaults, then the configured named routes, then configured extras (later wins).
    pub fn from_config(routes: &RouteConfig) -> Self {
        let mut t = Self::default();
        t.insert(&routes.root, RouteCategory::Public);
        t.insert(&routes.login, RouteCategory::AuthEntry);
        t.insert(&routes.dashboard, RouteCategory::Dashboard);
        for (path, cat) in routes.extra.iter() { t.insert(path, *cat); }
        t
    }

    pub fn insert(&mut self, path: &str, category: RouteCategory) {
        self.entries.insert(normalize_path(path), category);
    }

    pub fn category(&self, path: &str) -> Option<RouteCategory> {
        self.entries.get(&normalize_path(path)).copied()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Route table plus trust policy; evaluates navigations against a session.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    table: RouteTable,
    trust: TrustPolicy,
}

impl Default for RouteGuard {
    fn default() -> Self { Self { table: RouteTable::default(), trust: TrustPolicy::default() } }
}

impl RouteGuard {
    pub fn new(table: RouteTable, trust: TrustPolicy) -> Self { Self { table, trust } }

    pub fn from_config(routes: &RouteConfig, trust: TrustPolicy) -> Self {
        Self::new(RouteTable::from_config(routes), trust)
    }

    pub fn table(&self) -> &RouteTable { &self.table }
    pub fn trust_policy(&self) -> TrustPolicy { self.trust }

    pub fn guard(&self, session: &Session, path: &str) -> AccessDecision {
        let state = AccessState::derive(session);
        let category = self.table.category(path);
        let decision = decide(state, category, self.trust);
        debug!(target: "crisp::guard", path, ?state, ?category, ?decision, "guard");
        decision
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod guard_tests;
