//! Auth lifecycle controller.
//!
//! Owns the in-memory session snapshot and is the only writer of the session store. UI
//! code calls the `on_*` transition handlers and reads state through `get_session`,
//! `is_admin` and `guard`; navigation and alerts go out through the `Navigator` and
//! `AlertSink` seams so the decisions stay testable without a router.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{Config, RouteConfig};
use crate::error::SessionResult;
use crate::guard::{AccessDecision, AccessState, RouteGuard};
use crate::identity::{classify, AuthProvider, AuthResult, Classification, LoginRequest, RegisterRequest, Session, SessionStore};
use crate::storage::KeyValueStorage;

/// Router capability.
pub trait Navigator: Send + Sync {
    /// Push a new history entry.
    fn navigate(&self, path: &str);
    /// Overwrite the current history entry.
    fn replace(&self, path: &str) { self.navigate(path) }
    fn current_path(&self) -> String;
    /// Force a full reload of the current view.
    fn reload(&self);
}

/// User-visible alert channel.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// Alerts that only go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn alert(&self, message: &str) {
        warn!(target: "crisp::lifecycle", "alert: {}", message);
    }
}

#[derive(Debug)]
struct HistoryState {
    entries: Vec<String>,
    index: usize,
    reloads: usize,
}

/// In-memory browser-style history stack.
#[derive(Debug)]
pub struct HistoryNavigator {
    state: Mutex<HistoryState>,
}

impl Default for HistoryNavigator {
    fn default() -> Self { Self::starting_at("/") }
}

impl HistoryNavigator {
    pub fn starting_at(path: &str) -> Self {
        Self { state: Mutex::new(HistoryState { entries: vec![path.to_string()], index: 0, reloads: 0 }) }
    }

    /// Step back one entry; returns the new current path, `None` at the start of history.
    pub fn back(&self) -> Option<String> {
        let mut st = self.state.lock();
        if st.index == 0 { return None; }
        st.index -= 1;
        Some(st.entries[st.index].clone())
    }

    pub fn forward(&self) -> Option<String> {
        let mut st = self.state.lock();
        if st.index + 1 >= st.entries.len() { return None; }
        st.index += 1;
        Some(st.entries[st.index].clone())
    }

    pub fn entries(&self) -> Vec<String> { self.state.lock().entries.clone() }
    pub fn reload_count(&self) -> usize { self.state.lock().reloads }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, path: &str) {
        let mut st = self.state.lock();
        let keep = st.index + 1;
        st.entries.truncate(keep);
        st.entries.push(path.to_string());
        st.index = st.entries.len() - 1;
    }

    fn replace(&self, path: &str) {
        let mut st = self.state.lock();
        let i = st.index;
        st.entries[i] = path.to_string();
    }

    fn current_path(&self) -> String {
        let st = self.state.lock();
        st.entries[st.index].clone()
    }

    fn reload(&self) { self.state.lock().reloads += 1; }
}

pub struct AuthController {
    store: SessionStore,
    guard: RouteGuard,
    routes: RouteConfig,
    navigator: Arc<dyn Navigator>,
    alerts: Arc<dyn AlertSink>,
    current: RwLock<Session>,
}

impl AuthController {
    /// Starts anonymous; call `init` to pick up a persisted session.
    pub fn new(
        store: SessionStore,
        guard: RouteGuard,
        routes: RouteConfig,
        navigator: Arc<dyn Navigator>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self { store, guard, routes, navigator, alerts, current: RwLock::new(Session::anonymous()) }
    }

    pub fn from_config(
        config: &Config,
        storage: Arc<dyn KeyValueStorage>,
        navigator: Arc<dyn Navigator>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let store = SessionStore::new(storage, config.storage.keys.clone());
        let guard = RouteGuard::from_config(&config.routes, config.trust_policy);
        Self::new(store, guard, config.routes.clone(), navigator, alerts)
    }

    /// Startup validation: load the persisted session and drop it if its token has expired.
    pub fn init(&self) -> Session { self.init_at(Utc::now()) }

    pub fn init_at(&self, now: DateTime<Utc>) -> Session {
        let mut sess = self.store.load();
        if sess.is_expired(now) {
            info!(target: "crisp::lifecycle", user = ?sess.username(), "persisted session expired, clearing");
            if let Err(e) = self.store.clear() {
                warn!(target: "crisp::lifecycle", "clearing expired session failed: {}", e);
            }
            sess = Session::anonymous();
        }
        *self.current.write() = sess.clone();
        sess
    }

    /// Read-only snapshot of the current session.
    pub fn get_session(&self) -> Session { self.current.read().clone() }

    pub fn classification(&self) -> Classification { classify(self.current.read().identity()) }
    pub fn is_admin(&self) -> bool { self.classification().is_admin }
    pub fn access_state(&self) -> AccessState { AccessState::derive(&self.current.read()) }
    pub fn routes(&self) -> &RouteConfig { &self.routes }
    pub fn store(&self) -> &SessionStore { &self.store }

    pub fn guard(&self, requested_path: &str) -> AccessDecision {
        self.guard.guard(&self.current.read(), requested_path)
    }

    /// Guard `path` and move the router to it or to the redirect target.
    pub fn navigate_to(&self, path: &str) -> AccessDecision {
        let decision = self.guard(path);
        self.apply(path, decision);
        decision
    }

    fn apply(&self, path: &str, decision: AccessDecision) {
        match decision.redirect_target(&self.routes) {
            None => self.navigator.navigate(path),
            Some(target) => self.navigator.navigate(target),
        }
    }

    fn persist(&self, session: Session) -> SessionResult<()> {
        match self.store.save(&session) {
            Ok(()) => {
                info!(target: "crisp::lifecycle", user = ?session.username(), admin = classify(session.identity()).is_admin, "session stored");
                *self.current.write() = session;
                Ok(())
            }
            Err(e) => {
                self.alerts.alert(&e.user_message());
                // Reconcile with whatever actually reached storage
                *self.current.write() = self.store.load();
                Err(e)
            }
        }
    }

    fn accept(&self, result: AuthResult) -> SessionResult<()> {
        let (access, refresh, identity) = match result.require() {
            Ok(parts) => parts,
            Err(e) => {
                self.alerts.alert(&e.user_message());
                return Err(e);
            }
        };
        self.persist(Session::authenticated(access, Some(refresh), identity))
    }

    /// Persist a successful login and go to the dashboard.
    pub fn on_login_success(&self, result: AuthResult) -> SessionResult<()> {
        self.accept(result)?;
        self.navigator.navigate(&self.routes.dashboard);
        Ok(())
    }

    /// Persist a successful registration; the caller decides where to go next.
    pub fn on_register_success(&self, result: AuthResult) -> SessionResult<()> {
        self.accept(result)
    }

    /// Clear the session and return to the public root.
    pub fn on_logout(&self) -> SessionResult<()> {
        let user = self.current.read().username().map(|s| s.to_string());
        let res = self.store.clear();
        *self.current.write() = Session::anonymous();
        if let Err(e) = &res {
            self.alerts.alert(&e.user_message());
        }
        info!(target: "crisp::lifecycle", user = ?user, "logged out");
        self.navigator.navigate(&self.routes.root);
        res
    }

    /// Back/forward navigation landed on `path`: re-check storage so a view cached from
    /// before logout is not shown again.
    pub fn on_history_navigation(&self, path: &str) -> AccessDecision {
        let persisted = self.store.load();
        let anonymous = !persisted.is_authenticated();
        *self.current.write() = persisted;
        let decision = self.guard(path);
        if let Some(target) = decision.redirect_target(&self.routes) {
            if anonymous {
                warn!(target: "crisp::lifecycle", path, "history navigation without a session, reloading");
                self.navigator.reload();
            }
            self.navigator.replace(target);
        }
        decision
    }

    /// Run a login against the backend and apply the outcome.
    pub async fn login_with(&self, provider: &dyn AuthProvider, req: &LoginRequest) -> SessionResult<()> {
        match provider.login(req).await {
            Ok(result) => self.on_login_success(result),
            Err(e) => {
                self.alerts.alert(&e.user_message());
                Err(e)
            }
        }
    }

    /// Run a registration against the backend and apply the outcome.
    pub async fn register_with(&self, provider: &dyn AuthProvider, req: &RegisterRequest) -> SessionResult<()> {
        match provider.register(req).await {
            Ok(result) => self.on_register_success(result),
            Err(e) => {
                self.alerts.alert(&e.user_message());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
