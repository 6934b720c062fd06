pub mod error;
pub mod config;
pub mod storage;
pub mod identity;
pub mod guard;
pub mod lifecycle;

pub use config::{Config, TrustPolicy};
pub use error::{SessionError, SessionResult};
pub use guard::{AccessDecision, AccessState, RouteCategory, RouteGuard, RouteTable};
pub use identity::{AuthResult, Identity, Session, SessionStore};
pub use lifecycle::{AlertSink, AuthController, HistoryNavigator, Navigator, TracingAlerts};

// Debug-build trace helper: expands to eprintln! in tests and debug builds.
// Usage: tprintln!("session.save user={}", name);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
