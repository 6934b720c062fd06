//! Client session and identity handling shared by every CRISP front end.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod classifier;
mod provider;

pub use principal::{Identity, AuthResult};
pub use session::{Session, SessionStore, jwt_expiry};
pub use classifier::{classify, has_privileged_role, AdminRule, Classification, ADMIN_ROLE_NAMES, PRIVILEGED_ROLE_NAMES};
pub use provider::{AuthProvider, HttpAuthProvider, LoginRequest, RegisterRequest};
