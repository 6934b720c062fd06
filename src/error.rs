//! Unified session error model.
//! Every failure inside the session core is mapped onto one of these variants and then
//! either swallowed into a safe default (anonymous session) or shown to the user as an alert.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionError {
    #[error("storage_corruption: {message}")]
    StorageCorruption { message: String },
    #[error("missing_auth_payload: {field}")]
    MissingAuthPayload { field: String },
    #[error("storage_write: {message}")]
    StorageWrite { message: String },
    #[error("storage_read: {message}")]
    StorageRead { message: String },
    #[error("backend: {message} (status {status:?})")]
    Backend { status: Option<u16>, message: String },
    #[error("config: {message}")]
    Config { message: String },
}

impl SessionError {
    pub fn code_str(&self) -> &'static str {
        match self {
            SessionError::StorageCorruption { .. } => "storage_corruption",
            SessionError::MissingAuthPayload { .. } => "missing_auth_payload",
            SessionError::StorageWrite { .. } => "storage_write",
            SessionError::StorageRead { .. } => "storage_read",
            SessionError::Backend { .. } => "backend",
            SessionError::Config { .. } => "config",
        }
    }

    pub fn corruption<S: Into<String>>(msg: S) -> Self { SessionError::StorageCorruption { message: msg.into() } }
    pub fn missing<S: Into<String>>(field: S) -> Self { SessionError::MissingAuthPayload { field: field.into() } }
    pub fn write<S: Into<String>>(msg: S) -> Self { SessionError::StorageWrite { message: msg.into() } }
    pub fn read<S: Into<String>>(msg: S) -> Self { SessionError::StorageRead { message: msg.into() } }
    pub fn backend<S: Into<String>>(status: Option<u16>, msg: S) -> Self { SessionError::Backend { status, message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { SessionError::Config { message: msg.into() } }

    /// Text shown in a user-visible alert.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::StorageCorruption { .. } => "Your saved session was unreadable and has been cleared. Please log in again.".to_string(),
            SessionError::MissingAuthPayload { field } => format!("Login response was incomplete (missing {}). Please try again.", field),
            SessionError::StorageWrite { message } => format!("Could not save your session: {}", message),
            SessionError::StorageRead { .. } => "Could not read your saved session. Please log in again.".to_string(),
            SessionError::Backend { message, .. } => message.clone(),
            SessionError::Config { message } => format!("Invalid configuration: {}", message),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
