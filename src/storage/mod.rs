//!
//! crisp-session storage module
//! ----------------------------
//! Process-external key/value persistence for the client session. The browser front ends
//! kept their token and user record in local storage; here that capability is a small
//! trait so the session store can run over an in-memory map (tests, embedding) or a
//! durable JSON document on disk.
//!
//! Writes are batched: `set_all` and `remove_all` apply every entry or none, which is what
//! lets the session store persist its three fields together.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{SessionError, SessionResult};

mod file;

pub use file::FileStorage;

/// Durable key/value capability consumed by the session store.
pub trait KeyValueStorage: Send + Sync {
    /// Read a single key. `Ok(None)` when absent.
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    /// Write all entries atomically: either every entry is visible afterwards or none is.
    fn set_all(&self, entries: &[(&str, String)]) -> SessionResult<()>;
    /// Remove all keys atomically. Missing keys are ignored.
    fn remove_all(&self, keys: &[&str]) -> SessionResult<()>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Arc<T> {
    fn get(&self, key: &str) -> SessionResult<Option<String>> { (**self).get(key) }
    fn set_all(&self, entries: &[(&str, String)]) -> SessionResult<()> { (**self).set_all(entries) }
    fn remove_all(&self, keys: &[&str]) -> SessionResult<()> { (**self).remove_all(keys) }
}

/// In-memory storage. Clones share the same underlying map.
///
/// An optional byte quota mirrors the browser storage limit: a batch that would push the
/// total size of keys plus values over the quota is rejected as a whole.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    map: Arc<RwLock<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn with_quota(bytes: usize) -> Self {
        Self { map: Arc::new(RwLock::new(HashMap::new())), quota: Some(bytes) }
    }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    /// Copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, String> { self.map.read().clone() }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> SessionResult<()> {
        let mut w = self.map.write();
        if let Some(limit) = self.quota {
            // Size the map as it would look after the batch, without touching it yet
            let mut sizes: HashMap<&str, usize> = w.iter().map(|(k, v)| (k.as_str(), k.len() + v.len())).collect();
            for (k, v) in entries {
                sizes.insert(*k, k.len() + v.len());
            }
            let projected: usize = sizes.values().sum();
            if projected > limit {
                return Err(SessionError::write(format!("quota exceeded ({} > {} bytes)", projected, limit)));
            }
        }
        for (k, v) in entries {
            w.insert((*k).to_string(), v.clone());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> SessionResult<()> {
        let mut w = self.map.write();
        for k in keys { w.remove(*k); }
        Ok(())
    }
}
