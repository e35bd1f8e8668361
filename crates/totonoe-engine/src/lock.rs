//! Named lock manager
//!
//! Serializes lifecycle operations that touch a shared remote object through
//! logically distinct resource definitions — a disk and the server it is
//! attached to both mutate the server, and the remote API's optimistic
//! concurrency cannot see that relationship. The registry is process-local
//! and in-memory: a best-effort safety net layered above remote concurrency
//! checks, not a replacement for them.
//!
//! Entries are created on first use and removed when the last holder or
//! waiter lets go, so the registry never grows beyond the set of tokens
//! currently in contention.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Logical name of a shared remote object
///
/// Multiple resource ids may map to the same token: a disk attached to a
/// server and the server itself both lock the server's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LockToken {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LockToken {
    fn from(name: String) -> Self {
        Self(name)
    }
}

struct Entry {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus waiters currently interested in this token
    refs: usize,
}

/// Process-wide registry of keyed mutexes
#[derive(Default)]
pub struct LockManager {
    entries: Mutex<HashMap<String, Entry>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently registered (held or waited on)
    pub fn active_tokens(&self) -> usize {
        self.entries.lock().expect("lock registry poisoned").len()
    }

    /// Acquire the keyed mutex for `token`, waiting while another operation
    /// holds it. Waiters queue first-come-first-served (tokio's mutex is
    /// fair). Acquisition itself never fails; callers bound the wait with
    /// their step deadline via `tokio::time::timeout_at`, and dropping the
    /// future mid-wait deregisters the waiter without acquiring.
    ///
    /// Not re-entrant: a task that already holds `token` must not call
    /// `acquire` for it again — helpers that run inside a critical section
    /// take `&LockGuard` as proof the token is already held.
    pub async fn acquire(&self, token: &LockToken) -> LockGuard<'_> {
        let mutex = self.register(token.as_str());
        let mut reservation = Reservation {
            manager: self,
            token: token.as_str(),
            armed: true,
        };
        let guard = mutex.lock_owned().await;
        // The refcount now belongs to the LockGuard.
        reservation.armed = false;
        tracing::trace!(token = token.as_str(), "lock acquired");
        LockGuard {
            manager: self,
            token: token.as_str().to_string(),
            guard: Some(guard),
        }
    }

    fn register(&self, token: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().expect("lock registry poisoned");
        let entry = entries.entry(token.to_string()).or_insert_with(|| Entry {
            mutex: Arc::new(AsyncMutex::new(())),
            refs: 0,
        });
        entry.refs += 1;
        Arc::clone(&entry.mutex)
    }

    fn deregister(&self, token: &str) {
        let mut entries = self.entries.lock().expect("lock registry poisoned");
        if let Some(entry) = entries.get_mut(token) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(token);
            }
        }
    }
}

/// Deregisters a waiter whose acquire future was dropped before the mutex
/// was taken (e.g. a deadline elapsed mid-wait).
struct Reservation<'a> {
    manager: &'a LockManager,
    token: &'a str,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.deregister(self.token);
        }
    }
}

/// RAII guard for a named lock
///
/// Released on drop, so the lock is released on every exit path, including
/// early returns and panics.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    token: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockGuard<'_> {
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before the registry entry can be collected;
        // an entry is only removed once no holder or waiter references it.
        self.guard.take();
        self.manager.deregister(&self.token);
        tracing::trace!(token = %self.token, "lock released");
    }
}
