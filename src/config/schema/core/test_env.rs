use std::cell::RefCell;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Every variable `Config::apply_env_overrides` reads.
const OVERRIDE_KEYS: &[&str] = &[
    "AI_BASE_URL",
    "PYTHON_AI_SERVICE_PORT",
    "AI_REQUEST_TIMEOUT",
    "AI_STREAM_INTERVAL",
    "DOOTASK_BOT_TOKEN",
    "DOOTASK_BASE_URL",
    "DOOTASK_AI_HOST",
    "HOST",
    "DOOTASK_AI_PORT",
    "PORT",
    "DOOTASK_AI_PUBLIC_URL",
    "DATABASE_URL",
];

/// Serialises env-mutating tests and restores every touched variable on drop.
pub(crate) struct EnvScope {
    saved: RefCell<Vec<(&'static str, Option<String>)>>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvScope {
    /// Take the lock and clear all override variables.
    pub(crate) fn clean() -> Self {
        let scope = Self {
            saved: RefCell::new(Vec::new()),
            _lock: ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
        };
        for &key in OVERRIDE_KEYS {
            scope.remember(key);
            // SAFETY: ENV_LOCK is held for the lifetime of the scope.
            unsafe {
                std::env::remove_var(key);
            }
        }
        scope
    }

    pub(crate) fn set(&self, key: &'static str, value: &str) {
        self.remember(key);
        // SAFETY: ENV_LOCK is held for the lifetime of the scope.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn remember(&self, key: &'static str) {
        let mut saved = self.saved.borrow_mut();
        if !saved.iter().any(|(k, _)| *k == key) {
            saved.push((key, std::env::var(key).ok()));
        }
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, previous) in self.saved.borrow().iter() {
            // SAFETY: the lock guard is dropped only after this body runs.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
