//! Shared test utilities for config module tests.

use std::sync::Mutex;

use super::ENV_VARS;

/// Mutex to serialize environment variable tests and prevent race conditions.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Set an environment variable. Callers must hold `ENV_MUTEX`.
pub fn set_env(name: &str, value: &str) {
    // SAFETY: env-mutating tests are serialized by ENV_MUTEX.
    unsafe { std::env::set_var(name, value) };
}

/// Clear every variable mnemos config reads. Callers must hold `ENV_MUTEX`.
pub fn cleanup_env_vars() {
    for var in ENV_VARS {
        // SAFETY: env-mutating tests are serialized by ENV_MUTEX.
        unsafe { std::env::remove_var(var) };
    }
}
