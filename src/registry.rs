//! Lifecycle of per-user memory clients.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::memory::{ClientSettings, Providers, UserMemoryClient};

/// Longest accepted user id.
pub const MAX_USER_ID_LEN: usize = 128;

/// Check that `user_id` is usable as a directory name under the data root.
///
/// Allowed: ASCII letters, digits, `_`, `-` and `.`, at most
/// [`MAX_USER_ID_LEN`] characters, and not `.` or `..`.
pub fn validate_user_id(user_id: &str) -> Result<(), Error> {
    if user_id.is_empty() {
        return Err(Error::InvalidUserId("user id cannot be empty".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(Error::InvalidUserId(format!(
            "user id exceeds {} characters",
            MAX_USER_ID_LEN
        )));
    }
    if user_id == "." || user_id == ".." {
        return Err(Error::InvalidUserId(format!("'{}' is reserved", user_id)));
    }
    if let Some(c) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(Error::InvalidUserId(format!(
            "'{}' contains disallowed character {:?}",
            user_id, c
        )));
    }
    Ok(())
}

/// Hands out one [`UserMemoryClient`] per active user.
///
/// Providers are injected once and shared by every client. Clients live under
/// `<data_dir>/<user_id>/`.
///
/// Store setup runs under `opening`, not the map lock, so lookups of
/// already-open users never wait on disk I/O. Opens are serialized.
pub struct MemoryRegistry {
    data_dir: PathBuf,
    settings: ClientSettings,
    providers: Providers,
    clients: RwLock<HashMap<String, Arc<UserMemoryClient>>>,
    opening: Mutex<()>,
}

impl MemoryRegistry {
    pub fn new(data_dir: impl Into<PathBuf>, settings: ClientSettings, providers: Providers) -> Self {
        Self {
            data_dir: data_dir.into(),
            settings,
            providers,
            clients: RwLock::new(HashMap::new()),
            opening: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding `user_id`'s stores.
    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf, Error> {
        validate_user_id(user_id)?;
        Ok(self.data_dir.join(user_id))
    }

    /// The client for `user_id`, opening its stores on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the id is invalid or the stores cannot be opened.
    pub fn open(&self, user_id: &str) -> Result<Arc<UserMemoryClient>, Error> {
        if let Some(client) = self.get(user_id) {
            return Ok(client);
        }

        let user_dir = self.user_dir(user_id)?;
        let _opening = self.opening.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished opening it while we waited.
        if let Some(client) = self.get(user_id) {
            return Ok(client);
        }

        let client = Arc::new(UserMemoryClient::open(
            user_id,
            &user_dir,
            self.providers.clone(),
            self.settings,
        )?);
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(user_id.to_string(), Arc::clone(&client));
        info!(user_id, active = clients.len(), "user registered");
        Ok(client)
    }

    /// The client for `user_id` if it is currently open.
    pub fn get(&self, user_id: &str) -> Option<Arc<UserMemoryClient>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// Close and forget `user_id`'s client.
    ///
    /// Returns `false` when no client was open; closing an unknown user is
    /// not an error.
    pub fn close(&self, user_id: &str) -> Result<bool, Error> {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        match removed {
            Some(client) => {
                client.close()?;
                info!(user_id, "user released");
                Ok(true)
            }
            None => {
                debug!(user_id, "close requested for inactive user");
                Ok(false)
            }
        }
    }

    /// Ids of every open client, sorted.
    pub fn active_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        users.sort();
        users
    }

    /// Close every open client. Failures are logged; the first is returned
    /// after all clients have been released.
    pub fn shutdown(&self) -> Result<(), Error> {
        let drained: Vec<(String, Arc<UserMemoryClient>)> = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        let count = drained.len();
        let mut first_error = None;
        for (user_id, client) in drained {
            if let Err(e) = client.close() {
                warn!(user_id = %user_id, error = %e, "failed to close memory client");
                first_error.get_or_insert(e);
            }
        }
        info!(closed = count, "memory registry shut down");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for MemoryRegistry {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "memory registry shutdown on drop failed");
        }
    }
}
