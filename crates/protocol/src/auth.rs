//! Password lookup for signed and encrypted packets
//!
//! The receiving side needs the password of the user named in a security
//! envelope. `AuthFile` reads collectd's auth file format:
//!
//! ```text
//! # comment
//! alice: secret
//! bob:   hunter2
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

/// Resolves a username to its password
pub trait PasswordLookup: Send + Sync {
    /// Password for `username`, or `None` if the user is unknown
    fn password(&self, username: &str) -> Option<String>;
}

/// Fixed in-memory credentials
#[derive(Debug, Clone, Default)]
pub struct StaticPasswords {
    users: HashMap<String, String>,
}

impl StaticPasswords {
    /// Create an empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.insert(username, password);
        self
    }

    /// Add or replace a user
    pub fn insert(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }

    /// Number of known users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if no users are configured
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl PasswordLookup for StaticPasswords {
    fn password(&self, username: &str) -> Option<String> {
        self.users.get(username).cloned()
    }
}

/// collectd auth file, re-read whenever its modification time changes
#[derive(Debug)]
pub struct AuthFile {
    path: PathBuf,
    cache: Mutex<AuthCache>,
}

#[derive(Debug, Default)]
struct AuthCache {
    modified: Option<SystemTime>,
    users: HashMap<String, String>,
}

impl AuthFile {
    /// Create a lookup backed by `path`
    ///
    /// The file is read lazily on the first lookup.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: Mutex::new(AuthCache::default()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, cache: &mut AuthCache) {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot stat auth file");
                return;
            }
        };

        if cache.modified == Some(modified) {
            return;
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                cache.users = parse_auth_file(&contents);
                cache.modified = Some(modified);
                tracing::debug!(
                    path = %self.path.display(),
                    users = cache.users.len(),
                    "auth file loaded"
                );
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read auth file");
            }
        }
    }
}

impl PasswordLookup for AuthFile {
    fn password(&self, username: &str) -> Option<String> {
        let mut cache = self.cache.lock();
        self.refresh(&mut cache);
        cache.users.get(username).cloned()
    }
}

/// Parse `user: password` lines, skipping blanks, comments and junk
fn parse_auth_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(user, password)| (user.trim().to_string(), password.trim().to_string()))
        .filter(|(user, _)| !user.is_empty())
        .collect()
}
