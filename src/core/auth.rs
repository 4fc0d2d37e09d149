//! Username/password authentication backed by a JSON user file.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 digests with a per-user random
//! salt. The iteration count is stored with each user so raising the default
//! later does not invalidate existing accounts. Usernames compare
//! case-insensitively. The first account ever registered becomes an admin;
//! that decision looks only at this user file, never at the schedule data.

use crate::errors::{Error, Result};
use crate::storage::{JsonStore, LoadOutcome};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::path::PathBuf;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

pub const DEFAULT_ITERATIONS: u32 = 200_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("admin"),
            Self::Staff => f.write_str("staff"),
        }
    }
}

/// A user that registered or authenticated successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PasswordHash {
    salt: String,
    hash: String,
    iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    role: Role,
    password: PasswordHash,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserDb {
    users: Vec<UserRecord>,
}

impl UserDb {
    fn find(&self, username: &str) -> Option<&UserRecord> {
        let wanted = username.trim().to_lowercase();
        self.users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn hash_password(password: &str, iterations: u32) -> PasswordHash {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let digest = derive(password, &salt, iterations);
    PasswordHash {
        salt: STANDARD.encode(salt),
        hash: STANDARD.encode(digest),
        iterations,
    }
}

fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    if stored.iterations == 0 {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(&stored.salt), STANDARD.decode(&stored.hash))
    else {
        return false;
    };
    let digest = derive(password, &salt, stored.iterations);
    digest.as_slice().ct_eq(expected.as_slice()).into()
}

pub struct UserAuth {
    userdb_path: PathBuf,
    store: Box<dyn JsonStore>,
    iterations: u32,
}

impl fmt::Debug for UserAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAuth")
            .field("userdb_path", &self.userdb_path)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl UserAuth {
    pub fn new(userdb_path: impl Into<PathBuf>, store: Box<dyn JsonStore>) -> Self {
        Self {
            userdb_path: userdb_path.into(),
            store,
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Overrides the iteration count used for newly registered passwords.
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    fn load_db(&self) -> UserDb {
        match self.store.read(&self.userdb_path) {
            LoadOutcome::Loaded(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("User database {:?} is malformed ({}); treating as empty", self.userdb_path, e);
                UserDb::default()
            }),
            LoadOutcome::Absent => UserDb::default(),
            LoadOutcome::Corrupt(reason) => {
                warn!("User database {:?} unreadable ({}); treating as empty", self.userdb_path, reason);
                UserDb::default()
            }
        }
    }

    fn save_db(&self, db: &UserDb) -> Result<()> {
        self.store.write(&self.userdb_path, &serde_json::to_value(db)?)
    }

    #[must_use]
    pub fn has_any_user(&self) -> bool {
        !self.load_db().users.is_empty()
    }

    /// Registers a new user.
    ///
    /// Without an explicit `role` the first user becomes [`Role::Admin`] and
    /// later ones [`Role::Staff`].
    ///
    /// # Errors
    /// [`Error::Validation`] for an empty username or password or a username
    /// that already exists (case-insensitive); storage errors if the user file
    /// cannot be written.
    #[instrument(skip(self, password))]
    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<AuthenticatedUser> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::validation("Username and password are required."));
        }
        let mut db = self.load_db();
        if db.find(username).is_some() {
            return Err(Error::validation("Username already exists."));
        }

        let role = role.unwrap_or(if db.users.is_empty() {
            Role::Admin
        } else {
            Role::Staff
        });
        db.users.push(UserRecord {
            username: username.to_string(),
            role,
            password: hash_password(password, self.iterations),
            created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        self.save_db(&db)?;
        info!("User registered: username={}, role={}", username, role);

        Ok(AuthenticatedUser {
            username: username.to_string(),
            role,
        })
    }

    /// Checks a username/password pair. Unknown users and wrong passwords are
    /// indistinguishable to the caller: both return `None`.
    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser> {
        let db = self.load_db();
        let user = db.find(username)?;
        if !verify_password(password, &user.password) {
            return None;
        }
        Some(AuthenticatedUser {
            username: user.username.clone(),
            role: user.role,
        })
    }
}
