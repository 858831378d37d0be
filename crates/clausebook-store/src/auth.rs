//! Signed-in identity and a local email/password identity provider.
//!
//! [`AuthHandle`] is the shared "who is signed in" cell every store checks
//! before serving a call. [`LocalIdentityProvider`] manages accounts and
//! drives the handle on sign-up, sign-in, and sign-out.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::StoreError;

const PBKDF2_ITERATIONS: u32 = 100_000;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;
const MIN_PASSWORD_LEN: usize = 6;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Shared sign-in state with change notifications.
#[derive(Clone)]
pub struct AuthHandle {
    tx: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthHandle {
    /// A handle with nobody signed in.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// A handle already signed in as `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        let handle = Self::new();
        handle.set(Some(identity));
        handle
    }

    pub fn set(&self, identity: Option<Identity>) {
        self.tx.send_replace(identity);
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    /// The signed-in identity, or [`StoreError::Unauthenticated`].
    pub fn require(&self) -> Result<Identity, StoreError> {
        self.current().ok_or(StoreError::Unauthenticated)
    }

    /// Stream of auth state changes. The current value is visible immediately.
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account already exists for {0}")]
    AccountExists(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("random number generator failure")]
    Rng,

    #[error("account file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("account file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    salt: String,
    hash: String,
}

/// Email/password accounts, optionally persisted to a JSON file.
pub struct LocalIdentityProvider {
    auth: AuthHandle,
    accounts: Mutex<HashMap<String, Account>>,
    path: Option<PathBuf>,
    rng: SystemRandom,
}

impl LocalIdentityProvider {
    /// Provider with no persistence.
    pub fn in_memory(auth: AuthHandle) -> Self {
        Self {
            auth,
            accounts: Mutex::new(HashMap::new()),
            path: None,
            rng: SystemRandom::new(),
        }
    }

    /// Provider backed by an account file, created on first sign-up.
    pub fn open(auth: AuthHandle, path: &Path) -> Result<Self, AuthError> {
        let accounts = if path.exists() {
            let list: Vec<Account> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            list.into_iter().map(|a| (a.email.clone(), a)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            auth,
            accounts: Mutex::new(accounts),
            path: Some(path.to_path_buf()),
            rng: SystemRandom::new(),
        })
    }

    pub fn auth(&self) -> &AuthHandle {
        &self.auth
    }

    pub fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut salt = [0u8; 16];
        self.rng.fill(&mut salt).map_err(|_| AuthError::Rng)?;
        let mut uid = [0u8; 14];
        self.rng.fill(&mut uid).map_err(|_| AuthError::Rng)?;

        let account = Account {
            uid: to_hex(&uid),
            email: email.clone(),
            salt: to_hex(&salt),
            hash: to_hex(&derive(&salt, password)),
        };

        {
            let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            if accounts.contains_key(&email) {
                return Err(AuthError::AccountExists(email));
            }
            accounts.insert(email.clone(), account.clone());
            self.persist(&accounts)?;
        }

        info!(email = %email, "account created");
        let identity = Identity {
            uid: account.uid,
            email,
        };
        self.auth.set(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let account = {
            let accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            accounts
                .get(&email)
                .cloned()
                .ok_or(AuthError::InvalidCredentials)?
        };
        let salt = from_hex(&account.salt).ok_or(AuthError::InvalidCredentials)?;
        let expected = from_hex(&account.hash).ok_or(AuthError::InvalidCredentials)?;
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations(),
            &salt,
            password.as_bytes(),
            &expected,
        )
        .map_err(|_| AuthError::InvalidCredentials)?;

        let identity = Identity {
            uid: account.uid,
            email,
        };
        self.auth.set(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_out(&self) {
        self.auth.set(None);
    }

    fn persist(&self, accounts: &HashMap<String, Account>) -> Result<(), AuthError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut list: Vec<&Account> = accounts.values().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        std::fs::write(path, serde_json::to_string_pretty(&list)?)?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

fn derive(salt: &[u8], password: &str) -> [u8; CREDENTIAL_LEN] {
    let mut out = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations(),
        salt,
        password.as_bytes(),
        &mut out,
    );
    out
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_fails_when_signed_out() {
        let auth = AuthHandle::new();
        assert!(matches!(auth.require(), Err(StoreError::Unauthenticated)));
    }

    #[test]
    fn sign_up_then_sign_in() {
        let provider = LocalIdentityProvider::in_memory(AuthHandle::new());
        let created = provider.sign_up("Admin@Example.com", "hunter22").unwrap();
        assert_eq!(created.email, "admin@example.com");
        assert_eq!(provider.auth().current(), Some(created.clone()));

        provider.sign_out();
        assert!(provider.auth().current().is_none());

        let again = provider.sign_in("admin@example.com", "hunter22").unwrap();
        assert_eq!(again.uid, created.uid);
    }

    #[test]
    fn wrong_password_rejected() {
        let provider = LocalIdentityProvider::in_memory(AuthHandle::new());
        provider.sign_up("a@example.com", "correct-horse").unwrap();
        provider.sign_out();
        assert!(matches!(
            provider.sign_in("a@example.com", "battery-staple"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(provider.auth().current().is_none());
    }

    #[test]
    fn duplicate_and_weak_sign_ups_rejected() {
        let provider = LocalIdentityProvider::in_memory(AuthHandle::new());
        provider.sign_up("a@example.com", "secret1").unwrap();
        assert!(matches!(
            provider.sign_up("A@example.com", "secret2"),
            Err(AuthError::AccountExists(_))
        ));
        assert!(matches!(
            provider.sign_up("b@example.com", "123"),
            Err(AuthError::WeakPassword)
        ));
        assert!(matches!(
            provider.sign_up("not-an-email", "secret1"),
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[test]
    fn accounts_persist_across_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("accounts.json");

        let provider = LocalIdentityProvider::open(AuthHandle::new(), &path).unwrap();
        let created = provider.sign_up("a@example.com", "secret1").unwrap();
        drop(provider);

        let provider = LocalIdentityProvider::open(AuthHandle::new(), &path).unwrap();
        let again = provider.sign_in("a@example.com", "secret1").unwrap();
        assert_eq!(again.uid, created.uid);
    }

    #[tokio::test]
    async fn watch_sees_changes() {
        let auth = AuthHandle::new();
        let mut rx = auth.watch();
        auth.set(Some(Identity {
            uid: "u1".into(),
            email: "a@example.com".into(),
        }));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|i| i.uid.as_str()), Some("u1"));
    }

    #[test]
    fn hex_round_trip() {
        let bytes = [0u8, 1, 127, 255];
        assert_eq!(from_hex(&to_hex(&bytes)).unwrap(), bytes);
        assert!(from_hex("abc").is_none());
    }
}
