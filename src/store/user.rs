//! User accounts and password authentication.

use std::collections::{BTreeSet, HashMap};

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreError;
use crate::auth::Claims;

/// A user of the system. The password hash never leaves the store.
#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    #[serde(skip)]
    password_hash: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub roles: BTreeSet<String>,
    pub password: String,
}

impl NewUser {
    pub fn new<I, S>(name: impl Into<String>, email: impl Into<String>, roles: I, password: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            email: email.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            password: password.into(),
        }
    }
}

/// Accounts indexed by email.
#[derive(Default)]
pub struct Users {
    by_email: RwLock<HashMap<String, User>>,
}

impl Users {
    pub async fn create(&self, new: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        self.insert_with_id(Uuid::new_v4(), new, now).await
    }

    pub(crate) async fn insert_with_id(&self, id: Uuid, new: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let password_hash = hash_password(new.password).await?;

        let mut users = self.by_email.write().await;
        if users.contains_key(&new.email) {
            return Err(StoreError::DuplicateEmail(new.email));
        }

        let user = User {
            id,
            name: new.name,
            email: new.email,
            roles: new.roles,
            password_hash,
            date_created: now,
            date_updated: now,
        };
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    /// Checks `password` for `email` and returns the claims to issue a token
    /// for. Unknown emails and wrong passwords fail the same way.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Claims, StoreError> {
        let user = self
            .by_email
            .read()
            .await
            .get(email)
            .cloned()
            .ok_or(StoreError::AuthenticationFailure)?;

        if !verify_password(password.to_owned(), user.password_hash.clone()).await? {
            return Err(StoreError::AuthenticationFailure);
        }
        Ok(Claims::new(user.id.to_string(), user.roles, now, ttl))
    }

    pub(crate) async fn ping(&self) {
        drop(self.by_email.read().await);
    }
}

// Argon2 is CPU-bound; both run on the blocking pool.

async fn hash_password(password: String) -> Result<String, StoreError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| StoreError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| StoreError::Hash(e.to_string()))?
}

async fn verify_password(password: String, hash: String) -> Result<bool, StoreError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|e| StoreError::Hash(e.to_string()))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await
    .map_err(|e| StoreError::Hash(e.to_string()))?
}
