//! Token payload.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Full access, including destructive product operations and sales.
pub const ROLE_ADMIN: &str = "ADMIN";

/// Regular authenticated access.
pub const ROLE_USER: &str = "USER";

/// The payload of a token: who the caller is, what they may do, and for how long.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub roles: BTreeSet<String>,
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Claims for `subject`, valid from `now` for `ttl`.
    ///
    /// Timestamps are truncated to whole seconds, the precision tokens carry.
    pub fn new<I, S>(subject: impl Into<String>, roles: I, now: DateTime<Utc>, ttl: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = now.trunc_subsecs(0);
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    /// True when the caller holds at least one of `required`.
    pub fn has_role<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        required.into_iter().any(|role| self.roles.contains(role.as_ref()))
    }
}
