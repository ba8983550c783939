//! Token issuing and verification.
//!
//! An [`Authenticator`] signs [`Claims`] with one active key and verifies
//! tokens against whatever key their `kid` header names. During a key
//! rotation the [`KeyLookup`] answers for both the old and the new key id, so
//! tokens issued before the switch keep working until they expire.
//!
//! Verification trusts exactly one algorithm, the one the authenticator was
//! built with. The `alg` a token declares in its header is compared against it
//! and never used to pick a verification method, which closes the
//! algorithm-confusion hole (e.g. an HS256 token "signed" with an RSA public
//! key).

mod claims;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};

pub use claims::{Claims, ROLE_ADMIN, ROLE_USER};

use crate::request::Request;

/// Errors raised while building an [`Authenticator`] or handling tokens.
///
/// [`Authenticator::parse_claims`] only ever returns
/// [`AuthError::InvalidToken`]; the specific reason is logged, not returned.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("active key id cannot be blank")]
    BlankKeyId,

    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("signing key cannot be used with {algorithm:?}: {source}")]
    UnusableSigningKey {
        algorithm: Algorithm,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("parsing key: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),

    #[error("unrecognized key id {0:?}")]
    UnknownKeyId(String),

    #[error("signing token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("authentication failed")]
    InvalidToken,
}

// ── KeyLookup ─────────────────────────────────────────────────────────────────

/// Maps a key id (`kid`) to the key that verifies tokens signed under it.
///
/// Usually backed by a JWKS document or a local key set. Any
/// `Fn(&str) -> Result<DecodingKey, AuthError>` works too.
pub trait KeyLookup: Send + Sync + 'static {
    fn lookup(&self, kid: &str) -> Result<DecodingKey, AuthError>;
}

impl<F> KeyLookup for F
where
    F: Fn(&str) -> Result<DecodingKey, AuthError> + Send + Sync + 'static,
{
    fn lookup(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        self(kid)
    }
}

/// A fixed set of verification keys indexed by key id.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, DecodingKey>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only the active key.
    pub fn single(kid: impl Into<String>, key: DecodingKey) -> Self {
        Self::new().with(kid, key)
    }

    pub fn with(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyLookup for KeySet {
    fn lookup(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        self.keys.get(kid).cloned().ok_or_else(|| AuthError::UnknownKeyId(kid.to_owned()))
    }
}

// ── Key loading ───────────────────────────────────────────────────────────────

/// Parses a signing key for `algorithm` (a PEM document, or the raw secret
/// for the HMAC family).
pub fn encoding_key(algorithm: Algorithm, pem: &[u8]) -> Result<EncodingKey, AuthError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(EncodingKey::from_secret(pem)),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem).map_err(AuthError::Key),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem).map_err(AuthError::Key),
        _ => EncodingKey::from_rsa_pem(pem).map_err(AuthError::Key),
    }
}

/// Parses a verification key for `algorithm`. See [`encoding_key`].
pub fn decoding_key(algorithm: Algorithm, pem: &[u8]) -> Result<DecodingKey, AuthError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(pem)),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem).map_err(AuthError::Key),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem).map_err(AuthError::Key),
        _ => DecodingKey::from_rsa_pem(pem).map_err(AuthError::Key),
    }
}

/// Parses an algorithm name such as `RS256`.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, AuthError> {
    Algorithm::from_str(name).map_err(|_| AuthError::UnknownAlgorithm(name.to_owned()))
}

// ── Authenticator ─────────────────────────────────────────────────────────────

/// Issues and verifies tokens. Immutable once built; share it behind an `Arc`.
pub struct Authenticator {
    signing_key: EncodingKey,
    active_kid: String,
    algorithm: Algorithm,
    lookup: Arc<dyn KeyLookup>,
    validation: Validation,
}

impl Authenticator {
    /// Builds an authenticator, checking every input up front.
    ///
    /// Fails when `active_kid` is blank, `algorithm` is not a known JWS
    /// algorithm, or `signing_key` cannot produce signatures for it.
    pub fn new(
        signing_key: EncodingKey,
        active_kid: impl Into<String>,
        algorithm: &str,
        lookup: impl KeyLookup,
    ) -> Result<Self, AuthError> {
        let active_kid = active_kid.into();
        if active_kid.trim().is_empty() {
            return Err(AuthError::BlankKeyId);
        }
        let algorithm = parse_algorithm(algorithm)?;

        // Sign a throwaway payload so a key of the wrong family or a broken
        // key fails here instead of on the first login.
        encode(&Header::new(algorithm), &serde_json::json!({}), &signing_key)
            .map_err(|source| AuthError::UnusableSigningKey { algorithm, source })?;

        let mut validation = Validation::new(algorithm);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self { signing_key, active_kid, algorithm, lookup: Arc::new(lookup), validation })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    /// Signs `claims` with the active key and returns the compact token.
    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.active_kid.clone());
        encode(&header, claims, &self.signing_key).map_err(AuthError::Sign)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Every failure comes back as [`AuthError::InvalidToken`].
    pub fn parse_claims(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify(token).map_err(|reason| {
            tracing::debug!(%reason, "token rejected");
            AuthError::InvalidToken
        })
    }

    fn verify(&self, token: &str) -> Result<Claims, Rejection> {
        let header = decode_header(token).map_err(Rejection::Malformed)?;
        if header.alg != self.algorithm {
            return Err(Rejection::Algorithm(header.alg));
        }
        let kid = header.kid.ok_or(Rejection::MissingKeyId)?;
        let key = self.lookup.lookup(&kid).map_err(Rejection::Lookup)?;
        let data = decode::<Claims>(token, &key, &self.validation).map_err(Rejection::Invalid)?;
        Ok(data.claims)
    }
}

/// Why a token was turned away. Logged, never sent to clients.
#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("malformed header: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("token declares algorithm {0:?}")]
    Algorithm(Algorithm),
    #[error("token header has no kid")]
    MissingKeyId,
    #[error("{0}")]
    Lookup(AuthError),
    #[error("{0}")]
    Invalid(jsonwebtoken::errors::Error),
}

// ── Request-scoped claims ─────────────────────────────────────────────────────

/// Private extension key: nothing outside this module can read or overwrite it.
#[derive(Clone)]
struct VerifiedClaims(Claims);

impl Request {
    /// The claims stored by the [`Authenticate`](crate::middleware::Authenticate)
    /// middleware, if it ran.
    pub fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<VerifiedClaims>().map(|c| &c.0)
    }

    pub(crate) fn set_claims(&mut self, claims: Claims) {
        self.extensions_mut().insert(VerifiedClaims(claims));
    }
}
