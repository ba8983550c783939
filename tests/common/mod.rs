#![allow(dead_code)]

use std::net::SocketAddr;

use bytes::Bytes;
use chrono::{Duration, Utc};
use garagesale::auth::{self, Authenticator, Claims, KeySet};
use garagesale::{Response, Router};
use jsonwebtoken::Algorithm;

pub const PRIVATE: &[u8] = include_bytes!("../fixtures/private.pem");
pub const PUBLIC: &[u8] = include_bytes!("../fixtures/public.pem");
pub const ROTATED_PRIVATE: &[u8] = include_bytes!("../fixtures/rotated.pem");
pub const ROTATED_PUBLIC: &[u8] = include_bytes!("../fixtures/rotated.pub.pem");

pub const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// RS256 authenticator signing with the fixture key under [`KID`].
pub fn authenticator() -> Authenticator {
    authenticator_with(PRIVATE, KID, KeySet::single(KID, public_key(PUBLIC)))
}

pub fn authenticator_with(private: &[u8], kid: &str, keys: KeySet) -> Authenticator {
    let signing = auth::encoding_key(Algorithm::RS256, private).unwrap();
    Authenticator::new(signing, kid, "RS256", keys).unwrap()
}

pub fn public_key(pem: &[u8]) -> jsonwebtoken::DecodingKey {
    auth::decoding_key(Algorithm::RS256, pem).unwrap()
}

pub fn claims(subject: &str, roles: &[&str]) -> Claims {
    Claims::new(subject, roles.iter().copied(), Utc::now(), Duration::hours(1))
}

/// `Bearer …` header value for a fresh token.
pub fn bearer(auth: &Authenticator, subject: &str, roles: &[&str]) -> String {
    format!("Bearer {}", auth.generate_token(&claims(subject, roles)).unwrap())
}

pub fn remote() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 7], 51234))
}

pub fn request(method: http::Method, path: &str, authorization: Option<&str>, body: &str) -> http::Request<Bytes> {
    let mut builder = http::Request::builder().method(method).uri(path);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Bytes::from(body.to_owned())).unwrap()
}

pub async fn send(router: &Router, req: http::Request<Bytes>) -> Response {
    router.dispatch(req, remote()).await.unwrap()
}

pub fn json(res: &Response) -> serde_json::Value {
    serde_json::from_slice(res.body()).unwrap()
}
