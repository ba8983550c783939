mod common;

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use garagesale::api::{self, Api};
use garagesale::auth::{ROLE_ADMIN, ROLE_USER};
use garagesale::middleware::Registry;
use garagesale::store::{SEED_PASSWORD, Store};
use garagesale::{Router, auth::Authenticator};
use http::{Method, StatusCode};
use serde_json::json;

use common::*;

const COMICS: &str = "a2b0639f-2cc6-44b8-b97b-15d69dbb511e";
const ADMIN_ID: &str = "5cf37266-3473-4006-984f-9325122678b7";
const USER_ID: &str = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f";

struct App {
    router: Router,
    auth: Arc<Authenticator>,
    registry: Arc<Registry>,
}

impl App {
    async fn new() -> Self {
        let auth = Arc::new(authenticator());
        let registry = Arc::new(Registry::new());
        let api = Api {
            store: Arc::new(Store::seeded().await.unwrap()),
            authenticator: Arc::clone(&auth),
            token_ttl: chrono::Duration::hours(1),
        };
        Self { router: api::routes(api, Arc::clone(&registry)), auth, registry }
    }

    fn admin(&self) -> String {
        bearer(&self.auth, ADMIN_ID, &[ROLE_ADMIN, ROLE_USER])
    }

    fn user(&self) -> String {
        bearer(&self.auth, USER_ID, &[ROLE_USER])
    }

    async fn call(&self, method: Method, path: &str, token: Option<&str>, body: &str) -> garagesale::Response {
        send(&self.router, request(method, path, token, body)).await
    }
}

fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

#[tokio::test]
async fn health() {
    let app = App::new().await;
    let res = app.call(Method::GET, "/v1/health", None, "").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json(&res), json!({ "status": "ok" }));
}

#[tokio::test]
async fn login_then_use_the_token() {
    let app = App::new().await;

    let res = app
        .call(Method::GET, "/v1/users/token", Some(&basic("user@example.com", SEED_PASSWORD)), "")
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let token = json(&res)["token"].as_str().unwrap().to_owned();

    let claims = app.auth.parse_claims(&token).unwrap();
    assert_eq!(claims.subject, USER_ID);

    let res = app.call(Method::GET, "/v1/products", Some(&format!("Bearer {token}")), "").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json(&res).as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn login_failures_are_401() {
    let app = App::new().await;

    let res = app
        .call(Method::GET, "/v1/users/token", Some(&basic("user@example.com", "wrong")), "")
        .await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(&res), json!({ "error": "authentication failed" }));

    let res = app.call(Method::GET, "/v1/users/token", None, "").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn products_require_a_token() {
    let app = App::new().await;
    let res = app.call(Method::GET, "/v1/products", None, "").await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_product_fails_validation() {
    let app = App::new().await;
    let res = app.call(Method::POST, "/v1/products", Some(&app.user()), "{}").await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    let body = json(&res);
    assert_eq!(body["error"], "field validation error");
    let fields = body["fields"].as_array().unwrap();
    assert!(!fields.is_empty());
    assert!(fields.iter().any(|f| f["field"] == "name"));
}

#[tokio::test]
async fn create_retrieve_update_by_creator() {
    let app = App::new().await;
    let user = app.user();

    let res = app
        .call(Method::POST, "/v1/products", Some(&user), r#"{"name":"Lamp","cost":20,"quantity":4}"#)
        .await;
    assert_eq!(res.status_code(), StatusCode::CREATED);
    let created = json(&res);
    assert_eq!(created["user_id"], USER_ID);
    let path = format!("/v1/products/{}", created["id"].as_str().unwrap());

    let res = app.call(Method::PUT, &path, Some(&user), r#"{"cost":25}"#).await;
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert!(res.body().is_empty());

    let res = app.call(Method::GET, &path, Some(&user), "").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let product = json(&res);
    assert_eq!((product["name"].clone(), product["cost"].clone()), (json!("Lamp"), json!(25)));
}

#[tokio::test]
async fn only_admin_or_creator_updates() {
    let app = App::new().await;
    let path = format!("/v1/products/{COMICS}");

    let res = app.call(Method::PUT, &path, Some(&app.user()), r#"{"name":"Mine now"}"#).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = app.call(Method::PUT, &path, Some(&app.admin()), r#"{"name":"Graphic Novels"}"#).await;
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn user_token_on_admin_route_is_403_and_200_on_user_route() {
    let app = App::new().await;
    let user = app.user();
    let path = format!("/v1/products/{COMICS}");

    let res = app.call(Method::DELETE, &path, Some(&user), "").await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);

    let res = app.call(Method::GET, &path, Some(&user), "").await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json(&res)["name"], "Comic Books");
}

#[tokio::test]
async fn admin_records_sales_and_deletes() {
    let app = App::new().await;
    let admin = app.admin();
    let sales = format!("/v1/products/{COMICS}/sales");

    let res = app.call(Method::POST, &sales, Some(&admin), r#"{"quantity":1,"paid":50}"#).await;
    assert_eq!(res.status_code(), StatusCode::CREATED);

    let res = app.call(Method::GET, &sales, Some(&app.user()), "").await;
    assert_eq!(json(&res).as_array().unwrap().len(), 3);

    let product = format!("/v1/products/{COMICS}");
    let res = app.call(Method::GET, &product, Some(&admin), "").await;
    assert_eq!((json(&res)["sold"].clone(), json(&res)["revenue"].clone()), (json!(8), json!(400)));

    let res = app.call(Method::DELETE, &product, Some(&admin), "").await;
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    let res = app.call(Method::GET, &product, Some(&admin), "").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(json(&res), json!({ "error": "product not found" }));
}

#[tokio::test]
async fn oversized_sale_is_rejected() {
    let app = App::new().await;
    let sales = format!("/v1/products/{COMICS}/sales");
    let body = format!(r#"{{"quantity":1,"paid":{}}}"#, i64::MAX);

    let res = app.call(Method::POST, &sales, Some(&app.admin()), &body).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert!(json(&res)["fields"].as_array().unwrap().iter().any(|f| f["field"] == "paid"));
}

#[tokio::test]
async fn malformed_ids_and_unknown_routes() {
    let app = App::new().await;
    let user = app.user();

    let res = app.call(Method::GET, "/v1/products/42", Some(&user), "").await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(json(&res), json!({ "error": "invalid ID" }));

    let res = app.call(Method::GET, "/v1/nothing", None, "").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let res = app.call(Method::PATCH, "/v1/products", None, "").await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn metrics_are_published_on_the_debug_routes() {
    let app = App::new().await;
    app.call(Method::GET, "/v1/health", None, "").await;
    app.call(Method::GET, "/v1/products", None, "").await;

    let debug = api::debug_routes(Arc::clone(&app.registry));
    let res = send(&debug, request(Method::GET, "/debug/vars", None, "")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let vars = json(&res);
    assert_eq!(vars["requests"], 2);
    assert_eq!(vars["errors"], 1);
}
