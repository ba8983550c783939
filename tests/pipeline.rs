mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use garagesale::auth::{ROLE_ADMIN, ROLE_USER};
use garagesale::middleware::{Authenticate, Errors, HasRole, Logger, Metrics, Middleware, Next, Panics, Registry, Stack};
use garagesale::{Error, Request, Response, RequestError, Router};
use http::{Method, StatusCode};

use common::*;

type Trace = Arc<Mutex<Vec<String>>>;

fn tracer(trace: &Trace, name: &'static str) -> impl Middleware {
    let trace = Arc::clone(trace);
    move |req: Request, next: Next| {
        let trace = Arc::clone(&trace);
        async move {
            trace.lock().unwrap().push(format!("enter {name}"));
            let outcome = next.run(req).await;
            trace.lock().unwrap().push(format!("exit {name}"));
            outcome
        }
    }
}

fn standard(registry: &Arc<Registry>) -> Stack {
    Stack::new()
        .with(Logger::new())
        .with(Errors::new())
        .with(Metrics::new(Arc::clone(registry)))
        .with(Panics::new())
}

/// A handler that counts its invocations.
fn counted(hits: &Arc<AtomicUsize>) -> impl garagesale::Handler {
    let hits = Arc::clone(hits);
    move |_req: Request| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(StatusCode::OK)
        }
    }
}

#[tokio::test]
async fn global_middleware_wraps_route_middleware() {
    let trace: Trace = Arc::default();
    let inner = Arc::clone(&trace);

    let router = Router::with_middleware(Stack::new().with(tracer(&trace, "A")).with(tracer(&trace, "B")))
        .on_with(
            Method::GET,
            "/",
            move |_req: Request| {
                let inner = Arc::clone(&inner);
                async move {
                    inner.lock().unwrap().push("handler".to_owned());
                    Ok::<_, Error>(StatusCode::OK)
                }
            },
            Stack::new().with(tracer(&trace, "C")),
        );

    send(&router, request(Method::GET, "/", None, "")).await;

    assert_eq!(
        *trace.lock().unwrap(),
        ["enter A", "enter B", "enter C", "handler", "exit C", "exit B", "exit A"]
    );
}

#[tokio::test]
async fn panics_are_contained_to_their_request() {
    let registry = Arc::new(Registry::new());
    let router = Router::with_middleware(standard(&registry))
        .on(Method::GET, "/boom", |req: Request| async move {
            if req.path() == "/boom" {
                panic!("handler exploded");
            }
            Ok::<_, Error>(StatusCode::OK)
        })
        .on(Method::GET, "/fine", |_req: Request| async { Ok::<_, Error>("fine") });

    let res = send(&router, request(Method::GET, "/boom", None, "")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&res), serde_json::json!({ "error": "Internal Server Error" }));

    for _ in 0..3 {
        let res = send(&router, request(Method::GET, "/fine", None, "")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"fine");
    }
    assert_eq!(registry.errors(), 1);
}

#[tokio::test]
async fn panic_outside_the_handler_future_is_answered_500() {
    let registry = Arc::new(Registry::new());
    let router = Router::with_middleware(standard(&registry)).on(Method::GET, "/items", |req: Request| {
        let id = req.param("id").unwrap().to_owned();
        async move { Ok::<_, Error>(id) }
    });

    let res = tokio::spawn(async move { send(&router, request(Method::GET, "/items", None, "")).await })
        .await
        .expect("dispatch task must not panic");
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!((registry.requests(), registry.errors()), (1, 1));
}

#[tokio::test]
async fn error_counter_moves_only_on_failures() {
    let registry = Arc::new(Registry::new());
    let router = Router::with_middleware(standard(&registry))
        .on(Method::GET, "/ok", |_req: Request| async { Ok::<_, Error>(StatusCode::OK) })
        .on(Method::GET, "/bad", |_req: Request| async {
            Err::<Response, _>(RequestError::bad_request("nope").into())
        });

    for _ in 0..4 {
        send(&router, request(Method::GET, "/ok", None, "")).await;
    }
    assert_eq!((registry.requests(), registry.errors()), (4, 0));

    let res = send(&router, request(Method::GET, "/bad", None, "")).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!((registry.requests(), registry.errors()), (5, 1));
}

#[tokio::test]
async fn missing_or_malformed_authorization_never_reaches_the_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(Registry::new());
    let auth = Arc::new(authenticator());
    let router = Router::with_middleware(standard(&registry)).on_with(
        Method::GET,
        "/secret",
        counted(&hits),
        Stack::new().with(Authenticate::new(Arc::clone(&auth))),
    );

    let token = bearer(&auth, "u", &[ROLE_USER]);
    let raw = token.trim_start_matches("Bearer ").to_owned();
    for header in [
        None,
        Some(raw.clone()),
        Some(format!("Basic {raw}")),
        Some(format!("Bearer {raw} extra")),
        Some("Bearer".to_owned()),
        Some("Bearer not.a.token".to_owned()),
    ] {
        let res = send(&router, request(Method::GET, "/secret", header.as_deref(), "")).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED, "{header:?}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let res = send(&router, request(Method::GET, "/secret", Some(&token), "")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unauthorized_body_carries_no_crypto_detail() {
    let registry = Arc::new(Registry::new());
    let auth = Arc::new(authenticator());
    let router = Router::with_middleware(standard(&registry)).on_with(
        Method::GET,
        "/secret",
        |_req: Request| async { Ok::<_, Error>(StatusCode::OK) },
        Stack::new().with(Authenticate::new(auth)),
    );

    let res = send(&router, request(Method::GET, "/secret", Some("Bearer a.b.c"), "")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(&res), serde_json::json!({ "error": "authentication failed" }));
}

#[tokio::test]
async fn missing_role_is_forbidden_before_the_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(Registry::new());
    let auth = Arc::new(authenticator());
    let router = Router::with_middleware(standard(&registry)).on_with(
        Method::DELETE,
        "/things/{id}",
        counted(&hits),
        Stack::new()
            .with(Authenticate::new(Arc::clone(&auth)))
            .with(HasRole::new([ROLE_ADMIN])),
    );

    let user = bearer(&auth, "u", &[ROLE_USER]);
    let res = send(&router, request(Method::DELETE, "/things/1", Some(&user), "")).await;
    assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let admin = bearer(&auth, "a", &[ROLE_ADMIN]);
    let res = send(&router, request(Method::DELETE, "/things/1", Some(&admin), "")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn role_check_without_authentication_is_a_500() {
    let hits = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(Registry::new());
    let router = Router::with_middleware(standard(&registry)).on_with(
        Method::GET,
        "/miswired",
        counted(&hits),
        Stack::new().with(HasRole::new([ROLE_USER])),
    );

    let res = send(&router, request(Method::GET, "/miswired", None, "")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_error_answers_500_and_escapes() {
    let registry = Arc::new(Registry::new());
    let router = Router::with_middleware(standard(&registry)).on(Method::POST, "/integrity", |_req: Request| async {
        Err::<Response, _>(garagesale::ShutdownError::new("data integrity lost").into())
    });

    let err = router
        .dispatch(request(Method::POST, "/integrity", None, ""), remote())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "data integrity lost");
}

#[tokio::test]
async fn traceparent_is_adopted() {
    let router = Router::new().on(Method::GET, "/", |req: Request| async move {
        Ok::<_, Error>(req.values().trace_id().to_owned())
    });

    let mut req = request(Method::GET, "/", None, "");
    req.headers_mut().insert(
        "traceparent",
        "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".parse().unwrap(),
    );
    let res = send(&router, req).await;
    assert_eq!(res.body(), b"4bf92f3577b34da6a3ce929d0e0e4736");

    let res = send(&router, request(Method::GET, "/", None, "")).await;
    assert_eq!(res.body().len(), 32);
}
