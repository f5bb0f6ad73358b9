//! End-to-end dispatch over real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bff_dispatch::admin::setup_admin_router;
use bff_dispatch::http::AppState;
use bff_dispatch::resilience::CircuitState;
use bff_dispatch::{CallOptions, DispatchError, HttpServer};
use futures_util::future::join_all;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

const SERVICES: &str = r#"
    [services.salesforce]
    base_address = "{backend}/services/data/v58.0"
    auth = { scheme = "bearer", token = "sf-token" }
    resilience = { retries = 2, backoff_ms = 50, breaker_threshold = 10 }
    cache = { enabled = true, ttl_ms = 60000 }

    [services.salesforce.endpoints]
    getAccount = { method = "GET", path = "/sobjects/Account/{id}" }
    createAccount = { method = "POST", path = "/sobjects/Account" }

    [services.hubspot]
    base_address = "{backend}"
    auth = { scheme = "header", name = "X-Api-Key", value = "hs-key" }
    resilience = { breaker_threshold = 2, breaker_reset_ms = 60000 }

    [services.hubspot.endpoints]
    getContact = { method = "GET", path = "/contacts/{id}" }
"#;

fn counting_backend<F>(counter: Arc<AtomicU32>, respond: F) -> impl Fn(common::RecordedRequest) -> std::future::Ready<(u16, String)>
where
    F: Fn(u32) -> (u16, String) + Send + Sync + 'static,
{
    move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(respond(n))
    }
}

#[tokio::test]
async fn test_retry_on_unavailable() {
    let calls = Arc::new(AtomicU32::new(0));
    let backend = common::start_programmable_backend(counting_backend(calls.clone(), |n| {
        if n < 2 {
            (503, r#"{"message":"unavailable"}"#.into())
        } else {
            (200, r#"{"Id":"001","Name":"Acme"}"#.into())
        }
    }))
    .await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    let payload = dispatcher
        .call_endpoint("salesforce", "getAccount", vec!["001".into()], CallOptions::new(), "trace-1")
        .await
        .unwrap();

    assert_eq!(payload, json!({"Id": "001", "Name": "Acme"}));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let snapshot = dispatcher.breakers().get("salesforce").unwrap().snapshot();
    assert_eq!(snapshot.total_failures, 2);
    assert_eq!(snapshot.total_successes, 1);
}

#[tokio::test]
async fn test_peer_hangup_is_retried() {
    let (backend, received) = common::start_hangup_backend(2, r#"{"Id":"001"}"#).await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    let payload = dispatcher
        .call_endpoint("salesforce", "getAccount", vec!["001".into()], CallOptions::new(), "trace-hangup")
        .await
        .unwrap();

    assert_eq!(payload, json!({"Id": "001"}));
    assert_eq!(received.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.breakers().get("salesforce").unwrap().snapshot().total_failures, 2);
}

#[tokio::test]
async fn test_peer_hangup_exhausts_as_connection_reset() {
    let (backend, received) = common::start_hangup_backend(u32::MAX, "{}").await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    let err = dispatcher
        .call_endpoint("salesforce", "getAccount", vec!["001".into()], CallOptions::new(), "trace-hangup")
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ConnectionReset), "unexpected error: {err:?}");
    assert_eq!(received.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let backend = common::start_programmable_backend(counting_backend(calls.clone(), |_| {
        (400, r#"[{"errorCode":"MALFORMED_ID"}]"#.into())
    }))
    .await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    let err = dispatcher
        .call_endpoint("salesforce", "getAccount", vec!["bad".into()], CallOptions::new(), "t")
        .await
        .unwrap_err();

    match err {
        DispatchError::Upstream { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body[0]["errorCode"], "MALFORMED_ID");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_reaches_upstream_intact() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let backend = common::start_programmable_backend(move |request| {
        recorder.lock().unwrap().push(request);
        std::future::ready((200, r#"{"id":"001","success":true}"#.to_string()))
    })
    .await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    dispatcher
        .call_endpoint(
            "salesforce",
            "getAccount",
            vec!["a b/c".into()],
            CallOptions::new().query("fields", "Name"),
            "trace-42",
        )
        .await
        .unwrap();
    dispatcher
        .call_endpoint(
            "salesforce",
            "createAccount",
            vec![],
            CallOptions::new().body(json!({"Name": "Acme"})),
            "trace-43",
        )
        .await
        .unwrap();
    dispatcher
        .call_endpoint("hubspot", "getContact", vec!["7".into()], CallOptions::new(), "trace-44")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);

    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].target, "/services/data/v58.0/sobjects/Account/a%20b%2Fc?fields=Name");
    assert_eq!(seen[0].headers["authorization"], "Bearer sf-token");
    assert_eq!(seen[0].headers["x-trace-id"], "trace-42");

    assert_eq!(seen[1].method, "POST");
    assert_eq!(seen[1].target, "/services/data/v58.0/sobjects/Account");
    assert_eq!(serde_json::from_str::<Value>(&seen[1].body).unwrap(), json!({"Name": "Acme"}));

    assert_eq!(seen[2].target, "/contacts/7");
    assert_eq!(seen[2].headers["x-api-key"], "hs-key");
    assert!(!seen[2].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_cached_reads_skip_upstream() {
    let calls = Arc::new(AtomicU32::new(0));
    let backend = common::start_programmable_backend(counting_backend(calls.clone(), |n| {
        (200, format!(r#"{{"version":{}}}"#, n))
    }))
    .await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));
    let get = |id: &str| {
        dispatcher.call_endpoint("salesforce", "getAccount", vec![id.to_string()], CallOptions::new(), "t")
    };

    let first = get("001").await.unwrap();
    let second = get("001").await.unwrap();
    let other = get("002").await.unwrap();

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let backend = common::start_programmable_backend(counting_backend(calls.clone(), |_| {
        (500, r#"{"message":"boom"}"#.into())
    }))
    .await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));
    let call = || dispatcher.call_endpoint("hubspot", "getContact", vec!["7".into()], CallOptions::new(), "t");

    assert_eq!(call().await.unwrap_err().status(), Some(500));
    assert_eq!(call().await.unwrap_err().status(), Some(500));
    assert!(matches!(call().await.unwrap_err(), DispatchError::CircuitOpen(_)));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.breakers().get("hubspot").unwrap().state(), CircuitState::Open);
}

#[tokio::test]
async fn test_concurrent_calls_share_breaker() {
    let calls = Arc::new(AtomicU32::new(0));
    let backend = common::start_programmable_backend(counting_backend(calls.clone(), |_| (200, "{}".into()))).await;
    let dispatcher = common::dispatcher_for(&common::config_for(backend, SERVICES));

    let results = join_all((0..20).map(|i| {
        dispatcher.call_endpoint("hubspot", "getContact", vec![i.to_string()], CallOptions::new(), "t")
    }))
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(calls.load(Ordering::SeqCst), 20);
    assert_eq!(dispatcher.breakers().get("hubspot").unwrap().snapshot().total_successes, 20);
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn dispatch_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/dispatch")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_front_door_dispatch() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let backend = common::start_programmable_backend(move |request| {
        recorder.lock().unwrap().push(request);
        std::future::ready((200, r#"{"Id":"001"}"#.to_string()))
    })
    .await;
    let config = Arc::new(common::config_for(backend, SERVICES));
    let router = HttpServer::new(config.clone(), common::dispatcher_for(&config)).router();

    let response = router
        .clone()
        .oneshot(dispatch_request(json!({
            "service": "salesforce",
            "endpoint": "getAccount",
            "args": ["001"],
            "options": { "params": { "fields": "Id" } }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert_eq!(read_json(response).await, json!({"Id": "001"}));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].headers["x-trace-id"], request_id);
    assert_eq!(seen[0].target, "/services/data/v58.0/sobjects/Account/001?fields=Id");
}

#[tokio::test]
async fn test_front_door_errors() {
    let backend = common::start_programmable_backend(|_| std::future::ready((200, "{}".to_string()))).await;
    let config = Arc::new(common::config_for(backend, SERVICES));
    let router = HttpServer::new(config.clone(), common::dispatcher_for(&config)).router();

    let response = router
        .clone()
        .oneshot(dispatch_request(json!({"service": "acme", "endpoint": "getAccount"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json(response).await;
    assert_eq!(body["code"], "UNKNOWN_SERVICE");
    assert_eq!(body["message"], "Unknown API service: acme");

    let response = router
        .clone()
        .oneshot(dispatch_request(json!({"service": "salesforce", "endpoint": "getAccount", "args": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "INVALID_ARGUMENTS");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dispatch")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "BAD_REQUEST");

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_admin_requires_key() {
    let backend = common::start_programmable_backend(|_| std::future::ready((200, "{}".to_string()))).await;
    let mut config = common::config_for(backend, SERVICES);
    config.admin.enabled = true;
    config.admin.api_key = "admin-secret".into();
    let config = Arc::new(config);
    let dispatcher = common::dispatcher_for(&config);
    let router = setup_admin_router(AppState {
        dispatcher: dispatcher.clone(),
        config,
    });

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/admin/breakers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/breakers")
                .header("authorization", "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let breakers = read_json(response).await;
    assert_eq!(breakers.as_array().unwrap().len(), 2);
    assert_eq!(breakers[0]["service"], "hubspot");
    assert_eq!(breakers[0]["state"], "closed");
    assert!(dispatcher.breakers().is_empty(), "listing must not create breakers");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/admin/services")
                .header("authorization", "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let services = read_json(response).await;
    assert_eq!(services[1]["name"], "salesforce");
    assert_eq!(services[1]["endpoints"][1]["path"], "/sobjects/Account/{id}");
}
