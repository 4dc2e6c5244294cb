use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode, header, request::Builder},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use vigil::{InMemoryRepositoryProvider, OfflineTransport, Vigil, VigilBuilder};
use vigil_axum::SecurityHeaderAudit;
use vigil_core::ManualClock;

async fn vigil() -> Arc<Vigil<InMemoryRepositoryProvider>> {
    Arc::new(
        VigilBuilder::new()
            .with_in_memory()
            .with_transport(Arc::new(OfflineTransport))
            .with_clock(Arc::new(ManualClock::epoch()))
            .build()
            .await
            .expect("Failed to build vigil"),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

/// A request arriving on a connection from `peer`.
fn from_peer(peer: &str) -> Builder {
    let ip: IpAddr = peer.parse().unwrap();
    Request::builder().extension(ConnectInfo(SocketAddr::new(ip, 41000)))
}

fn login_attempt_from(builder: Builder, email: &str, success: bool) -> Request<Body> {
    builder
        .method("POST")
        .uri("/login/attempt")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": email, "success": success }).to_string(),
        ))
        .unwrap()
}

fn login_attempt(ip: &str, email: &str, success: bool) -> Request<Body> {
    login_attempt_from(from_peer(ip), email, success)
}

fn unblock(ip: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = from_peer("192.0.2.10")
        .method("DELETE")
        .uri(format!("/ip/{ip}/blocked"));
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn block_status(ip: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/ip/{ip}/blocked"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = vigil_axum::routes(vigil().await).build();
    let (status, _, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_login_attempts_escalate_to_block() {
    let vigil = vigil().await;
    let app = vigil_axum::routes(vigil.clone()).build();

    for _ in 0..4 {
        let (status, _, body) = send(&app, login_attempt("203.0.113.7", "jane@example.com", false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], true);
    }

    let (status, _, body) = send(&app, login_attempt("203.0.113.7", "jane@example.com", false)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Too many failed login attempts. Please try again later."
    );

    let (status, headers, body) = send(&app, login_attempt("203.0.113.7", "jane@example.com", true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "IP address is temporarily blocked due to suspicious activity"
    );
    assert_eq!(headers[header::RETRY_AFTER], "900");

    // Other clients are unaffected.
    let (status, _, _) = send(&app, login_attempt("203.0.113.8", "jane@example.com", true)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_evade_block() {
    let vigil = vigil().await;
    let app = vigil_axum::routes(vigil.clone()).build();

    let attempt = |n: u8, success: bool| {
        login_attempt_from(
            from_peer("203.0.113.7").header("X-Forwarded-For", format!("1.1.1.{n}")),
            "jane@example.com",
            success,
        )
    };

    for n in 0..4 {
        assert_eq!(send(&app, attempt(n, false)).await.0, StatusCode::OK);
    }
    assert_eq!(
        send(&app, attempt(4, false)).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send(&app, attempt(5, true)).await.0, StatusCode::FORBIDDEN);

    assert!(vigil.is_ip_blocked("203.0.113.7").await.unwrap());
    assert!(!vigil.is_ip_blocked("1.1.1.4").await.unwrap());
}

#[tokio::test]
async fn test_trusted_proxy_forwards_client_address() {
    let vigil = vigil().await;
    let app = vigil_axum::routes(vigil.clone())
        .with_trusted_proxies(["10.0.0.1".parse().unwrap()])
        .build();

    for _ in 0..5 {
        send(
            &app,
            login_attempt_from(
                from_peer("10.0.0.1").header("X-Forwarded-For", "6.6.6.6, 198.51.100.20"),
                "jane@example.com",
                false,
            ),
        )
        .await;
    }

    assert!(vigil.is_ip_blocked("198.51.100.20").await.unwrap());
    assert!(!vigil.is_ip_blocked("10.0.0.1").await.unwrap());
    assert!(!vigil.is_ip_blocked("6.6.6.6").await.unwrap());
}

#[tokio::test]
async fn test_login_attempt_logs_client_user_agent() {
    let vigil = vigil().await;
    let app = vigil_axum::routes(vigil.clone()).build();

    let (status, _, _) = send(
        &app,
        login_attempt_from(
            from_peer("203.0.113.7").header(header::USER_AGENT, "AttackerUA/1.0"),
            "jane@example.com",
            false,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let logs = vigil.local_security_logs(1).await;
    assert_eq!(logs[0].user_agent, "AttackerUA/1.0");
    assert_eq!(logs[0].ip_address, "203.0.113.7");
}

#[tokio::test]
async fn test_login_attempt_requires_email() {
    let app = vigil_axum::routes(vigil().await).build();
    let (status, _, _) = send(&app, login_attempt("203.0.113.7", "  ", false)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_block_status_is_public_but_unblock_is_not_mounted() {
    let vigil = vigil().await;
    vigil.block_ip("198.51.100.4").await.unwrap();
    let app = vigil_axum::routes(vigil.clone()).build();

    let (status, _, body) = send(&app, block_status("198.51.100.4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);
    assert_eq!(body["ipAddress"], "198.51.100.4");
    assert!(body["blockedUntil"].is_string());

    let (status, _, _) = send(&app, unblock("198.51.100.4", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(vigil.is_ip_blocked("198.51.100.4").await.unwrap());
}

#[tokio::test]
async fn test_unblock_requires_admin_token() {
    let vigil = vigil().await;
    vigil.block_ip("198.51.100.4").await.unwrap();
    let app = vigil_axum::routes(vigil.clone())
        .with_admin_token("s3cret-admin")
        .build();

    for authorization in [None, Some("Bearer wrong"), Some("s3cret-admin")] {
        let (status, _, body) = send(&app, unblock("198.51.100.4", authorization)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);
    }
    assert!(vigil.is_ip_blocked("198.51.100.4").await.unwrap());

    let (status, _, body) = send(&app, unblock("198.51.100.4", Some("Bearer s3cret-admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unblocked"], true);

    let (_, _, body) = send(&app, block_status("198.51.100.4")).await;
    assert_eq!(body["blocked"], false);
}

#[tokio::test]
async fn test_header_audit_layer_attaches_report() {
    let app = vigil_axum::routes(vigil().await).with_header_audit().build();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let audit = response
        .extensions()
        .get::<SecurityHeaderAudit>()
        .copied()
        .unwrap();
    assert!(!audit.all_present());
    assert_eq!(audit.missing().len(), 5);
}

#[tokio::test]
async fn test_no_header_audit_by_default() {
    let app = vigil_axum::routes(vigil().await).build();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.extensions().get::<SecurityHeaderAudit>().is_none());
}

#[tokio::test]
async fn test_ingest_then_list_logs() {
    let app = vigil_axum::routes(vigil().await).build();

    for (id, action) in [("m5d4ruo0abc", "login_failed"), ("m5d4ruo1def", "xss_attempt")] {
        let (status, _, body) = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/security/log/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "id": id,
                        "ipAddress": "10.0.0.50",
                        "userAgent": "Mozilla/5.0",
                        "action": action,
                        "timestamp": "2025-01-01T00:00:00Z",
                        "suspicious": action == "xss_attempt",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], id);
    }

    let (status, _, body) = send(
        &app,
        Request::builder()
            .uri("/api/security/logs?limit=1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let logs = body.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["action"], "xss_attempt");
}

#[tokio::test]
async fn test_ingest_rejects_blank_id() {
    let app = vigil_axum::routes(vigil().await).build();

    let (status, _, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/security/log/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "id": " ",
                    "ipAddress": "10.0.0.50",
                    "userAgent": "Mozilla/5.0",
                    "action": "login_failed",
                    "timestamp": "2025-01-01T00:00:00Z",
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fingerprint() {
    let app = vigil_axum::routes(vigil().await).build();

    let (status, _, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/fingerprint")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "userAgent": "Mozilla/5.0",
                    "language": "en-NG",
                    "platform": "Linux x86_64",
                    "screenResolution": "1920x1080",
                    "timezone": "Africa/Lagos",
                    "canvas": "data:image/png;base64,AAAA",
                    "webgl": { "status": "unsupported" },
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_rate_limit_middleware_is_per_path() {
    let app = vigil_axum::routes(vigil().await).with_rate_limit(2).build();
    let health = || from_peer("10.9.9.9").uri("/health").body(Body::empty()).unwrap();

    assert_eq!(send(&app, health()).await.0, StatusCode::OK);
    assert_eq!(send(&app, health()).await.0, StatusCode::OK);

    let (status, _, body) = send(&app, health()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Rate limit exceeded for /health");

    let (status, _, _) = send(
        &app,
        from_peer("10.9.9.9")
            .uri("/ip/10.9.9.9/blocked")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
