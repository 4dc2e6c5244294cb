use std::sync::Arc;

use serde_json::json;
use vigil::{
    DeliveryOutcome, InMemoryRepositoryProvider, SecurityAction, SecurityConfig,
    TrackedAction, Vigil, VigilBuilder,
};
use vigil_core::ManualClock;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

async fn vigil_against(server: &MockServer) -> Vigil<InMemoryRepositoryProvider> {
    let config = SecurityConfig::default()
        .with_api_base(server.uri())
        .with_ip_lookup_url(format!("{}/ip", server.uri()));

    VigilBuilder::new()
        .with_in_memory()
        .with_config(config)
        .with_clock(Arc::new(ManualClock::epoch()))
        .build()
        .await
        .expect("Failed to build vigil")
}

#[tokio::test]
async fn test_accepted_log_is_not_kept_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/security/log/"))
        .and(body_partial_json(json!({
            "action": "login_success",
            "email": "jane@example.com",
            "ipAddress": "203.0.113.7",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let vigil = vigil_against(&server).await;
    vigil
        .validate_login(Some("203.0.113.7"), None, "jane@example.com", true)
        .await
        .unwrap();

    assert!(vigil.local_security_logs(10).await.is_empty());
}

#[tokio::test]
async fn test_rejected_log_falls_back_to_local_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/security/log/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let vigil = vigil_against(&server).await;
    let outcome = vigil
        .track_user_action("xss_attempt", TrackedAction::new().with_ip("10.0.0.8"))
        .await;

    assert_eq!(outcome, DeliveryOutcome::StoredLocally);
    let logs = vigil.local_security_logs(10).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, SecurityAction::Custom("xss_attempt".to_string()));
    assert!(logs[0].suspicious);
}

#[tokio::test]
async fn test_missing_ip_is_looked_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "198.51.100.23" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/security/log/"))
        .and(body_partial_json(json!({ "ipAddress": "198.51.100.23" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let vigil = vigil_against(&server).await;
    let outcome = vigil
        .track_user_action(SecurityAction::LoginSuccess, TrackedAction::new())
        .await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert!(vigil.check_rate_limit(None, "search", 1).await);
    assert!(!vigil.check_rate_limit(Some("198.51.100.23"), "search", 1).await);
}
