//! HTTP-level tests for the client handle against a mock Prisma Cloud API.

use prismacloud_client::{ApiRequest, ClientError, ConnectionConfig, ConnectionPool, PrismaClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Connection config pointing at the mock server (scheme passed separately).
fn config_for(server: &MockServer) -> ConnectionConfig {
    let address = server.address();
    ConnectionConfig {
        url: Some(address.ip().to_string()),
        port: Some(address.port() as i64),
        protocol: Some("http".to_string()),
        token: Some("abc".to_string()),
        retry_max_delay: Some(5),
        ..Default::default()
    }
}

#[tokio::test]
async fn sends_token_header_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/policy"))
        .and(header("x-redlock-auth", "abc"))
        .and(query_param("policy.severity", "high"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"policyId": "p1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = PrismaClient::connect(config_for(&server).validate().unwrap())
        .await
        .unwrap();
    let body = client
        .execute(&ApiRequest::get(&["v2", "policy"]).param("policy.severity", "high"))
        .await
        .unwrap();

    assert_eq!(body, json!([{"policyId": "p1"}]));
}

#[tokio::test]
async fn logs_in_with_password_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "username": "user",
            "password": "secret",
            "customerName": "acme"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "session-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cloud"))
        .and(header("x-redlock-auth", "session-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.token = None;
    config.username = Some("user".to_string());
    config.password = Some("secret".to_string());
    config.customer_name = Some("acme".to_string());

    let client = PrismaClient::connect(config.validate().unwrap()).await.unwrap();
    let body = client.execute(&ApiRequest::get(&["cloud"])).await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn rejected_login_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.token = None;
    config.username = Some("user".to_string());
    config.password = Some("wrong".to_string());
    config.customer_name = Some("acme".to_string());

    let err = PrismaClient::connect(config.validate().unwrap())
        .await
        .unwrap_err();
    match err {
        ClientError::Connection(msg) => assert!(msg.contains("401"), "{}", msg),
        other => panic!("expected connection error, got {:?}", other),
    }
}

#[tokio::test]
async fn retries_throttled_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cloud"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "acct"}])))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = PrismaClient::connect(config_for(&server).validate().unwrap())
        .await
        .unwrap();
    let body = client.execute(&ApiRequest::get(&["cloud"])).await.unwrap();
    assert_eq!(body, json!([{"name": "acct"}]));
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cloud"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.max_retries = Some(2);
    let client = PrismaClient::connect(config.validate().unwrap()).await.unwrap();

    let err = client.execute(&ApiRequest::get(&["cloud"])).await.unwrap_err();
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn not_found_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/policy/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = PrismaClient::connect(config_for(&server).validate().unwrap())
        .await
        .unwrap();
    let err = client
        .execute(&ApiRequest::get(&["policy", "missing"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn posts_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/alert"))
        .and(body_json(json!({"limit": 10, "detailed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = PrismaClient::connect(config_for(&server).validate().unwrap())
        .await
        .unwrap();
    let body = client
        .execute(&ApiRequest::post(&["v2", "alert"]).json(json!({"limit": 10, "detailed": true})))
        .await
        .unwrap();
    assert_eq!(body, json!({"items": []}));
}

#[tokio::test]
async fn session_email_is_fetched_once_per_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"email": "ops@example.com"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let pool = ConnectionPool::new();
    let conn = pool.connect("default", &config_for(&server)).await.unwrap();

    assert_eq!(
        conn.session_email().await.unwrap().as_deref(),
        Some("ops@example.com")
    );
    assert_eq!(
        conn.session_email().await.unwrap().as_deref(),
        Some("ops@example.com")
    );
}
