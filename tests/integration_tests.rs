//! Integration tests for the Relay Alias Server API
//!
//! These tests drive the full router over the in-process store and verify the
//! request/response cycle and the jobs each endpoint emits.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

use relay_alias_server::jobs::{ChannelJobSink, DnsAction, DnsIdentityJob, Job, JobSinks};
use relay_alias_server::{routes, AppState, Config, MemoryStore, RelayStore};

// Test configuration constants
const INBOUND_TOKEN: &str = "test-inbound-token";
const ADMIN_KEY: &str = "test-admin-key";

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a test configuration
fn test_config(max_free_aliases: i64) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: None,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        environment: "test".to_string(),
        inbound_token: INBOUND_TOKEN.to_string(),
        admin_secret_key: None,
        relay_domains: vec!["relay.example".to_string(), "relay2.example".to_string()],
        max_free_aliases,
        provisioning_enabled: true,
    }
}

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    forwarding: UnboundedReceiver<Job>,
    provisioning: UnboundedReceiver<Job>,
}

/// Build the router over a fresh store with users 7 and 8 (free) and 9 (premium)
async fn create_test_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store.seed_domains(&config.relay_domains).await.unwrap();
    store.add_user(7, Some("seven@mailbox.test"), false);
    store.add_user(8, Some("eight@mailbox.test"), false);
    store.add_user(9, Some("nine@mailbox.test"), true);
    store.add_user(10, None, false);

    let (forwarding_sink, forwarding) = ChannelJobSink::channel();
    let (provisioning_sink, provisioning) = ChannelJobSink::channel();
    let sinks = JobSinks {
        forwarding: Arc::new(forwarding_sink),
        provisioning: Arc::new(provisioning_sink),
    };

    let state = AppState::new(config, store.clone(), store.clone(), sinks);

    TestApp {
        app: routes::router(state),
        store,
        forwarding,
        provisioning,
    }
}

async fn create_test_app() -> TestApp {
    create_test_app_with(test_config(5)).await
}

impl TestApp {
    /// Send a request and return status plus JSON body (`Null` when empty)
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Create a random alias for `owner` and return its JSON
    async fn create_alias(&self, owner: i64) -> Value {
        let (status, body) = self
            .send(make_json_request("POST", "/api/v1/relayaddresses", Some(owner), json!({})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    fn drain_provisioning(&mut self) -> Vec<Job> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.provisioning.try_recv() {
            jobs.push(job);
        }
        jobs
    }
}

/// Create a request with a JSON body and optional owner header
fn make_json_request(method: &str, uri: &str, owner: Option<i64>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(owner) = owner {
        builder = builder.header("x-user-id", owner.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Create a GET request with optional owner header
fn make_get_request(uri: &str, owner: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-user-id", owner.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

fn make_delete_request(uri: &str, owner: i64) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-user-id", owner.to_string())
        .body(Body::empty())
        .unwrap()
}

/// Webhook body in the provider's shape: `envelope` is a JSON string
fn webhook_body(to: Value) -> Value {
    json!({
        "envelope": json!({ "to": to, "from": "sender@outside.test" }).to_string(),
        "subject": "Hello",
        "text": "Hi there",
    })
}

fn dns_job(action: DnsAction, domain: &str) -> Job {
    Job::DnsIdentity(DnsIdentityJob {
        action,
        domain: domain.to_string(),
    })
}

fn is_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

// =============================================================================
// Health and Catalog
// =============================================================================

#[tokio::test]
async fn test_health_check_returns_healthy() {
    let test = create_test_app().await;

    let (status, body) = test.send(make_get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn test_list_domains() {
    let test = create_test_app().await;

    let (status, body) = test.send(make_get_request("/api/v1/domains", None)).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["relay.example", "relay2.example"]);
}

// =============================================================================
// Owner Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_owner_header_is_unauthorized() {
    let test = create_test_app().await;

    let (status, body) = test
        .send(make_get_request("/api/v1/relayaddresses", None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_malformed_owner_header_is_unauthorized() {
    let test = create_test_app().await;
    let request = Request::builder()
        .uri("/api/v1/relayaddresses")
        .header("x-user-id", "seven")
        .body(Body::empty())
        .unwrap();

    let (status, _) = test.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Alias Tests
// =============================================================================

#[tokio::test]
async fn test_create_alias_on_default_domain() {
    let test = create_test_app().await;

    let body = test.create_alias(7).await;

    let local_part = body["local_part"].as_str().unwrap();
    assert!(is_label(local_part));
    assert_eq!(body["user_id"], 7);
    assert_eq!(body["enabled"], true);
    assert_eq!(
        body["full_address"],
        format!("{}@relay.example", local_part)
    );
}

#[tokio::test]
async fn test_create_alias_on_named_domain() {
    let test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/relayaddresses",
            Some(7),
            json!({ "domain": "relay2.example", "description": "forums" }),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["full_domain"], "relay2.example");
    assert_eq!(body["description"], "forums");
}

#[tokio::test]
async fn test_create_alias_unknown_domain() {
    let test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/relayaddresses",
            Some(7),
            json!({ "domain": "nowhere.test" }),
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_chosen_local_part_requires_subdomain() {
    let test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/relayaddresses",
            Some(7),
            json!({ "local_part": "shop" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "malformed");
}

#[tokio::test]
async fn test_free_quota_enforced() {
    let test = create_test_app_with(test_config(2)).await;
    test.create_alias(7).await;
    test.create_alias(7).await;

    let (status, body) = test
        .send(make_json_request("POST", "/api/v1/relayaddresses", Some(7), json!({})))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "quota_exceeded");

    // Premium users are not limited
    for _ in 0..3 {
        test.create_alias(9).await;
    }
}

#[tokio::test]
async fn test_deleted_literal_never_reusable() {
    let test = create_test_app().await;

    // Pin the literal through a rename of the owner's first alias
    let first = test.create_alias(7).await;
    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", first["id"]),
            Some(7),
            json!({ "local_part": "a1b2c3" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_address"], "a1b2c3@relay.example");

    let (status, _) = test
        .send(make_delete_request(
            &format!("/api/v1/relayaddresses/{}", first["id"]),
            7,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Same owner
    let second = test.create_alias(7).await;
    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", second["id"]),
            Some(7),
            json!({ "local_part": "a1b2c3" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "tombstoned");

    // Different owner
    let other = test.create_alias(8).await;
    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", other["id"]),
            Some(8),
            json!({ "local_part": "a1b2c3" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "tombstoned");
}

#[tokio::test]
async fn test_rename_restricted_to_first_alias() {
    let test = create_test_app().await;
    test.create_alias(7).await;
    let second = test.create_alias(7).await;

    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", second["id"]),
            Some(7),
            json!({ "local_part": "newname" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");

    // Other fields stay editable
    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", second["id"]),
            Some(7),
            json!({ "description": "newsletters", "enabled": false }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "newsletters");
    assert_eq!(body["enabled"], false);
}

#[tokio::test]
async fn test_rename_rejects_blocked_literal() {
    let test = create_test_app().await;
    let first = test.create_alias(7).await;

    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/relayaddresses/{}", first["id"]),
            Some(7),
            json!({ "local_part": "spam123" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "blocked");
}

#[tokio::test]
async fn test_foreign_and_missing_alias() {
    let test = create_test_app().await;
    let alias = test.create_alias(7).await;

    let (status, _) = test
        .send(make_get_request(
            &format!("/api/v1/relayaddresses/{}", alias["id"]),
            Some(8),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = test
        .send(make_delete_request(
            &format!("/api/v1/relayaddresses/{}", alias["id"]),
            8,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = test
        .send(make_get_request("/api/v1/relayaddresses/9999", Some(7)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_aliases_plain_and_paginated() {
    let test = create_test_app().await;
    for _ in 0..3 {
        test.create_alias(7).await;
    }
    test.create_alias(8).await;

    let (status, body) = test
        .send(make_get_request("/api/v1/relayaddresses", Some(7)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = test
        .send(make_get_request(
            "/api/v1/relayaddresses?paginate=true&page=2&per_page=2",
            Some(7),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["per_page"], 2);
    assert_eq!(body["meta"]["total"], 3);
}

#[tokio::test]
async fn test_list_aliases_page_past_the_end() {
    let test = create_test_app().await;
    test.create_alias(7).await;

    let (status, body) = test
        .send(make_get_request(
            "/api/v1/relayaddresses?paginate=true&page=9223372036854775807&per_page=20",
            Some(7),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(body["meta"]["total"], 1);
}

// =============================================================================
// Subdomain Tests
// =============================================================================

#[tokio::test]
async fn test_subdomain_singleton() {
    let mut test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/subdomains",
            Some(7),
            json!({ "label": "alice" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["full_domain"], "alice.relay.example");
    assert_eq!(body["num_addresses"], 0);

    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/subdomains",
            Some(7),
            json!({ "label": "alice-again" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "quota_exceeded");

    assert_eq!(
        test.drain_provisioning(),
        vec![dns_job(DnsAction::Create, "alice.relay.example")]
    );
}

#[tokio::test]
async fn test_subdomain_rename_cascade() {
    let mut test = create_test_app().await;

    let (_, subdomain) = test
        .send(make_json_request(
            "POST",
            "/api/v1/subdomains",
            Some(7),
            json!({ "label": "alice" }),
        ))
        .await;
    let subdomain_id = subdomain["id"].as_i64().unwrap();

    let mut alias_ids = Vec::new();
    for local_part in ["shop", "news", "bank"] {
        let (status, body) = test
            .send(make_json_request(
                "POST",
                "/api/v1/relayaddresses",
                Some(7),
                json!({ "subdomain_id": subdomain_id, "local_part": local_part }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["full_address"],
            format!("{}@alice.relay.example", local_part)
        );
        alias_ids.push(body["id"].as_i64().unwrap());
    }

    let (status, body) = test
        .send(make_get_request(
            &format!("/api/v1/subdomains/{}", subdomain_id),
            Some(7),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_addresses"], 3);

    test.drain_provisioning();

    let (status, body) = test
        .send(make_json_request(
            "PATCH",
            &format!("/api/v1/subdomains/{}", subdomain_id),
            Some(7),
            json!({ "label": "alice2" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_domain"], "alice2.relay.example");
    assert_eq!(body["num_addresses"], 0);

    for id in alias_ids {
        let (status, _) = test
            .send(make_get_request(
                &format!("/api/v1/relayaddresses/{}", id),
                Some(7),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    assert_eq!(
        test.drain_provisioning(),
        vec![
            dns_job(DnsAction::Delete, "alice.relay.example"),
            dns_job(DnsAction::Create, "alice2.relay.example"),
        ]
    );

    let domain = test
        .store
        .domain_by_name("relay.example")
        .await
        .unwrap()
        .unwrap();
    let retired = test
        .store
        .subdomain_by_label("alice", domain.id)
        .await
        .unwrap()
        .unwrap();
    assert!(retired.is_deleted);

    // Nobody can claim the old label again
    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/subdomains",
            Some(8),
            json!({ "label": "alice" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "tombstoned");

    // The renamed subdomain accepts fresh aliases
    let (status, body) = test
        .send(make_json_request(
            "POST",
            "/api/v1/relayaddresses",
            Some(7),
            json!({ "subdomain_id": subdomain_id, "local_part": "shop" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["full_address"], "shop@alice2.relay.example");
}

#[tokio::test]
async fn test_subdomain_delete_and_use_toggle() {
    let mut test = create_test_app().await;

    let (_, subdomain) = test
        .send(make_json_request(
            "POST",
            "/api/v1/subdomains",
            Some(7),
            json!({ "label": "alice" }),
        ))
        .await;
    let uri = format!("/api/v1/subdomains/{}", subdomain["id"]);

    let (status, body) = test
        .send(make_json_request(
            "PUT",
            &format!("{}/use", uri),
            Some(7),
            json!({ "use_subdomain": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["use_subdomain"], true);

    // New aliases default to the opted-in subdomain
    let alias = test.create_alias(7).await;
    assert_eq!(alias["full_domain"], "alice.relay.example");

    let (status, _) = test.send(make_delete_request(&uri, 8)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    test.drain_provisioning();
    let (status, _) = test.send(make_delete_request(&uri, 7)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        test.drain_provisioning(),
        vec![dns_job(DnsAction::Delete, "alice.relay.example")]
    );

    let (status, _) = test
        .send(make_get_request(
            &format!("/api/v1/relayaddresses/{}", alias["id"]),
            Some(7),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = test
        .send(make_get_request("/api/v1/subdomains", Some(7)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

// =============================================================================
// Inbound Webhook Tests
// =============================================================================

#[tokio::test]
async fn test_webhook_unknown_recipient_soft_fails() {
    let mut test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            &format!("/inbound?token={}", INBOUND_TOKEN),
            None,
            webhook_body(json!(["unknown@relay.example"])),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
    assert!(test.forwarding.try_recv().is_err());
}

#[tokio::test]
async fn test_webhook_forwards_to_owner() {
    let mut test = create_test_app().await;
    let alias = test.create_alias(7).await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            &format!("/inbound?token={}", INBOUND_TOKEN),
            None,
            webhook_body(alias["full_address"].clone()),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let Job::Forward(payload) = test.forwarding.try_recv().unwrap() else {
        panic!("expected a forwarding job");
    };
    assert_eq!(payload["destination"], "seven@mailbox.test");
    assert_eq!(payload["subject"], "Hello");

    let (_, alias) = test
        .send(make_get_request(
            &format!("/api/v1/relayaddresses/{}", alias["id"]),
            Some(7),
        ))
        .await;
    assert_eq!(alias["num_forwarded"], 1);
}

#[tokio::test]
async fn test_webhook_owner_without_email_soft_fails() {
    let mut test = create_test_app().await;
    let alias = test.create_alias(10).await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            &format!("/inbound?token={}", INBOUND_TOKEN),
            None,
            webhook_body(json!([alias["full_address"]])),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(test.forwarding.try_recv().is_err());
}

#[tokio::test]
async fn test_webhook_invalid_token() {
    let test = create_test_app().await;

    let (status, _) = test
        .send(make_json_request(
            "POST",
            "/inbound?token=wrong",
            None,
            webhook_body(json!("x@relay.example")),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = test
        .send(make_json_request(
            "POST",
            "/inbound",
            None,
            webhook_body(json!("x@relay.example")),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_malformed_body() {
    let test = create_test_app().await;

    let (status, body) = test
        .send(make_json_request(
            "POST",
            &format!("/inbound?token={}", INBOUND_TOKEN),
            None,
            json!({ "subject": "no envelope" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "malformed");
}

#[tokio::test]
async fn test_destination_lookup() {
    let test = create_test_app().await;
    let alias = test.create_alias(7).await;
    let address = alias["full_address"].as_str().unwrap();

    let (status, body) = test
        .send(make_get_request(
            &format!(
                "/inbound/destination?token={}&relay_address={}",
                INBOUND_TOKEN, address
            ),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 7);

    let (status, _) = test
        .send(make_get_request(
            &format!(
                "/inbound/destination?token={}&relay_address=unknown@relay.example",
                INBOUND_TOKEN
            ),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test
        .send(make_get_request(
            &format!("/inbound/destination?token=wrong&relay_address={}", address),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Admin Stats Tests
// =============================================================================

fn test_config_with_admin() -> Config {
    Config {
        admin_secret_key: Some(ADMIN_KEY.to_string()),
        ..test_config(5)
    }
}

#[tokio::test]
async fn test_admin_stats_success() {
    let test = create_test_app_with(test_config_with_admin()).await;
    let alias = test.create_alias(7).await;
    test.create_alias(7).await;
    test.send(make_delete_request(
        &format!("/api/v1/relayaddresses/{}", alias["id"]),
        7,
    ))
    .await;

    let (status, body) = test
        .send(make_get_request(
            &format!("/admin/stats?key={}", ADMIN_KEY),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_addresses"], 1);
    assert_eq!(body["tombstones"], 1);
    assert_eq!(body["active_subdomains"], 0);
}

#[tokio::test]
async fn test_admin_stats_invalid_key() {
    let test = create_test_app_with(test_config_with_admin()).await;

    let (status, _) = test
        .send(make_get_request("/admin/stats?key=wrong-key", None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_stats_disabled_without_key() {
    let test = create_test_app().await;

    let (status, _) = test
        .send(make_get_request(&format!("/admin/stats?key={}", ADMIN_KEY), None))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
