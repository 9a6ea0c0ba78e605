//! Authentication tests using wiremock mock server.
//!
//! These tests verify:
//! - API key precedence (no token endpoint traffic)
//! - Lazy refresh of missing/expired access tokens
//! - Password grant, including the two-factor (202) flow
//! - Single-flight refresh under concurrent requests

use std::{sync::Once, time::Duration};

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use virtuous::{APIErrorKind, API_KEY_ENV, AuthOutcome, AuthState, Client, Config, Error};
use wiremock::matchers::{body_string, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTACT_PATH: &str = "/api/Contact/1";

static CLEAR_ENV_API_KEY: Once = Once::new();

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn token_body() -> Value {
    json!({
        "access_token": "new_access_token",
        "token_type": "bearer",
        "expires_in": 1295999,
        "refresh_token": "new_refresh_token",
        "userName": "user@email.com",
        "twoFactorEnabled": "False",
        ".issued": Utc::now().to_rfc2822(),
        ".expires": (Utc::now() + chrono::Duration::seconds(1_295_999)).to_rfc2822()
    })
}

/// Builds a client against the mock server. An exported `VIRTUOUS_KEY` would
/// switch every client to key auth, so it is cleared first.
fn client_for_server(server: &MockServer, cfg: Config) -> Client {
    CLEAR_ENV_API_KEY.call_once(|| {
        // SAFETY: runs once, before any client in this test binary reads the variable.
        unsafe { std::env::remove_var(API_KEY_ENV) };
    });
    Client::new(Config {
        base_url: Some(server.uri()),
        ..cfg
    })
    .expect("client creation should succeed")
}

async fn mount_contact(server: &MockServer, bearer: &str) {
    Mock::given(method("GET"))
        .and(path(CONTACT_PATH))
        .and(header("authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn api_key_is_used_without_token_requests() {
    init_tracing();
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    mount_contact(&server, "test_api_key").await;

    let client = client_for_server(
        &server,
        Config {
            api_key: Some("test_api_key".into()),
            ..Default::default()
        },
    );
    assert_eq!(client.auth_state(), AuthState::KeyAuthenticated);

    let body = client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    assert_eq!(body, Some(json!({"id": 1})));
    server.verify().await;
}

#[tokio::test]
async fn api_key_wins_over_expired_oauth_tokens() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    mount_contact(&server, "test_api_key").await;

    let client = client_for_server(
        &server,
        Config {
            api_key: Some("test_api_key".into()),
            access_token: Some("old_access_token".into()),
            refresh_token: Some("test_refresh_token".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2023, 12, 11, 0, 0, 0).unwrap()),
            ..Default::default()
        },
    );

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    assert!(!client.refreshed());
    server.verify().await;
}

#[tokio::test]
async fn access_token_without_expiry_is_used_as_is() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    mount_contact(&server, "test_access_token").await;

    let client = client_for_server(
        &server,
        Config {
            access_token: Some("test_access_token".into()),
            ..Default::default()
        },
    );
    assert_eq!(client.auth_state(), AuthState::TokenPending);

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    assert_eq!(client.auth_state(), AuthState::TokenFresh);
    server.verify().await;
}

#[tokio::test]
async fn unexpired_access_token_is_not_refreshed() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    mount_contact(&server, "test_access_token").await;

    let client = client_for_server(
        &server,
        Config {
            access_token: Some("test_access_token".into()),
            refresh_token: Some("test_refresh_token".into()),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(1_295_999)),
            ..Default::default()
        },
    );

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    assert!(!client.refreshed());
    server.verify().await;
}

#[tokio::test]
async fn expired_access_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "grant_type=refresh_token&refresh_token=test_refresh_token",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_contact(&server, "new_access_token").await;

    let client = client_for_server(
        &server,
        Config {
            access_token: Some("test_access_token".into()),
            refresh_token: Some("test_refresh_token".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2023, 12, 11, 0, 0, 0).unwrap()),
            ..Default::default()
        },
    );
    assert_eq!(client.auth_state(), AuthState::TokenExpired);

    client.get(CONTACT_PATH, ()).await.expect("first request should succeed");
    client.get(CONTACT_PATH, ()).await.expect("second request should succeed");

    assert!(client.refreshed());
    assert_eq!(client.access_token().as_deref(), Some("new_access_token"));
    assert_eq!(client.refresh_token().as_deref(), Some("new_refresh_token"));
    assert!(client.expires_at().expect("expiry should be set") > Utc::now());
    server.verify().await;
}

#[tokio::test]
async fn refresh_token_alone_acquires_an_access_token_first() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_contact(&server, "new_access_token").await;

    let client = client_for_server(
        &server,
        Config {
            refresh_token: Some("test_refresh_token".into()),
            ..Default::default()
        },
    );

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");

    let requests = server.received_requests().await.expect("recording enabled");
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths, vec!["/Token", CONTACT_PATH]);
    assert!(requests[0].headers.get("authorization").is_none());
    server.verify().await;
}

#[tokio::test]
async fn constructing_a_client_sends_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;

    let _client = client_for_server(
        &server,
        Config {
            refresh_token: Some("test_refresh_token".into()),
            ..Default::default()
        },
    );
    server.verify().await;
}

#[tokio::test]
async fn refresh_failure_surfaces_as_api_error_and_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(
        &server,
        Config {
            refresh_token: Some("revoked".into()),
            ..Default::default()
        },
    );

    let err = client
        .get(CONTACT_PATH, ())
        .await
        .expect_err("refresh should fail");
    assert_eq!(err.api_kind(), Some(APIErrorKind::Unauthorized));
    assert_eq!(
        err.to_string(),
        format!("401: {}/Token invalid_grant", server.uri())
    );
    assert!(!client.refreshed());
    assert_eq!(client.refresh_token().as_deref(), Some("revoked"));
    assert_eq!(client.access_token(), None);
}

#[tokio::test]
async fn unauthenticated_requests_carry_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CONTACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server, Config::default());
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
    assert_eq!(client.auth().bearer_token().await.unwrap(), None);

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn authenticate_posts_password_grant_and_stores_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .and(body_string(
            "grant_type=password&username=user%40email.com&password=test_password",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_contact(&server, "new_access_token").await;

    let client = client_for_server(&server, Config::default());
    let outcome = client
        .authenticate("user@email.com", "test_password", None)
        .await
        .expect("authentication should succeed");

    let tokens = outcome.tokens().expect("tokens should be issued").clone();
    assert_eq!(tokens, client.tokens());
    assert_eq!(tokens.access_token.as_deref(), Some("new_access_token"));
    assert_eq!(tokens.refresh_token.as_deref(), Some("new_refresh_token"));
    assert!(tokens.expires_at.expect("expiry should be set") > Utc::now());
    assert!(client.refreshed());

    client.get(CONTACT_PATH, ()).await.expect("request should succeed");
    server.verify().await;
}

#[tokio::test]
async fn authenticate_reports_two_factor_requirement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .and(body_string_contains("otp=111111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client_for_server(&server, Config::default());

    let outcome = client
        .authenticate("otp@user.com", "test_password", None)
        .await
        .expect("202 is not an error");
    assert_eq!(outcome, AuthOutcome::RequiresOtp);
    assert!(outcome.requires_otp());
    assert!(!client.refreshed());
    assert_eq!(client.tokens(), Default::default());
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);

    let outcome = client
        .authenticate("otp@user.com", "test_password", Some("111111"))
        .await
        .expect("authentication with otp should succeed");
    assert!(!outcome.requires_otp());
    assert_eq!(client.access_token().as_deref(), Some("new_access_token"));
}

#[tokio::test]
async fn authenticate_validates_before_sending() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let client = client_for_server(&server, Config::default());

    let err = client
        .authenticate("  ", "password", None)
        .await
        .expect_err("blank email should fail");
    assert!(matches!(err, Error::Validation(_)));

    let err = client
        .authenticate("user@email.com", "", None)
        .await
        .expect_err("blank password should fail");
    assert!(matches!(err, Error::Validation(_)));
    server.verify().await;
}

#[tokio::test]
async fn malformed_token_response_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})))
        .mount(&server)
        .await;

    let client = client_for_server(&server, Config::default());
    let err = client
        .authenticate("user@email.com", "password", None)
        .await
        .expect_err("token body without access_token should fail");
    assert!(matches!(err, Error::TokenResponse(_)));
    assert!(!client.refreshed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_contact(&server, "new_access_token").await;

    let client = client_for_server(
        &server,
        Config {
            refresh_token: Some("test_refresh_token".into()),
            ..Default::default()
        },
    );

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get(CONTACT_PATH, ()).await })
        })
        .collect();
    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("request should succeed");
    }
    server.verify().await;
}

#[tokio::test]
async fn refresh_answered_with_202_is_an_error_and_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Token"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTACT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for_server(
        &server,
        Config {
            refresh_token: Some("test_refresh_token".into()),
            ..Default::default()
        },
    );

    let err = client
        .get(CONTACT_PATH, ())
        .await
        .expect_err("202 on refresh should fail");
    assert!(matches!(err, Error::TokenResponse(_)), "got {err:?}");
    assert!(!client.refreshed());
    assert_eq!(client.access_token(), None);
    assert_eq!(client.refresh_token().as_deref(), Some("test_refresh_token"));
    assert_eq!(client.auth_state(), AuthState::TokenExpired);
    server.verify().await;
}

#[test]
fn config_debug_redacts_credentials() {
    let cfg = Config {
        api_key: Some("secret_api_key".into()),
        access_token: Some("secret_access_token".into()),
        refresh_token: Some("secret_refresh_token".into()),
        ..Default::default()
    };
    let printed = format!("{cfg:?}");
    assert!(!printed.contains("secret_"), "{printed}");
    assert!(printed.contains("<redacted>"));
}
