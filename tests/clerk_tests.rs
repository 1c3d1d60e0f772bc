//! Clerk session verification and user lookup against a mock Backend API.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nexthub_gate::identity::{ClerkClient, ClerkSettings, IdentityError, IdentityProvider};

const PRIVATE_PEM: &str = include_str!("fixtures/session_private.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/session_public.pem");
const JWKS: &str = include_str!("fixtures/jwks.json");
const KID: &str = "ins_test_key";
const SECRET: &str = "sk_test_abc";

fn session_claims(sub: &str, exp_offset: i64) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": sub,
        "sid": "sess_123",
        "iat": now,
        "nbf": now - 10,
        "exp": now + exp_offset,
        "azp": "http://localhost:3000",
    })
}

fn sign(claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
    headers
}

fn client(api_url: String, jwt_key: Option<&str>) -> ClerkClient {
    ClerkClient::new(
        Client::new(),
        ClerkSettings {
            api_url,
            secret_key: SecretString::from(SECRET),
            jwt_key: jwt_key.map(str::to_string),
        },
    )
    .unwrap()
}

async fn mount_jwks(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/jwks"))
        .and(header("authorization", format!("Bearer {SECRET}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// =============================================================================
// Session verification
// =============================================================================

#[tokio::test]
async fn test_pem_key_verifies_session() {
    let server = MockServer::start().await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    let token = sign(&session_claims("user_2abc", 60), Some(KID));
    let user_id = clerk.resolve_user_id(&bearer(&token)).await.unwrap();

    assert_eq!(user_id.as_deref(), Some("user_2abc"));
    // Networkless verification
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_session_is_anonymous() {
    let server = MockServer::start().await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    let token = sign(&session_claims("user_2abc", -3600), Some(KID));

    assert_eq!(clerk.resolve_user_id(&bearer(&token)).await.unwrap(), None);
}

#[tokio::test]
async fn test_symmetric_token_is_rejected() {
    let server = MockServer::start().await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    let token = encode(
        &Header::new(Algorithm::HS256),
        &session_claims("user_2abc", 60),
        &EncodingKey::from_secret(b"guessable"),
    )
    .unwrap();

    assert_eq!(clerk.resolve_user_id(&bearer(&token)).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_credential_is_anonymous() {
    let server = MockServer::start().await;
    let clerk = client(server.uri(), None);

    assert_eq!(clerk.resolve_user_id(&HeaderMap::new()).await.unwrap(), None);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_jwks_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    mount_jwks(&server, 1).await;
    let clerk = client(server.uri(), None);

    for _ in 0..2 {
        let token = sign(&session_claims("user_2abc", 60), Some(KID));
        let claims = clerk.verify_session(&token).await.unwrap().unwrap();
        assert_eq!(claims.sub, "user_2abc");
        assert_eq!(claims.sid.as_deref(), Some("sess_123"));
    }
}

#[tokio::test]
async fn test_unknown_kid_is_anonymous() {
    let server = MockServer::start().await;
    mount_jwks(&server, 1).await;
    let clerk = client(server.uri(), None);

    let token = sign(&session_claims("user_2abc", 60), Some("ins_rotated_away"));

    assert!(clerk.verify_session(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_forged_kids_share_one_jwks_fetch() {
    let server = MockServer::start().await;
    mount_jwks(&server, 1).await;
    let clerk = client(server.uri(), None);

    for i in 0..20 {
        let token = sign(&session_claims("user_2abc", 60), Some(&format!("bogus-{i}")));
        assert_eq!(clerk.resolve_user_id(&bearer(&token)).await.unwrap(), None);
    }

    // The real key was cached by the single fetch
    let token = sign(&session_claims("user_2abc", 60), Some(KID));
    let user_id = clerk.resolve_user_id(&bearer(&token)).await.unwrap();
    assert_eq!(user_id.as_deref(), Some("user_2abc"));
}

#[tokio::test]
async fn test_concurrent_misses_share_one_jwks_fetch() {
    let server = MockServer::start().await;
    mount_jwks(&server, 1).await;
    let clerk = client(server.uri(), None);

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let clerk = clerk.clone();
            tokio::spawn(async move {
                let kid = if i % 2 == 0 { KID.to_string() } else { format!("bogus-{i}") };
                let token = sign(&session_claims("user_2abc", 60), Some(&kid));
                clerk.verify_session(&token).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_jwks_refetched_after_cooldown() {
    let server = MockServer::start().await;
    mount_jwks(&server, 2).await;
    let clerk = client(server.uri(), None).with_jwks_refresh_cooldown(Duration::ZERO);

    for kid in ["ins_rotated_in", "ins_rotated_in_again"] {
        let token = sign(&session_claims("user_2abc", 60), Some(kid));
        assert!(clerk.verify_session(&token).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_jwks_outage_is_not_retried_within_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jwks"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let clerk = client(server.uri(), None);

    let token = sign(&session_claims("user_2abc", 60), Some(KID));
    assert!(clerk.resolve_user_id(&bearer(&token)).await.is_err());

    for i in 0..5 {
        let token = sign(&session_claims("user_2abc", 60), Some(&format!("bogus-{i}")));
        assert_eq!(clerk.resolve_user_id(&bearer(&token)).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_jwks_outage_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jwks"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    let clerk = client(server.uri(), None);

    let token = sign(&session_claims("user_2abc", 60), Some(KID));
    let err = clerk.resolve_user_id(&bearer(&token)).await.unwrap_err();

    assert!(matches!(err, IdentityError::Api { status: 503, .. }));
}

// =============================================================================
// User lookup
// =============================================================================

#[tokio::test]
async fn test_current_user_is_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/user_2abc"))
        .and(header("authorization", format!("Bearer {SECRET}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user_2abc",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "username": null,
            "image_url": "https://img.clerk.com/ada.png",
            "primary_email_address_id": "idn_1",
            "email_addresses": [
                { "id": "idn_1", "email_address": "ada@example.com",
                  "verification": { "status": "verified", "strategy": "email_code" } }
            ],
            "created_at": 1_705_314_600_000_i64
        })))
        .expect(1)
        .mount(&server)
        .await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    let token = sign(&session_claims("user_2abc", 60), Some(KID));
    let user = clerk.current_user(&bearer(&token)).await.unwrap().unwrap();

    assert_eq!(user.id, "user_2abc");
    assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    assert!(user.email_verified);
    assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
    assert_eq!(user.image_url.as_deref(), Some("https://img.clerk.com/ada.png"));
}

#[tokio::test]
async fn test_deleted_user_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/user_gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    assert!(clerk.fetch_user("user_gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_backend_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/user_2abc"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let clerk = client(server.uri(), Some(PUBLIC_PEM));

    let err = clerk.fetch_user("user_2abc").await.unwrap_err();

    assert!(matches!(err, IdentityError::Api { status: 500, ref message } if message == "boom"));
}
