use axum::http::{HeaderMap, HeaderValue, header};
use chrono::Utc;
use jsonwebtoken as jwt;

use crate::auth::*;
use crate::cfg;
use crate::store::PlanType;

fn create_test_codec() -> TokenCodec {
    let settings = cfg::JwtSettings {
        access_token_expiry: 60,
        refresh_token_expiry: 3600,
        location_token_expiry: 30,
        ..Default::default()
    };
    let secrets = TokenSecrets {
        access: "access_secret_key_for_jwt_testing_0001".to_string(),
        refresh: "refresh_secret_key_for_jwt_testing_0002".to_string(),
        location: "location_secret_key_for_jwt_testing_003".to_string(),
    };
    TokenCodec::new(&settings, &secrets)
}

#[test]
fn test_access_token_round_trip() {
    let codec = create_test_codec();

    let token = codec.issue_access_token(456, "acme", PlanType::Paid).unwrap();
    assert_eq!(token.split('.').count(), 3);

    let claims = codec.decode_access_token(&token).unwrap();
    assert_eq!(claims.tenant_id, 456);
    assert_eq!(claims.username, "acme");
    assert_eq!(claims.plan_type, PlanType::Paid);
    assert_eq!(claims.token_type, TokenType::Access);
    assert_eq!(claims.exp - claims.iat, 60);
    assert!(!claims.jti.is_empty());
}

#[test]
fn test_refresh_tokens_are_unique_per_issue() {
    let codec = create_test_codec();

    let first = codec.issue_refresh_token(7).unwrap();
    let second = codec.issue_refresh_token(7).unwrap();
    assert_ne!(first.token, second.token);
    assert_ne!(first.claims.sid, second.claims.sid);

    let claims = codec.decode_refresh_token(&first.token).unwrap();
    assert_eq!(claims.tenant_id, 7);
    assert_eq!(claims.sid, first.claims.sid);
    assert_eq!(claims.token_type, TokenType::Refresh);
}

#[test]
fn test_location_token_round_trip() {
    let codec = create_test_codec();

    let issued = codec.issue_location_token(3, 42, 12.9851, 77.5946).unwrap();
    let claims = codec.decode_location_token(&issued.token).unwrap();

    assert_eq!(claims.tenant_id, 3);
    assert_eq!(claims.employee_id, 42);
    assert!((claims.latitude - 12.9851).abs() < f64::EPSILON);
    assert!((claims.longitude - 77.5946).abs() < f64::EPSILON);
    assert_eq!(claims.token_type, TokenType::Location);
    assert_eq!(claims.exp - claims.iat, 30);
}

#[test]
fn test_tokens_never_verify_as_another_kind() {
    let codec = create_test_codec();

    let access = codec.issue_access_token(1, "acme", PlanType::Free).unwrap();
    let refresh = codec.issue_refresh_token(1).unwrap().token;
    let location = codec.issue_location_token(1, 2, 0.0, 0.0).unwrap().token;

    assert!(matches!(codec.decode_refresh_token(&access), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_location_token(&access), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_access_token(&refresh), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_location_token(&refresh), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_access_token(&location), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_refresh_token(&location), Err(TokenError::InvalidToken)));
}

#[test]
fn test_kind_tag_is_checked_even_with_a_shared_secret() {
    let settings = cfg::JwtSettings::default();
    let shared = "one_secret_shared_by_every_token_kind".to_string();
    let secrets = TokenSecrets {
        access: shared.clone(),
        refresh: shared.clone(),
        location: shared,
    };
    let codec = TokenCodec::new(&settings, &secrets);

    let location = codec.issue_location_token(1, 2, 0.0, 0.0).unwrap().token;
    assert!(matches!(codec.decode_access_token(&location), Err(TokenError::InvalidToken)));
}

#[test]
fn test_expired_location_token_is_rejected() {
    let codec = create_test_codec();
    let now = Utc::now().timestamp();
    let claims = LocationTokenClaims {
        tenant_id: 1,
        employee_id: 2,
        latitude: 0.0,
        longitude: 0.0,
        exp: now - 1,
        iat: now - 301,
        jti: "expired".to_string(),
        token_type: TokenType::Location,
    };
    let token = codec.location.sign(&claims).unwrap();

    assert!(matches!(codec.decode_location_token(&token), Err(TokenError::TokenExpired)));
}

#[test]
fn test_tampered_token_is_rejected() {
    let codec = create_test_codec();
    let token = codec.issue_access_token(1, "acme", PlanType::Free).unwrap();

    let header = jwt::Header::new(jwt::Algorithm::HS256);
    let forged_key = jwt::EncodingKey::from_secret(b"attacker_controlled_secret_value_xx");
    let claims = codec.decode_access_token(&token).unwrap();
    let forged = jwt::encode(&header, &claims, &forged_key).unwrap();

    assert!(matches!(codec.decode_access_token(&forged), Err(TokenError::InvalidToken)));
    assert!(matches!(codec.decode_access_token("not.a.token"), Err(TokenError::InvalidToken)));
}

#[test]
fn test_bearer_token_extraction() {
    let mut headers = HeaderMap::new();
    assert!(matches!(bearer_token(&headers), Err(TokenError::InvalidAuthorizationHeader)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert!(matches!(bearer_token(&headers), Err(TokenError::InvalidAuthorizationHeader)));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
    assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
}

#[test]
fn test_refresh_token_hash_is_deterministic_hex() {
    let hash = hash_refresh_token("some.refresh.token");
    assert_eq!(hash, hash_refresh_token("some.refresh.token"));
    assert_ne!(hash, hash_refresh_token("some.refresh.token2"));
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_short_configured_secrets_fall_back_to_generated_files() {
    let dir = tempfile::tempdir().unwrap();
    let settings = cfg::JwtSettings {
        access_token_secret: "too-short".to_string(),
        refresh_token_secret: "configured_refresh_secret_long_enough_123".to_string(),
        ..Default::default()
    };

    let secrets = TokenSecrets::resolve(&settings, dir.path()).unwrap();
    assert_eq!(secrets.refresh, "configured_refresh_secret_long_enough_123");
    assert_ne!(secrets.access, "too-short");
    assert_ne!(secrets.access, secrets.location);
    assert!(dir.path().join(".access_token_secret").exists());
    assert!(dir.path().join(".location_token_secret").exists());
    assert!(!dir.path().join(".refresh_token_secret").exists());

    // generated secrets are stable across restarts
    let again = TokenSecrets::resolve(&settings, dir.path()).unwrap();
    assert_eq!(secrets.access, again.access);
}
