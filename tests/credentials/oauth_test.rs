//! Token extraction from credentials and expiry detection.

use std::collections::BTreeMap;

use livechat::credentials::{
    is_token_expired, CredentialError, Credentials, OAuthClientSecrets, OAuthToken,
};

fn credentials(pairs: &[(&str, &str)]) -> Credentials {
    Credentials::from_map(
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn token(access: &str, expires_at: Option<i64>) -> OAuthToken {
    OAuthToken {
        access_token: access.to_owned(),
        refresh_token: None,
        expires_at,
    }
}

#[test]
fn token_reads_all_fields() {
    let creds = credentials(&[
        ("YOUTUBE_ACCESS_TOKEN", "ya29.abc"),
        ("YOUTUBE_REFRESH_TOKEN", "1//refresh"),
        ("YOUTUBE_TOKEN_EXPIRES_AT", "1700000000000"),
    ]);
    let token = OAuthToken::from_credentials(&creds).expect("token should load");
    assert_eq!(token.access_token, "ya29.abc");
    assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
    assert_eq!(token.expires_at, Some(1_700_000_000_000));
}

#[test]
fn refresh_token_alone_is_enough() {
    let creds = credentials(&[("YOUTUBE_REFRESH_TOKEN", "1//refresh")]);
    let token = OAuthToken::from_credentials(&creds).expect("token should load");
    assert!(token.access_token.is_empty());
    assert!(is_token_expired(&token));
}

#[test]
fn no_tokens_is_missing() {
    let err = OAuthToken::from_credentials(&credentials(&[])).expect_err("should fail");
    assert!(matches!(err, CredentialError::Missing(_)));
}

#[test]
fn unparseable_expiry_is_ignored() {
    let creds = credentials(&[
        ("YOUTUBE_ACCESS_TOKEN", "ya29.abc"),
        ("YOUTUBE_TOKEN_EXPIRES_AT", "tomorrow"),
    ]);
    let token = OAuthToken::from_credentials(&creds).expect("token should load");
    assert_eq!(token.expires_at, None);
}

#[test]
fn client_secrets_require_both_values() {
    let creds = credentials(&[("YOUTUBE_CLIENT_ID", "client-1")]);
    let err = OAuthClientSecrets::from_credentials(&creds).expect_err("secret is missing");
    assert!(matches!(err, CredentialError::Missing(key) if key == "YOUTUBE_CLIENT_SECRET"));
}

#[test]
fn expired_for_past_timestamp() {
    assert!(is_token_expired(&token("tok", Some(1_000_000))));
}

#[test]
fn not_expired_for_future_timestamp() {
    assert!(!is_token_expired(&token("tok", Some(i64::MAX))));
}

#[test]
fn expired_within_60s_buffer() {
    let now_ms = chrono::Utc::now().timestamp_millis();
    assert!(is_token_expired(&token("tok", Some(now_ms.saturating_add(30_000)))));
}

#[test]
fn not_expired_when_no_expiry() {
    assert!(!is_token_expired(&token("tok", None)));
}

#[test]
fn debug_output_hides_tokens() {
    let rendered = format!("{:?}", token("ya29.secret", None));
    assert!(!rendered.contains("ya29.secret"));
}
