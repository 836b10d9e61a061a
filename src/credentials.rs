//! Credential loading and the authorized-client provider.
//!
//! Secrets come from `~/.livechat/.env` (must be `0600`):
//! - `YOUTUBE_ACCESS_TOKEN`: OAuth access token
//! - `YOUTUBE_REFRESH_TOKEN`: refresh token, used once the access token expires
//! - `YOUTUBE_TOKEN_EXPIRES_AT`: access token expiry, ms since epoch
//! - `YOUTUBE_CLIENT_ID` / `YOUTUBE_CLIENT_SECRET`: OAuth client for refreshes
//!
//! [`OAuthCredentialProvider`] turns them into one cached
//! [`YouTubeClient`] handle per process.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::feed::ChatGateway;
use crate::youtube::{check_http_response, http_client, YouTubeClient};

/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Env key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "YOUTUBE_ACCESS_TOKEN";
/// Env key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "YOUTUBE_REFRESH_TOKEN";
/// Env key holding the access token expiry in ms since epoch.
pub const EXPIRES_AT_KEY: &str = "YOUTUBE_TOKEN_EXPIRES_AT";
/// Env key holding the OAuth client id.
pub const CLIENT_ID_KEY: &str = "YOUTUBE_CLIENT_ID";
/// Env key holding the OAuth client secret.
pub const CLIENT_SECRET_KEY: &str = "YOUTUBE_CLIENT_SECRET";

/// Tokens expiring within this window are treated as expired.
const EXPIRY_BUFFER_MS: i64 = 60_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from credential loading and token refresh.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// A required credential is not set.
    #[error("missing required credential: {0}")]
    Missing(String),
    /// The token endpoint rejected the refresh or returned garbage.
    #[error("token refresh failed: {0}")]
    Refresh(String),
    /// HTTP transport failure while talking to the token endpoint.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// .env credentials
// ---------------------------------------------------------------------------

/// Runtime credentials loaded from the `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a non-blank credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns a required credential or an error when missing.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] when the key is absent or blank.
    pub fn require(&self, key: &str) -> Result<String, CredentialError> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| CredentialError::Missing(key.to_owned()))
    }
}

/// Load credentials from a specific `.env` path.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    Ok(Credentials { vars })
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// OAuth tokens
// ---------------------------------------------------------------------------

/// An OAuth access token and its refresh material.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthToken {
    /// Sent as `Authorization: Bearer`. May be empty when only a refresh token is known.
    pub access_token: String,
    /// Used to mint a new access token.
    pub refresh_token: Option<String>,
    /// Expiry in milliseconds since epoch. `None` if unknown.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl OAuthToken {
    /// Read the token from loaded credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] when neither an access token nor
    /// a refresh token is configured.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, CredentialError> {
        let access_token = credentials.get(ACCESS_TOKEN_KEY).unwrap_or_default().to_owned();
        let refresh_token = credentials.get(REFRESH_TOKEN_KEY).map(str::to_owned);
        if access_token.is_empty() && refresh_token.is_none() {
            return Err(CredentialError::Missing(format!(
                "{ACCESS_TOKEN_KEY} or {REFRESH_TOKEN_KEY}"
            )));
        }

        let expires_at = credentials.get(EXPIRES_AT_KEY).and_then(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|e| {
                    warn!(key = EXPIRES_AT_KEY, error = %e, "ignoring unparseable token expiry");
                })
                .ok()
        });

        Ok(Self {
            access_token,
            refresh_token,
            expires_at,
        })
    }
}

/// OAuth client registration used for refresh-token grants.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientSecrets {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl OAuthClientSecrets {
    /// Read the client id and secret from loaded credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Missing`] when either value is absent.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, CredentialError> {
        Ok(Self {
            client_id: credentials.require(CLIENT_ID_KEY)?,
            client_secret: credentials.require(CLIENT_SECRET_KEY)?,
        })
    }
}

/// Whether the access token is missing, expired, or expires within 60 s.
///
/// A token without a known expiry is assumed valid.
pub fn is_token_expired(token: &OAuthToken) -> bool {
    if token.access_token.is_empty() {
        return true;
    }
    match token.expires_at {
        Some(exp) => exp <= chrono::Utc::now().timestamp_millis().saturating_add(EXPIRY_BUFFER_MS),
        None => false,
    }
}

/// Token endpoint response for a refresh-token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchange the refresh token for a new access token.
///
/// The returned token keeps the old refresh token unless the endpoint
/// rotated it.
///
/// # Errors
///
/// Returns [`CredentialError::Refresh`] when there is no refresh token or
/// the endpoint rejects the grant, and [`CredentialError::Request`] on
/// transport failure.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    token_url: &str,
    secrets: &OAuthClientSecrets,
    token: &OAuthToken,
) -> Result<OAuthToken, CredentialError> {
    let refresh_token = token
        .refresh_token
        .as_deref()
        .filter(|rt| !rt.is_empty())
        .ok_or_else(|| CredentialError::Refresh("no refresh token available".to_owned()))?;

    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
        ])
        .send()
        .await?;
    let body = check_http_response(response)
        .await
        .map_err(|e| CredentialError::Refresh(e.to_string()))?;
    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| CredentialError::Refresh(e.to_string()))?;
    if parsed.access_token.is_empty() {
        return Err(CredentialError::Refresh(
            "token endpoint returned an empty access token".to_owned(),
        ));
    }

    let expires_at = parsed.expires_in.map(|secs| {
        chrono::Utc::now()
            .timestamp_millis()
            .saturating_add(secs.saturating_mul(1000))
    });
    debug!(?expires_at, "access token refreshed");

    Ok(OAuthToken {
        access_token: parsed.access_token,
        refresh_token: parsed
            .refresh_token
            .filter(|rt| !rt.is_empty())
            .or_else(|| token.refresh_token.clone()),
        expires_at,
    })
}

/// Log a warning if a token expires soon.
fn check_token_expiry(token: &OAuthToken) {
    if let Some(exp) = token.expires_at {
        let now_ms = chrono::Utc::now().timestamp_millis();
        if exp <= now_ms.saturating_add(300_000) {
            warn!(
                expires_at = exp,
                "YouTube access token expires within 5 minutes; long sessions may fail"
            );
        } else {
            debug!(expires_at = exp, "YouTube access token valid");
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Supplies the authorized client handle the engine polls and posts with.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return an authorized client, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when credentials are missing or a token
    /// refresh fails.
    async fn authorized_client(&self) -> Result<Arc<dyn ChatGateway>, CredentialError>;
}

/// [`CredentialProvider`] backed by `.env` OAuth tokens.
///
/// Refreshes an expired access token once, then caches the client.
pub struct OAuthCredentialProvider {
    credentials: Credentials,
    api: ApiConfig,
    http: reqwest::Client,
    cached: Mutex<Option<Arc<dyn ChatGateway>>>,
}

impl OAuthCredentialProvider {
    /// Create a provider for the given credentials and API settings.
    pub fn new(credentials: Credentials, api: ApiConfig) -> Self {
        let http = http_client(
            Duration::from_secs(api.connect_timeout_secs),
            Duration::from_secs(api.request_timeout_secs),
        );
        Self {
            credentials,
            api,
            http,
            cached: Mutex::new(None),
        }
    }

    async fn current_token(&self) -> Result<OAuthToken, CredentialError> {
        let token = OAuthToken::from_credentials(&self.credentials)?;
        if !is_token_expired(&token) {
            return Ok(token);
        }

        info!("YouTube access token missing or expired, refreshing");
        let secrets = OAuthClientSecrets::from_credentials(&self.credentials)?;
        refresh_access_token(&self.http, &self.api.token_url, &secrets, &token).await
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn authorized_client(&self) -> Result<Arc<dyn ChatGateway>, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some(client) = cached.as_ref() {
            return Ok(Arc::clone(client));
        }

        let token = self.current_token().await?;
        check_token_expiry(&token);

        let client: Arc<dyn ChatGateway> =
            Arc::new(YouTubeClient::from_config(&self.api, token.access_token));
        *cached = Some(Arc::clone(&client));
        Ok(client)
    }
}
