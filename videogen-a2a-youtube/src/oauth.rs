//! OAuth credentials for the YouTube Data API.
//!
//! Cached tokens live in a JSON file next to the client secrets. Each run
//! classifies the cache into a [`CredentialState`] and takes the matching
//! path: use it, refresh it, or run the interactive installed-app flow.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;
use videogen_a2a_common::AuthError;
use videogen_a2a_common::auth::scopes;

use crate::callback::{CALLBACK_TIMEOUT, CallbackServer};
use crate::pkce::{PkceCodes, generate_state};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this window count as expired.
pub const EXPIRY_SKEW_MS: u64 = 60_000;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// OAuth client registration from a Google client secrets file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Load an `installed` (or `web`) client from a secrets file.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| AuthError::client_secrets(&display, e.to_string()))?;
        Self::from_json(&content).map_err(|message| AuthError::client_secrets(&display, message))
    }

    fn from_json(content: &str) -> Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client".to_string())
    }
}

/// A cached OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry in milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthTokens {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_ms.saturating_add(EXPIRY_SKEW_MS) >= expires_at,
            None => false,
        }
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

impl TokenResponse {
    fn into_tokens(self, now_ms: u64) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now_ms + secs * 1000),
            scope: self.scope,
        }
    }
}

/// Where cached credentials stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// No cache file, or one that could not be parsed.
    Missing,
    Valid(OAuthTokens),
    Expired { refresh_token: String },
    ExpiredNoRefresh,
}

impl CredentialState {
    pub fn classify(cached: Option<OAuthTokens>, now_ms: u64) -> Self {
        match cached {
            None => CredentialState::Missing,
            Some(tokens) if !tokens.is_expired_at(now_ms) => CredentialState::Valid(tokens),
            Some(OAuthTokens {
                refresh_token: Some(refresh_token),
                ..
            }) => CredentialState::Expired { refresh_token },
            Some(_) => CredentialState::ExpiredNoRefresh,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CredentialState::Missing => "missing",
            CredentialState::Valid(_) => "valid",
            CredentialState::Expired { .. } => "expired",
            CredentialState::ExpiredNoRefresh => "expired-no-refresh",
        }
    }
}

/// JSON token cache, written with owner-only permissions.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache. A missing or unparseable file yields `None`.
    pub fn load(&self) -> Result<Option<OAuthTokens>, AuthError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::token_cache(self.path.display().to_string(), e.to_string())),
        };

        match serde_json::from_str(&content) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    /// Write the cache. The file is created owner-only; an existing file is
    /// narrowed to owner-only before the tokens are written.
    pub fn save(&self, tokens: &OAuthTokens) -> Result<(), AuthError> {
        let to_error = |e: std::io::Error| AuthError::token_cache(self.path.display().to_string(), e.to_string());
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| AuthError::token_cache(self.path.display().to_string(), e.to_string()))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(to_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600)).map_err(to_error)?;
        }

        file.write_all(content.as_bytes()).map_err(to_error)?;
        file.flush().map_err(to_error)?;

        debug!(path = %self.path.display(), "Token cache written");
        Ok(())
    }
}

/// An OAuth authorization server.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Obtain fresh tokens interactively.
    async fn authorize(&self) -> Result<OAuthTokens, AuthError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens, AuthError>;
}

/// Loopback installed-app flow with PKCE.
pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    scopes: Vec<String>,
    http: reqwest::Client,
    timeout: Duration,
    open_browser: bool,
}

impl InstalledAppFlow {
    /// Flow requesting the YouTube upload scope.
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            secrets,
            scopes: vec![scopes::YOUTUBE_UPLOAD.to_string()],
            http: reqwest::Client::new(),
            timeout: CALLBACK_TIMEOUT,
            open_browser: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Authorization URL the user visits.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str, pkce: &PkceCodes) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", self.scopes.join(" ").as_str()),
                ("state", state),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AuthError::authorization_failed(format!("Invalid auth_uri {}: {}", self.secrets.auth_uri, e)))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| format!("Token request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{} - {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse token response: {}", e))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str, pkce: &PkceCodes) -> Result<OAuthTokens, AuthError> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
            ])
            .await
            .map_err(AuthError::authorization_failed)?;
        Ok(response.into_tokens(now_millis()))
    }
}

#[async_trait]
impl OAuthFlow for InstalledAppFlow {
    #[instrument(level = "info", skip(self))]
    async fn authorize(&self) -> Result<OAuthTokens, AuthError> {
        let pkce = PkceCodes::generate();
        let state = generate_state();
        let server = CallbackServer::bind(state.clone()).await?;
        let redirect_uri = server.redirect_uri();
        let url = self.authorization_url(&redirect_uri, &state, &pkce)?;

        eprintln!("Please visit this URL to authorize this application:");
        eprintln!("  {}", url);
        if self.open_browser {
            if let Err(e) = open::that(url.as_str()) {
                warn!(error = %e, "Failed to open browser");
            }
        }

        let callback = server.wait(self.timeout).await?;
        info!("Authorization code received");
        self.exchange_code(&callback.code, &redirect_uri, &pkce).await
    }

    #[instrument(level = "info", skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens, AuthError> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await
            .map_err(AuthError::refresh_failed)?;
        Ok(response.into_tokens(now_millis()))
    }
}

/// Resolves a usable access token from the cache and an OAuth flow.
pub struct CredentialManager {
    cache: TokenCache,
    flow: Box<dyn OAuthFlow>,
}

impl CredentialManager {
    pub fn new(cache: TokenCache, flow: Box<dyn OAuthFlow>) -> Self {
        Self { cache, flow }
    }

    /// A valid access token, refreshing or authorizing as needed.
    ///
    /// New tokens are persisted before they are returned.
    #[instrument(level = "debug", skip(self), fields(cache = %self.cache.path().display()))]
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let state = CredentialState::classify(self.cache.load()?, now_millis());
        debug!(state = state.name(), "Cached credentials classified");

        let tokens = match state {
            CredentialState::Valid(tokens) => return Ok(tokens.access_token),
            CredentialState::Expired { refresh_token } => {
                info!("Refreshing expired access token");
                let mut tokens = self.flow.refresh(&refresh_token).await?;
                if tokens.refresh_token.is_none() {
                    tokens.refresh_token = Some(refresh_token);
                }
                tokens
            }
            CredentialState::Missing | CredentialState::ExpiredNoRefresh => {
                info!("No usable cached credentials, starting authorization");
                self.flow.authorize().await?
            }
        };

        self.cache.save(&tokens)?;
        Ok(tokens.access_token)
    }
}
