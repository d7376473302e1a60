//! Tests for the credential state machine and token cache.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use videogen_a2a_common::AuthError;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::oauth::*;

fn tokens(access: &str, refresh: Option<&str>, expires_at: Option<u64>) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at,
        scope: None,
    }
}

#[derive(Default)]
struct Calls {
    authorize: usize,
    refresh: Vec<String>,
}

/// Flow that hands out canned tokens and records what was asked of it.
struct FakeFlow {
    calls: Arc<Mutex<Calls>>,
    refreshed: OAuthTokens,
    fail_refresh: bool,
}

impl FakeFlow {
    fn new(refreshed: OAuthTokens) -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        (
            Self {
                calls: calls.clone(),
                refreshed,
                fail_refresh: false,
            },
            calls,
        )
    }
}

#[async_trait]
impl OAuthFlow for FakeFlow {
    async fn authorize(&self) -> Result<OAuthTokens, AuthError> {
        self.calls.lock().unwrap().authorize += 1;
        Ok(tokens("authorized", Some("new-refresh"), Some(now_millis() + 3_600_000)))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens, AuthError> {
        self.calls.lock().unwrap().refresh.push(refresh_token.to_string());
        if self.fail_refresh {
            return Err(AuthError::refresh_failed("invalid_grant"));
        }
        Ok(self.refreshed.clone())
    }
}

fn cache_in(dir: &TempDir) -> TokenCache {
    TokenCache::new(dir.path().join("token.json"))
}

#[test]
fn classify_cached_tokens() {
    let now = 1_000_000_000;
    assert_eq!(CredentialState::classify(None, now), CredentialState::Missing);

    let fresh = tokens("a", Some("r"), Some(now + 3_600_000));
    assert_eq!(CredentialState::classify(Some(fresh.clone()), now), CredentialState::Valid(fresh));

    let no_expiry = tokens("a", None, None);
    assert!(matches!(CredentialState::classify(Some(no_expiry), now), CredentialState::Valid(_)));

    let expired = tokens("a", Some("r"), Some(now - 1));
    assert_eq!(
        CredentialState::classify(Some(expired), now),
        CredentialState::Expired {
            refresh_token: "r".to_string()
        }
    );

    let expired_no_refresh = tokens("a", None, Some(now - 1));
    assert_eq!(
        CredentialState::classify(Some(expired_no_refresh), now),
        CredentialState::ExpiredNoRefresh
    );
}

#[test]
fn tokens_inside_skew_window_count_as_expired() {
    let now = 1_000_000_000;
    let almost = tokens("a", Some("r"), Some(now + EXPIRY_SKEW_MS / 2));
    assert!(almost.is_expired_at(now));
    let later = tokens("a", Some("r"), Some(now + EXPIRY_SKEW_MS * 2));
    assert!(!later.is_expired_at(now));
}

#[test]
fn cache_round_trip_and_permissions() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    assert_eq!(cache.load().unwrap(), None);

    let saved = tokens("a", Some("r"), Some(42));
    cache.save(&saved).unwrap();
    assert_eq!(cache.load().unwrap(), Some(saved));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[cfg(unix)]
#[test]
fn save_narrows_existing_file_to_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    std::fs::write(cache.path(), "{}").unwrap();
    std::fs::set_permissions(cache.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

    cache.save(&tokens("a", None, None)).unwrap();

    let mode = std::fs::metadata(cache.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(cache.load().unwrap().unwrap().access_token, "a");
}

#[test]
fn corrupt_cache_is_treated_as_missing() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    std::fs::write(cache.path(), "not json").unwrap();
    assert_eq!(cache.load().unwrap(), None);
}

#[tokio::test]
async fn valid_cache_skips_the_flow() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.save(&tokens("cached", Some("r"), Some(now_millis() + 3_600_000))).unwrap();

    let (flow, calls) = FakeFlow::new(tokens("unused", None, None));
    let manager = CredentialManager::new(cache, Box::new(flow));

    assert_eq!(manager.access_token().await.unwrap(), "cached");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.authorize, 0);
    assert!(calls.refresh.is_empty());
}

#[tokio::test]
async fn expired_cache_is_refreshed_and_keeps_refresh_token() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.save(&tokens("stale", Some("keep-me"), Some(1))).unwrap();

    let (flow, calls) = FakeFlow::new(tokens("refreshed", None, Some(now_millis() + 3_600_000)));
    let manager = CredentialManager::new(cache.clone(), Box::new(flow));

    assert_eq!(manager.access_token().await.unwrap(), "refreshed");
    assert_eq!(calls.lock().unwrap().refresh, vec!["keep-me".to_string()]);

    let persisted = cache.load().unwrap().unwrap();
    assert_eq!(persisted.access_token, "refreshed");
    assert_eq!(persisted.refresh_token.as_deref(), Some("keep-me"));
}

#[tokio::test]
async fn missing_cache_runs_authorization_and_persists() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);

    let (flow, calls) = FakeFlow::new(tokens("unused", None, None));
    let manager = CredentialManager::new(cache.clone(), Box::new(flow));

    assert_eq!(manager.access_token().await.unwrap(), "authorized");
    assert_eq!(calls.lock().unwrap().authorize, 1);
    assert_eq!(cache.load().unwrap().unwrap().access_token, "authorized");
}

#[tokio::test]
async fn expired_without_refresh_token_reauthorizes() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.save(&tokens("stale", None, Some(1))).unwrap();

    let (flow, calls) = FakeFlow::new(tokens("unused", None, None));
    let manager = CredentialManager::new(cache, Box::new(flow));

    assert_eq!(manager.access_token().await.unwrap(), "authorized");
    let calls = calls.lock().unwrap();
    assert_eq!(calls.authorize, 1);
    assert!(calls.refresh.is_empty());
}

#[tokio::test]
async fn failed_refresh_propagates_and_leaves_cache() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    let stale = tokens("stale", Some("r"), Some(1));
    cache.save(&stale).unwrap();

    let (mut flow, _) = FakeFlow::new(tokens("unused", None, None));
    flow.fail_refresh = true;
    let manager = CredentialManager::new(cache.clone(), Box::new(flow));

    let err = manager.access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(_)));
    assert_eq!(cache.load().unwrap(), Some(stale));
}

fn secrets_for(server: &MockServer) -> ClientSecrets {
    ClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        auth_uri: DEFAULT_AUTH_URI.to_string(),
        token_uri: format!("{}/token", server.uri()),
    }
}

#[tokio::test]
async fn installed_flow_refresh_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r-123"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = now_millis();
    let refreshed = InstalledAppFlow::new(secrets_for(&server)).refresh("r-123").await.unwrap();

    assert_eq!(refreshed.access_token, "fresh");
    assert_eq!(refreshed.refresh_token, None);
    let expires_at = refreshed.expires_at.unwrap();
    assert!(expires_at >= before + 3_599_000);
}

#[tokio::test]
async fn installed_flow_refresh_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let err = InstalledAppFlow::new(secrets_for(&server)).refresh("r").await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(ref m) if m.contains("invalid_grant")));
}

#[test]
fn client_secrets_load_reports_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("credentials.json");
    let err = ClientSecrets::load(&missing).unwrap_err();
    assert!(err.to_string().contains("credentials.json"));

    std::fs::write(&missing, r#"{"installed":{"client_id":"abc","client_secret":"s"}}"#).unwrap();
    assert_eq!(ClientSecrets::load(&missing).unwrap().client_id, "abc");
}
