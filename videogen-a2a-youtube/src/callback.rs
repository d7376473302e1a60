//! Loopback redirect receiver for the installed-app OAuth flow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;
use videogen_a2a_common::AuthError;

/// How long to wait for the user to finish in the browser.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Authorized</title></head>\
<body style=\"font-family: system-ui, sans-serif; text-align: center; padding: 50px\">\
<h1>Authorization complete</h1><p>You can close this tab.</p></body></html>";

/// Authorization code delivered to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: String,
}

type Delivery = Arc<Mutex<Option<oneshot::Sender<Result<CallbackResult, AuthError>>>>>;

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    delivery: Delivery,
}

/// Listens on `127.0.0.1:<ephemeral port>` for a single redirect.
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
    expected_state: String,
}

impl CallbackServer {
    pub async fn bind(expected_state: impl Into<String>) -> Result<Self, AuthError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AuthError::authorization_failed(format!("Failed to start callback listener: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::authorization_failed(format!("Failed to read callback address: {}", e)))?
            .port();

        Ok(Self {
            listener,
            port,
            expected_state: expected_state.into(),
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Serve until the first redirect arrives or `timeout` elapses.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackResult, AuthError> {
        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            expected_state: Arc::from(self.expected_state.as_str()),
            delivery: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new().route("/", get(receive)).with_state(state);

        let (stop, shutdown) = oneshot::channel::<()>();
        let listener = self.listener;
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, rx).await;
        let _ = stop.send(());
        let _ = server.await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::authorization_failed("Callback listener stopped unexpectedly")),
            Err(_) => Err(AuthError::authorization_failed(format!(
                "Timed out after {}s waiting for authorization",
                timeout.as_secs()
            ))),
        }
    }
}

async fn receive(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let result = parse_callback(&params, &state.expected_state);
    let response = match &result {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE.to_string())),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(format!(
                "<!DOCTYPE html><html><body><h1>Authorization failed</h1><p>{}</p></body></html>",
                html_escape(&e.to_string())
            )),
        ),
    };

    let sender = state.delivery.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => debug!("Ignoring repeated OAuth callback"),
    }
    response
}

/// Validate the redirect query.
pub fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Result<CallbackResult, AuthError> {
    if let Some(error) = params.get("error") {
        let description = params.get("error_description").map(String::as_str).unwrap_or_default();
        return Err(AuthError::authorization_failed(format!("{} {}", error, description).trim_end().to_string()));
    }

    let state = params
        .get("state")
        .ok_or_else(|| AuthError::authorization_failed("Missing state parameter"))?;
    if state != expected_state {
        return Err(AuthError::authorization_failed("State mismatch in OAuth callback"));
    }

    let code = params
        .get("code")
        .ok_or_else(|| AuthError::authorization_failed("Missing authorization code"))?;

    Ok(CallbackResult {
        code: code.clone(),
        state: state.clone(),
    })
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
