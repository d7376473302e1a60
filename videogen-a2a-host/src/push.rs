//! Push-notification listener.
//!
//! When push notifications are enabled the agent POSTs task updates to
//! `http://<host>:<port>/notify`. Before registering the URL it may probe it
//! with `GET /notify?validationToken=<token>`, which must echo the token.
//!
//! Notifications are not authenticated: the listener does not fetch the
//! agent's `/.well-known/jwks.json` or check the bearer JWT, it logs any
//! JSON body it receives. Bind it only on a trusted interface.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{PushNotificationAuthenticationInfo, PushNotificationConfig};

/// Path notifications are delivered to.
pub const NOTIFY_PATH: &str = "/notify";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Failed to bind push listener to {addr}: {message}")]
    BindFailed { addr: String, message: String },

    #[error("Push listener failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// The push configuration sent with every message.
pub fn notification_config(host: &str, port: u16) -> PushNotificationConfig {
    PushNotificationConfig {
        url: format!("http://{}:{}{}", host, port, NOTIFY_PATH),
        token: None,
        authentication: Some(PushNotificationAuthenticationInfo {
            schemes: vec!["bearer".to_string()],
            credentials: None,
        }),
    }
}

/// Routes served by the listener.
pub fn router() -> Router {
    Router::new().route(NOTIFY_PATH, get(validate).post(notify))
}

async fn validate(Query(query): Query<HashMap<String, String>>) -> (StatusCode, String) {
    match query.get("validationToken") {
        Some(token) => {
            debug!("Push notification URL validated");
            (StatusCode::OK, token.clone())
        }
        None => (StatusCode::BAD_REQUEST, "missing validationToken".to_string()),
    }
}

async fn notify(body: String) -> StatusCode {
    match serde_json::from_str::<Value>(&body) {
        Ok(payload) => {
            println!("\npush notification received => {}", payload);
            StatusCode::OK
        }
        Err(e) => {
            warn!(error = %e, "Ignoring malformed push notification");
            StatusCode::BAD_REQUEST
        }
    }
}

/// A bound, not yet serving, listener.
pub struct PushListener {
    listener: TcpListener,
}

impl PushListener {
    pub async fn bind(host: &str, port: u16) -> Result<Self, PushError> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| PushError::BindFailed {
            addr: addr.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PushError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve on a background task until `shutdown` fires or its sender is dropped.
    pub fn spawn(self, shutdown: oneshot::Receiver<()>) -> JoinHandle<Result<(), PushError>> {
        tokio::spawn(async move {
            if let Ok(addr) = self.listener.local_addr() {
                info!(addr = %addr, "Push notification listener started");
            }
            axum::serve(self.listener, router())
                .with_graceful_shutdown(async {
                    let _ = shutdown.await;
                })
                .await?;
            info!("Push notification listener stopped");
            Ok(())
        })
    }
}
