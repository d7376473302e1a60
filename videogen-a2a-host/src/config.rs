//! Command-line configuration for the host.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;
use videogen_a2a_common::ConfigError;

use crate::batch::{BatchOptions, DEFAULT_ITERATIONS};
use crate::driver::DEFAULT_MAX_INPUT_ROUNDS;
use crate::handoff::DEFAULT_UPLOADER;
use crate::protocol::ContextId;

pub const DEFAULT_AGENT_URL: &str = "http://localhost:10000";
pub const DEFAULT_PUSH_RECEIVER: &str = "http://localhost:5000";

/// Command-line arguments for the host.
#[derive(Parser, Debug, Clone)]
#[command(name = "videogen-a2a-host")]
#[command(about = "Drive an A2A video agent and upload the generated videos to YouTube")]
pub struct Args {
    /// Base URL of the agent
    #[arg(long, env = "A2A_AGENT_URL", default_value = DEFAULT_AGENT_URL)]
    pub agent: String,

    /// Context id for the run; a random one is generated when empty or 0
    #[arg(long, env = "A2A_SESSION")]
    pub session: Option<String>,

    /// Print the task history after each exchange
    #[arg(long)]
    pub history: bool,

    /// Ask the agent to push task updates to a local listener
    #[arg(long)]
    pub use_push_notifications: bool,

    /// Address of the push-notification listener
    #[arg(long, default_value = DEFAULT_PUSH_RECEIVER)]
    pub push_notification_receiver: String,

    /// Extra request header, repeatable
    #[arg(long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,

    /// Number of videos to generate
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u32,

    /// Seconds to wait between two videos
    #[arg(long, default_value_t = 60)]
    pub delay_secs: u64,

    /// Follow-up rounds allowed while a task requires input
    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_ROUNDS)]
    pub max_input_rounds: u32,

    /// Uploader executable
    #[arg(long, env = "VIDEOGEN_UPLOADER", default_value = DEFAULT_UPLOADER)]
    pub uploader: PathBuf,

    /// Seed for the scene generator
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Host and port of the push-notification listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceiver {
    pub host: String,
    pub port: u16,
}

impl PushReceiver {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw)
            .map_err(|e| ConfigError::invalid_value("push-notification-receiver", format!("{}: {}", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::invalid_value("push-notification-receiver", format!("{} has no host", raw)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::invalid_value("push-notification-receiver", format!("{} has no port", raw)))?;
        Ok(Self { host, port })
    }
}

/// Validated host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub agent_url: String,
    pub context_id: ContextId,
    pub headers: HeaderMap,
    /// Set when push notifications are enabled.
    pub push_receiver: Option<PushReceiver>,
    pub batch: BatchOptions,
    pub max_input_rounds: u32,
    pub uploader: PathBuf,
    pub seed: Option<u64>,
}

impl HostConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let push_receiver = if args.use_push_notifications {
            Some(PushReceiver::parse(&args.push_notification_receiver)?)
        } else {
            None
        };

        Ok(Self {
            agent_url: args.agent.trim_end_matches('/').to_string(),
            context_id: context_from_session(args.session.as_deref()),
            headers: parse_headers(&args.headers)?,
            push_receiver,
            batch: BatchOptions {
                iterations: args.iterations,
                delay: Duration::from_secs(args.delay_secs),
                history: args.history,
            },
            max_input_rounds: args.max_input_rounds,
            uploader: args.uploader,
            seed: args.seed,
        })
    }
}

/// Use the session as the context id unless it is empty or `0`.
pub fn context_from_session(session: Option<&str>) -> ContextId {
    match session.map(str::trim) {
        Some(s) if !s.is_empty() && s != "0" => ContextId::new(s),
        _ => ContextId::generate(),
    }
}

/// Parse `key=value` pairs into request headers.
pub fn parse_headers(raw: &[String]) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::invalid_value("header", format!("expected KEY=VALUE, got {:?}", pair)))?;
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|e| ConfigError::invalid_value("header", format!("{:?}: {}", key, e)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| ConfigError::invalid_value("header", format!("{:?}: {}", value, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
