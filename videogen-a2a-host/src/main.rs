//! VideoGen A2A Host
//!
//! Generates a batch of videos through an A2A agent and uploads each result
//! to YouTube.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::oneshot;
use videogen_a2a_common::tracing::init_tracing;
use videogen_a2a_host::client::{build_http_client, resolve_agent_card};
use videogen_a2a_host::push::{PushListener, notification_config};
use videogen_a2a_host::{
    A2aClient, AgentTransport, Args, BatchRunner, DriverOptions, HostConfig, ProcessHandoff, StdinPrompt, TaskDriver,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    let config = HostConfig::from_args(args)?;

    let header_names: Vec<&str> = config.headers.keys().map(|k| k.as_str()).collect();
    println!("Will use headers: {:?}", header_names);

    let http = build_http_client(config.headers.clone())?;
    let card = resolve_agent_card(&http, &config.agent_url).await?;
    println!("======= Agent Card ========");
    println!("{}", serde_json::to_string(&card)?);

    let mut listener = None;
    let mut push_notification = None;
    if let Some(receiver) = &config.push_receiver {
        let bound = PushListener::bind(&receiver.host, receiver.port).await?;
        let (stop, shutdown) = oneshot::channel();
        listener = Some((stop, bound.spawn(shutdown)));
        push_notification = Some(notification_config(&receiver.host, receiver.port));
    }

    let client: Arc<dyn AgentTransport> = Arc::new(A2aClient::from_card(http, &card, &config.agent_url));
    let driver = TaskDriver::new(
        client.clone(),
        Arc::new(ProcessHandoff::new(config.uploader.clone())),
        Arc::new(StdinPrompt),
        DriverOptions {
            streaming: card.capabilities.streaming,
            push_notification,
            max_input_rounds: config.max_input_rounds,
        },
    );

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    tracing::info!(
        context_id = %config.context_id,
        agent = %config.agent_url,
        streaming = card.capabilities.streaming,
        "Starting batch"
    );
    let report = BatchRunner::new(driver, client, config.batch.clone(), rng)
        .run(&config.context_id)
        .await;

    let failed_uploads = report.uploads.iter().filter(|u| !u.succeeded()).count();
    tracing::info!(
        exchanges = report.exchanges.len(),
        uploads = report.uploads.len(),
        failed_uploads,
        stopped_early = report.stopped_early,
        "Batch finished"
    );

    if let Some((stop, server)) = listener {
        let _ = stop.send(());
        server.await??;
    }

    Ok(())
}
