use std::{env, sync::Arc};

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use channel_core::{ChannelSubscription, ChatRouting, DashboardRouting, FrameRouting};
use channel_ws::{ChannelClient, ChannelClientConfig, StaticCredentialProvider, WsTransport};

const DEFAULT_FILTER: &str = "info,channel_ws=debug";

/// Initialize the global tracing subscriber with severity gating from the
/// environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `CHANNEL_SMOKE_LOG`
/// 3) internal default filter
fn init_tracing() {
    let env_filter = filter_from_env();
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(filter) = env::var("CHANNEL_SMOKE_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}

#[tokio::main]
async fn main() {
    init_tracing();

    let endpoint = env::var("CHANNEL_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:8000/api/chat/ws".to_owned());
    let channel_key = env::var("CHANNEL_KEY").unwrap_or_else(|_| "1".to_owned());
    let token = match env::var("CHANNEL_TOKEN") {
        Ok(token) => token,
        Err(_) => {
            eprintln!("CHANNEL_TOKEN must be set to a bearer token");
            std::process::exit(1);
        }
    };

    let routing: Arc<dyn FrameRouting> = if channel_key == "dashboard" {
        Arc::new(DashboardRouting)
    } else {
        Arc::new(ChatRouting)
    };

    let client = ChannelClient::new(
        WsTransport,
        ChannelClientConfig::new(endpoint),
        Arc::new(StaticCredentialProvider::new(token)),
        routing,
    );

    let mut state = client.state();
    let mut events = client.events();

    if let Err(err) = client.connect(ChannelSubscription::new(channel_key)).await {
        eprintln!("initial connect failed: {err}");
    }

    println!("watching channel; Ctrl-C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => match changed {
                Ok(()) => println!("state: {:?}", *state.borrow()),
                Err(_) => break,
            },
            event = events.recv() => match event {
                Ok(event) => println!("event: {event:?}"),
                Err(RecvError::Lagged(skipped)) => println!("observer lagged; skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.disconnect().await;
    println!("final history: {} messages", client.snapshot().len());
}
