//! Streamline command-line client.
//!
//! Connects to a realtime server, joins streams, logs everything that
//! happens, and posts each stdin line as a chat message to the first stream.
//!
//! # Usage
//!
//! ```bash
//! # Watch two streams as `alice`
//! STREAMLINE_TOKEN=secret streamline --server 127.0.0.1:4433 --user alice \
//!     --stream s1 --stream s2
//! ```

use clap::Parser;
use streamline_client::{
    ClientConfig, ClientEvent, Notification, Runtime, RuntimeHandle, Subscription, SystemEnv,
    transport::QuicTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Streamline realtime client
#[derive(Parser, Debug)]
#[command(name = "streamline")]
#[command(about = "Streamline live-stream chat client")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:4433")]
    server: String,

    /// TLS server name
    #[arg(long, default_value = "localhost")]
    server_name: String,

    /// Session credential
    #[arg(short, long, env = "STREAMLINE_TOKEN", hide_env_values = true)]
    token: String,

    /// Signed-in user id; without it the client is read-only
    #[arg(short, long)]
    user: Option<String>,

    /// Stream to join (repeatable)
    #[arg(long = "stream")]
    streams: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Streamline client starting");
    tracing::warn!("Server certificates are not verified");

    let transport = QuicTransport::new(&args.server).with_server_name(&args.server_name);
    let (mut runtime, handle) =
        Runtime::new(transport, SystemEnv::new(), ClientConfig::default());
    let notifications = handle.subscribe();
    let driver = tokio::spawn(async move { runtime.run().await });
    let logger = tokio::spawn(log_notifications(notifications));

    if args.user.is_some() {
        handle.send(ClientEvent::IdentityChanged(args.user.clone())).await?;
    }
    for stream_id in &args.streams {
        handle.join_stream(stream_id.as_str()).await?;
    }
    handle.connect(args.token).await?;

    tokio::select! {
        result = forward_stdin(&handle, args.streams.first().cloned()) => result?,
        result = tokio::signal::ctrl_c() => result?,
    }

    tracing::info!("Shutting down");
    handle.shutdown().await?;
    driver.await?;
    logger.abort();

    Ok(())
}

/// Post each stdin line to `stream_id` until EOF.
async fn forward_stdin(
    handle: &RuntimeHandle,
    stream_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match &stream_id {
            Some(stream_id) => handle.send_message(stream_id.as_str(), line).await?,
            None => tracing::warn!("no stream joined, message dropped"),
        }
    }

    Ok(())
}

async fn log_notifications(mut notifications: Subscription) {
    while let Some(notification) = notifications.recv().await {
        match notification {
            Notification::ConnectionChanged { from, to } => {
                tracing::info!(?from, ?to, "connection state changed");
            },
            Notification::ConnectionFailed(error) => {
                tracing::error!(%error, "connection failed");
            },
            Notification::RateLimited(warning) => {
                tracing::warn!(message = %warning.message, retry_after = ?warning.retry_after, "rate limited");
            },
            Notification::ChatMessage { stream_id, message, unread } => {
                tracing::info!(
                    stream = %stream_id,
                    user = %message.user_id,
                    unread,
                    "{}",
                    message.content
                );
            },
            Notification::ViewerCount { stream_id, count } => {
                tracing::info!(stream = %stream_id, count, "viewers");
            },
            Notification::Rejected(error) => tracing::warn!(%error, "rejected"),
            other => tracing::debug!(?other, "notification"),
        }
    }
}
