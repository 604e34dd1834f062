mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use metrics::Metrics;
use sstv_ext::framework::session::Session;
use sstv_ext::instance_directory;

#[derive(Parser, Debug)]
#[command(name = "sstv-ws-demo")]
#[command(about = "Minimal WebSocket host exposing the sstv audio extension over one stream")]
struct Params {
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    #[arg(long = "port", default_value_t = 8090)]
    port: u16,

    /// Sample rate new sessions are configured for.
    #[arg(long = "rate", default_value_t = 11_025)]
    sample_rate: u32,

    /// Name this instance publishes to the instance directory.
    #[arg(long = "shared-state-name", default_value = "sstv-ws-demo")]
    shared_state_name: String,
}

#[derive(Clone)]
struct AppState {
    sample_rate: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    sstv_ext::logging::init();
    let params = Params::parse();

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let pid = std::process::id();
    instance_directory::register(pid, params.host.clone(), params.port, params.shared_state_name.clone());

    let state = AppState {
        sample_rate: params.sample_rate,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/sstv", get(ws_upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "sstv-ws-demo listening");
    axum::serve(listener, app).await.context("server error")?;

    instance_directory::unregister(pid);
    Ok(())
}

async fn root() -> &'static str {
    "sstv-ws-demo: connect to /sstv for a binary-framed SSTV decode stream"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_endpoint() -> impl IntoResponse {
    Metrics::global().render()
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();

    let metrics = Metrics::global();
    metrics.sessions_attached_total.inc();
    metrics.sessions_active.inc();

    let session = match Session::attach("sstv", state.sample_rate, move |frame| {
        let _ = frame_tx.send(frame);
    }) {
        Ok(session) => session,
        Err(err) => {
            warn!(error = %err, "failed to attach sstv session");
            return;
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            Metrics::global().frames_sent_total.inc();
            if ws_tx.send(Message::Binary(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Binary(bytes) => {
                let samples: Vec<i16> = bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect();
                session.feed(samples);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    session.detach().await;
    writer.abort();

    metrics.sessions_active.dec();
}
