use clap::Parser;
use tokio::sync::mpsc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use playsync_relayd::net::tls::{install_crypto_provider, load_tls_acceptor};
use playsync_relayd::{LivenessConfig, run_relay};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Playback sync relay server
#[derive(Parser, Debug)]
#[command(name = "playsync-relayd")]
#[command(about = "WebSocket relay for shared playback sync rooms", long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Liveness sweep interval in seconds (0 disables the sweep)
    #[arg(long, default_value_t = 30)]
    liveness_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Inbound event queue capacity
    #[arg(long, default_value_t = 1024)]
    queue_capacity: usize,

    /// PEM certificate chain; enables wss (requires --tls-key)
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key; enables wss (requires --tls-cert)
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Clients embedded in https pages can only reach the relay over wss.
    let tls_acceptor = match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => {
            install_crypto_provider();
            Some(load_tls_acceptor(cert, key)?)
        }
        _ => None,
    };
    let scheme = if tls_acceptor.is_some() { "wss" } else { "ws" };

    // Network layer -> server loop events.
    let (tx, rx) = mpsc::channel(args.queue_capacity);

    let bind_addr: SocketAddr = args.bind.parse()?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tokio::spawn(async move {
        let _ = playsync_relayd::net::ws::run_ws_listener(listener, tx, tls_acceptor).await;
    });

    let liveness = (args.liveness_interval_secs > 0).then(|| LivenessConfig {
        sweep_interval: Duration::from_secs(args.liveness_interval_secs),
    });

    info!("sync relay listening on {}://{}", scheme, args.bind);
    info!("log level: {}", args.log_level);

    run_relay(rx, liveness).await
}
