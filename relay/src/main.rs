//! Cube Relay - smart-cube notification decoder and move broadcaster

mod broadcast;
mod config;
mod output;
mod session;
mod transport;

use anyhow::{Context, Result};
use broadcast::ClientRegistry;
use clap::Parser;
use output::{ConsoleDisplay, EventSink};
use protocol::crypto::CubeCipher;
use protocol::packets::{self, ParsedEvent};
use session::SessionProcessor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use transport::ReplayTransport;

#[derive(Parser, Debug)]
#[command(author = "Florian Schüller <schuellerf@gmail.com>")]
#[command(version)]
#[command(about = "Cube relay - decode smart-cube notifications and broadcast moves", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "relay.conf")]
    config: PathBuf,

    /// Replay a hex capture of encrypted notifications (overrides [replay].path)
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Decode a single hex-encoded encrypted notification and exit
    #[arg(long, value_name = "HEX")]
    decode: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting Cube relay v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;
    let cipher = CubeCipher::new(&config.cipher_key()?);

    if let Some(hex) = &args.decode {
        return run_decode(&cipher, hex);
    }

    run_relay(config, cipher, args.replay).await
}

/// Print what a single notification decodes to
fn run_decode(cipher: &CubeCipher, hex_str: &str) -> Result<()> {
    let raw = hex::decode(hex_str.trim()).context("Notification is not valid hex")?;
    let decrypted = cipher.decrypt(&raw).context("Notification cannot be decrypted")?;
    println!("decrypted: {}", hex::encode(&decrypted));

    let event = packets::parse(&decrypted);
    if event == ParsedEvent::Unrecognized {
        if let Err(e) = packets::check_header(&decrypted) {
            println!("rejected:  {}", e);
        }
    } else {
        println!("checksum:  {}", if packets::verify_checksum(&decrypted) { "ok" } else { "mismatch" });
    }
    println!("event:     {:?}", event);

    match event.turn() {
        Ok(Some(turn)) => println!("move:      {}", turn),
        Ok(None) => {}
        Err(e) => println!("move:      {}", e),
    }
    if event.needs_ack() {
        let ack = packets::build_encrypted_ack(cipher, &decrypted)?;
        println!("ack:       {}", hex::encode(ack));
    }
    Ok(())
}

async fn run_relay(config: config::Config, cipher: CubeCipher, replay: Option<PathBuf>) -> Result<()> {
    let mac = config.mac_address()?;

    let replay_path = replay
        .or_else(|| config.replay.path.clone())
        .context("No cube link available: pass --replay or set [replay].path")?;
    let transport = Arc::new(
        ReplayTransport::from_file(&replay_path, Duration::from_millis(config.replay.interval_ms))
            .with_context(|| format!("Failed to load capture {:?}", replay_path))?,
    );
    info!(
        "Loaded {} notifications from {:?}",
        transport.notification_count(),
        replay_path
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(ConsoleDisplay)];
    let server = if config.websocket.enabled {
        let registry = Arc::new(ClientRegistry::new(config.websocket.format));
        sinks.push(registry.clone());

        let addr = config.websocket_addr();
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            broadcast::run_server(&addr, registry, shutdown).await
        }))
    } else {
        None
    };

    // Ctrl+C requests a clean shutdown
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = signal_tx.send(true);
        }
    });

    info!("Cube {} (press Ctrl+C to stop)", mac);
    let mut session = SessionProcessor::new(transport.clone(), cipher, mac, sinks);
    let outcome = session.run(shutdown_rx).await;
    info!(
        "Session ended in phase {:?} after {} frames written",
        session.phase(),
        transport.writes()
    );

    let _ = shutdown_tx.send(true);
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("WebSocket server: {:#}", e),
            Err(e) => error!("WebSocket server task failed: {}", e),
        }
    }

    outcome.context("Cube session failed")
}
