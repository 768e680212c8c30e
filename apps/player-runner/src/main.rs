//! Headless runner driving the MoQ player core end to end against an
//! in-process fixture transport and passthrough decoders. Useful as a demo
//! loop and as an integration harness for the core/audio crates.

mod audio_router;
mod config;
mod decoders;
mod mock_transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use moq_player_core::bootstrap::PlayerHandle;
use moq_player_core::caption::CaptionObject;
use moq_player_core::catalog::TrackDescriptor;
use moq_player_core::config::PlayerConfig;
use moq_player_core::events::PlayerSink;
use moq_player_core::reconnect::with_reconnect;
use moq_player_core::runtime::TokioSpawner;
use moq_player_core::scheduler::TickOutcome;
use moq_player_core::stats::StatsObject;
use tokio::signal;

use crate::audio_router::HostAudioRouter;
use crate::config::RunnerConfig;
use crate::decoders::PassthroughVideoDecoder;
use crate::mock_transport::FixtureTransport;

const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Headless MoQ player runner.
#[derive(Parser, Debug)]
#[command(name = "player-runner")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MOQ_PLAYER_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// MoQ stream key to join (overrides config file).
    #[arg(short, long, env = "MOQ_PLAYER_STREAM_KEY")]
    stream_key: Option<String>,
}

/// Logs the non-media events a real UI would surface, and stands in for
/// whatever downstream caption/stats rendering the host embeds this player in.
struct LoggingSink;

impl PlayerSink for LoggingSink {
    fn on_track_info(&self, tracks: &[TrackDescriptor]) {
        log::info!("[player] catalog resolved: {} track(s)", tracks.len());
        for track in tracks {
            log::debug!(
                "[player]   track_index={} kind={:?} codec={}",
                track.track_index,
                track.kind,
                track.codec_id
            );
        }
    }

    fn on_video_frame(
        &self,
        _payload: &bytes::Bytes,
        _is_keyframe: bool,
        _pts: i64,
        _group_id: u64,
        _codec_config: Option<&bytes::Bytes>,
    ) {
    }

    fn on_audio_frame(&self, _payload: &bytes::Bytes, _pts: i64, _group_id: u64, _track_index: u32) {}

    fn on_caption_frame(&self, parsed: &CaptionObject, pts: i64) {
        match parsed {
            CaptionObject::Structured { text, .. } => log::info!("[caption@{pts}] {text}"),
            CaptionObject::Legacy { text, .. } => log::info!("[caption@{pts}] {text}"),
        }
    }

    fn on_server_stats(&self, stats: &StatsObject) {
        log::debug!("[player] server stats: {stats:?}");
    }

    fn on_close(&self) {
        log::info!("[player] session closed");
    }

    fn on_error(&self, reason: &str) {
        log::warn!("[player] session error: {reason}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("player-runner v{}", env!("CARGO_PKG_VERSION"));

    let mut config = RunnerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(stream_key) = args.stream_key {
        config.stream_key = stream_key;
    }

    log::info!(
        "Configuration: stream_key={}, product_namespace={}",
        config.stream_key,
        config.product_namespace
    );

    let transport = FixtureTransport;
    let audio_router = Arc::new(HostAudioRouter::new());
    let downstream = Arc::new(LoggingSink);

    let mut shutdown = std::pin::pin!(shutdown_signal());
    'reconnect: loop {
        let handle = tokio::select! {
            handle = connect_with_backoff(&transport, &config.stream_key, &config.product_namespace, &config.player, Arc::clone(&audio_router), Arc::clone(&downstream)) => handle,
            () = &mut shutdown => break 'reconnect,
        };

        log::info!("Connected, session state: {:?}", handle.session_state());

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let start = Instant::now();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if handle.session_state().is_closed() {
                        log::warn!("Session closed, reconnecting...");
                        continue 'reconnect;
                    }
                    let playback_pts = Some(start.elapsed().as_micros() as i64);
                    let (outcome, _tick_stats) = handle.tick(playback_pts, Instant::now());
                    if let TickOutcome::Presented(_frame) = outcome {
                        // A real host would hand this frame to its video sink here.
                    }
                }
                () = &mut shutdown => {
                    log::info!("Shutdown signal received, closing session...");
                    handle.close().await;
                    break 'reconnect;
                }
            }
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Retries [`PlayerHandle::connect`] with jittered exponential backoff,
/// owning the reconnect policy the way a session's caller always must
/// (the session itself only knows how to connect once).
async fn connect_with_backoff(
    transport: &FixtureTransport,
    stream_key: &str,
    product_namespace: &str,
    config: &PlayerConfig,
    audio_router: Arc<HostAudioRouter>,
    downstream: Arc<LoggingSink>,
) -> PlayerHandle {
    with_reconnect(config, "player-runner", || {
        let audio_router = Arc::clone(&audio_router);
        let downstream = Arc::clone(&downstream);
        async {
            PlayerHandle::connect(
                transport,
                stream_key.to_string(),
                product_namespace.to_string(),
                config.clone(),
                Box::new(PassthroughVideoDecoder::new(1280, 720)),
                audio_router,
                downstream,
                TokioSpawner::current(),
            )
            .await
        }
    })
    .await
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
