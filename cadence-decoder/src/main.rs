//! Decoder service (cadence-decoder) - Main entry point
//!
//! Decodes the given songs one after another. A playback task drains the
//! chunk pipe (standing in for the output stage), and the main task drives
//! the decoder through its controller API: start, optional seek, wait for
//! the session to finish, stop on Ctrl+C, quit on exit.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_common::{CadenceConfig, Song, TagKind};
use cadence_decoder::audio::{MusicBuffer, MusicPipe};
use cadence_decoder::{DecodeState, DecoderControl, DecoderWorker};
use clap::Parser;
use tokio::sync::Notify;
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Poll interval used when no wakeup arrives
const WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Command-line arguments for cadence-decoder
#[derive(Parser, Debug)]
#[command(name = "cadence-decoder")]
#[command(about = "Decode songs through the cadence decoder core")]
#[command(version)]
struct Args {
    /// Configuration file (overrides CADENCE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder for relative song paths (overrides the configuration file)
    #[arg(short, long, env = "CADENCE_MUSIC_DIR")]
    music_dir: Option<PathBuf>,

    /// Seek to this position (seconds) once a song is decoding
    #[arg(short, long)]
    seek: Option<f64>,

    /// Songs to decode: local paths or URIs
    #[arg(required = true)]
    uris: Vec<String>,
}

/// State shared between the main task and the playback task
struct Playback {
    control: Arc<DecoderControl>,
    buffer: Arc<MusicBuffer>,
    pipe: Arc<MusicPipe>,
    wake: Arc<Notify>,
    frames: AtomicU64,
    running: AtomicBool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_decoder=debug,cadence_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting cadence-decoder (git {}, {} build)",
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    let mut config =
        CadenceConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(music_dir) = args.music_dir {
        config.music_directory = Some(music_dir);
    }
    if let Some(dir) = &config.music_directory {
        info!("Music directory: {}", dir.display());
    }

    let wake = Arc::new(Notify::new());
    let control = {
        let wake = Arc::clone(&wake);
        Arc::new(DecoderControl::with_player_signal(move || wake.notify_one()))
    };
    DecoderWorker::from_config(&config)
        .spawn(&control)
        .context("Failed to spawn decoder thread")?;

    let playback = Arc::new(Playback {
        control: Arc::clone(&control),
        buffer: Arc::new(MusicBuffer::from_config(&config.decoder)),
        pipe: Arc::new(MusicPipe::new()),
        wake,
        frames: AtomicU64::new(0),
        running: AtomicBool::new(true),
    });
    let player = tokio::spawn(play(Arc::clone(&playback)));

    let mut failures = 0;
    for uri in &args.uris {
        match decode_song(&playback, uri, args.seek).await? {
            SongResult::Finished => {}
            SongResult::Failed => failures += 1,
            SongResult::Interrupted => {
                warn!("Interrupted, skipping remaining songs");
                break;
            }
        }
    }

    playback.running.store(false, Ordering::SeqCst);
    playback.wake.notify_one();
    player.await.context("Playback task failed")?;

    let quit_control = Arc::clone(&control);
    spawn_blocking(move || quit_control.quit())
        .await
        .context("Quit task failed")?
        .context("Failed to stop decoder thread")?;

    info!("Decoded {} song(s), {} failed", args.uris.len(), failures);
    Ok(())
}

enum SongResult {
    Finished,
    Failed,
    Interrupted,
}

async fn decode_song(playback: &Arc<Playback>, uri: &str, seek: Option<f64>) -> Result<SongResult> {
    // start() requires an empty pipe
    while !playback.pipe.is_empty() {
        wait_wake(playback).await;
    }
    playback.frames.store(0, Ordering::SeqCst);

    let song = Song::new(uri).into_ref();
    {
        let control = Arc::clone(&playback.control);
        let buffer = Arc::clone(&playback.buffer);
        let pipe = Arc::clone(&playback.pipe);
        spawn_blocking(move || control.start(song, 0, 0, buffer, pipe))
            .await
            .context("Start task failed")?
            .with_context(|| format!("Failed to start decoding {}", uri))?;
    }

    let finished = async {
        if let Some(seconds) = seek {
            seek_when_decoding(playback, Duration::from_secs_f64(seconds.max(0.0))).await?;
        }
        while !playback.control.state().is_idle() {
            wait_wake(playback).await;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        result = finished => result?,
        _ = tokio::signal::ctrl_c() => {
            let control = Arc::clone(&playback.control);
            spawn_blocking(move || control.stop()).await.context("Stop task failed")?;
            return Ok(SongResult::Interrupted);
        }
    }

    // Let the playback task drain what is left of this song
    while !playback.pipe.is_empty() {
        wait_wake(playback).await;
    }

    let frames = playback.frames.load(Ordering::SeqCst);
    match playback.control.state() {
        DecodeState::Error => {
            match playback.control.error() {
                Some(e) => error!("{}: {}", uri, e),
                None => error!("{}: decoding failed", uri),
            }
            Ok(SongResult::Failed)
        }
        DecodeState::Stop | DecodeState::Start | DecodeState::Decode => {
            info!("{}: decoded {} frames", uri, frames);
            Ok(SongResult::Finished)
        }
    }
}

async fn seek_when_decoding(playback: &Arc<Playback>, target: Duration) -> Result<()> {
    while playback.control.state() == DecodeState::Start {
        wait_wake(playback).await;
    }
    if playback.control.state() != DecodeState::Decode {
        return Ok(());
    }

    let control = Arc::clone(&playback.control);
    let seeked = spawn_blocking(move || control.seek(target))
        .await
        .context("Seek task failed")?
        .context("Seek rejected")?;
    if seeked {
        info!("Seeked to {:?}", target);
    } else {
        warn!("Seek to {:?} failed", target);
    }
    Ok(())
}

async fn wait_wake(playback: &Playback) {
    // Timeout only bounds the wait; state is re-checked by the caller
    let _ = tokio::time::timeout(WAKE_INTERVAL, playback.wake.notified()).await;
}

/// Playback stand-in: drain the pipe and return chunks to the pool
async fn play(playback: Arc<Playback>) {
    while playback.running.load(Ordering::SeqCst) {
        let mut drained = false;
        while let Some(chunk) = playback.pipe.shift() {
            if let Some(tag) = &chunk.tag {
                info!(
                    "Now playing: {} - {}",
                    tag.get(TagKind::Artist).unwrap_or("?"),
                    tag.get(TagKind::Title).unwrap_or("?")
                );
            }
            playback
                .frames
                .fetch_add(chunk.frames() as u64, Ordering::SeqCst);
            playback.buffer.recycle(chunk);
            drained = true;
        }

        if drained {
            playback.control.lock_signal();
            playback.wake.notify_one();
        }
        wait_wake(&playback).await;
    }
}
