#![deny(clippy::all)]

mod audio;
mod camera;
mod commands;
mod display;
mod gallery;
mod preferences;
mod recognition;
mod storage;

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use camera::{CameraPreference, CameraSession, FacingDirection, NokhwaBackend};
use commands::Command;
use display::TranscriptView;
use recognition::{
    RealtimeConfig, RealtimeRecognizer, RecognitionClient, TranscriptEvent,
};

/// Application configuration
#[derive(serde::Deserialize)]
struct Config {
    camera: CameraConfig,
    recognition: RecognitionConfig,
}

#[derive(serde::Deserialize)]
struct CameraConfig {
    ideal_width: u32,
    ideal_height: u32,
}

#[derive(serde::Deserialize)]
struct RecognitionConfig {
    endpoint: String,
    deployment: String,
    language: String,
}

/// Load configuration from embedded config.toml
fn load_config() -> anyhow::Result<Config> {
    const CONFIG_TOML: &str = include_str!("../config.toml");
    let config: Config = toml::from_str(CONFIG_TOML)?;
    Ok(config)
}

/// Command-line options
#[derive(Parser, Debug)]
#[command(
    name = "camscribe",
    about = "Camera capture with live speech transcription"
)]
struct Args {
    /// Camera facing direction to prefer (environment or user)
    #[arg(long, default_value = "environment")]
    facing: FacingDirection,

    /// Fail instead of substituting another camera when no facing match exists
    #[arg(long)]
    strict: bool,

    /// Open this exact camera device id, ignoring the facing direction
    #[arg(long)]
    device: Option<String>,

    /// Language tag for transcription (overrides preferences and config)
    #[arg(long)]
    language: Option<String>,

    /// List available camera devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    // Load secrets from .env if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = load_config().context("invalid embedded configuration")?;

    let backend = Box::new(NokhwaBackend);

    if args.list_devices {
        let session = CameraSession::new(backend);
        for device in session.enumerate_devices()? {
            let label = if device.label.is_empty() {
                "(unlabeled)"
            } else {
                device.label.as_str()
            };
            println!("{}  {}", device.id, label);
        }
        return Ok(());
    }

    // Acquire the camera before entering the command loop. Acquisition
    // blocks on host device I/O, so it runs off the async executor.
    let mut preference = CameraPreference::new(
        args.facing,
        args.strict,
        config.camera.ideal_width,
        config.camera.ideal_height,
    );
    if let Some(device) = args.device.clone() {
        preference = preference.with_device_id(device);
    }

    let (mut camera_session, acquire_result) = tokio::task::spawn_blocking(move || {
        let mut session = CameraSession::new(backend);
        let result = session.acquire(&preference);
        (session, result)
    })
    .await?;

    match acquire_result {
        Ok(outcome) => info!(?outcome, "Camera preview ready"),
        Err(e) => {
            error!("Camera acquisition failed: {}", e);
            eprintln!("Could not access the camera: {}", e);
            eprintln!("Photo capture is disabled; grant camera access and restart.");
        }
    }

    // Transcription setup. An unconfigured recognizer disables the
    // record command rather than failing when invoked.
    if let Some(ref language) = args.language {
        if let Err(e) = preferences::set_language_code(language) {
            warn!("Could not persist language preference: {}", e);
        }
    }
    let language = args
        .language
        .or_else(preferences::get_language_code)
        .unwrap_or_else(|| config.recognition.language.clone());

    let endpoint = std::env::var("CAMSCRIBE_STT_ENDPOINT")
        .unwrap_or_else(|_| config.recognition.endpoint.clone());
    let api_key = Zeroizing::new(std::env::var("CAMSCRIBE_STT_API_KEY").unwrap_or_default());

    let recognizer = RealtimeRecognizer::new(RealtimeConfig {
        endpoint,
        deployment: config.recognition.deployment.clone(),
        language,
        api_key,
    });
    let recognition_supported = recognizer.is_available();
    if !recognition_supported {
        warn!("Speech recognition not configured - the rec command is disabled");
    }

    let client = Arc::new(RecognitionClient::new(Arc::new(recognizer)));
    spawn_transcript_printer(client.subscribe());

    print_help(recognition_supported);
    run_command_loop(&mut camera_session, &client, recognition_supported).await?;

    // Teardown: stop transcription and release the camera stream
    client.stop();
    camera_session.release();
    Ok(())
}

/// Read commands from stdin until quit
async fn run_command_loop(
    camera_session: &mut CameraSession,
    client: &Arc<RecognitionClient>,
    recognition_supported: bool,
) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut recognition_task: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(line) = lines.next_line().await? {
        let Some(command) = commands::parse(&line) else {
            if !line.trim().is_empty() {
                println!("Unknown command: {} (try 'help')", line.trim());
            }
            continue;
        };

        match command {
            Command::Snap => match camera_session.capture_frame() {
                Ok(photo) => match gallery::save_photo(&photo) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => eprintln!("Could not save photo: {}", e),
                },
                Err(e) => eprintln!("Could not capture a photo: {}", e),
            },
            Command::Record => {
                if !recognition_supported {
                    println!("rec is unavailable: speech recognition is not configured");
                    continue;
                }
                if client.is_listening() {
                    println!("Already recording");
                    continue;
                }
                let runner = client.clone();
                recognition_task = Some(tokio::spawn(async move {
                    if let Err(e) = runner.run().await {
                        error!("Transcription session ended with error: {}", e);
                    }
                }));
                println!("Recording... type 'stop' to finish");
            }
            Command::Stop => {
                client.stop();
                if let Some(task) = recognition_task.take() {
                    let _ = task.await;
                }
            }
            Command::Photos => match gallery::list_photos() {
                Ok(photos) if photos.is_empty() => println!("No photos yet"),
                Ok(photos) => {
                    for photo in photos {
                        println!("{}", photo.display());
                    }
                }
                Err(e) => eprintln!("Could not list photos: {}", e),
            },
            Command::Delete(name) => match gallery::delete_photo(&name) {
                Ok(()) => println!("Deleted {}", name),
                Err(e) => eprintln!("Could not delete photo: {}", e),
            },
            Command::Help => print_help(recognition_supported),
            Command::Quit => break,
        }
    }

    client.stop();
    if let Some(task) = recognition_task.take() {
        let _ = task.await;
    }
    Ok(())
}

/// Render transcript events to the terminal as they arrive
fn spawn_transcript_printer(mut event_rx: tokio::sync::broadcast::Receiver<TranscriptEvent>) {
    tokio::spawn(async move {
        let mut view = TranscriptView::default();
        while let Ok(event) = event_rx.recv().await {
            handle_transcript_event(&event, &mut view);
        }
    });
}

fn handle_transcript_event(event: &TranscriptEvent, view: &mut TranscriptView) {
    match event {
        TranscriptEvent::Update {
            committed_delta,
            interim,
        } => {
            view.apply(committed_delta, interim);
            if !committed_delta.is_empty() {
                // Settled text replaces the in-flight line
                print!("\r\x1b[2K");
                for line in committed_delta.lines() {
                    println!("{}", line);
                }
            }
            if !interim.is_empty() {
                print!("\r\x1b[2K... {}", interim);
                let _ = std::io::stdout().flush();
            }
        }
        TranscriptEvent::SegmentRestarted => {
            info!("Listening for the next utterance");
        }
        TranscriptEvent::Stopped => {
            println!();
            save_and_reset(view);
        }
        TranscriptEvent::Error { message } => {
            warn!("Transcription issue: {}", message);
        }
        TranscriptEvent::PermissionDenied { message } => {
            println!();
            eprintln!("Microphone access was denied: {}", message);
            eprintln!("Speech recognition stopped and will not restart.");
            save_and_reset(view);
        }
    }
}

/// Save whatever the session produced, interim text included, then reset
fn save_and_reset(view: &mut TranscriptView) {
    match storage::save_transcript(&view.rendered()) {
        Ok(path) => println!("Transcript saved to {}", path.display()),
        Err(storage::StorageError::EmptyTranscript) => info!("No transcript to save"),
        Err(e) => error!("Failed to save transcript: {}", e),
    }
    view.clear();
}

fn print_help(recognition_supported: bool) {
    println!("Commands:");
    println!("  snap            capture a photo from the live preview");
    if recognition_supported {
        println!("  rec             start live transcription");
        println!("  stop            stop transcription and save the transcript");
    } else {
        println!("  rec             (unavailable: transcription not configured)");
    }
    println!("  photos          list saved photos");
    println!("  delete <name>   remove a saved photo");
    println!("  help            show this help");
    println!("  quit            release the camera and exit");
}
