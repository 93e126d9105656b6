use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use colored::*;
use duet_client::media::{LocalStream, LocalTrack, MediaConstraints, MediaDevice, TrackKind};
use duet_client::{ClientConfig, MediaError, SessionDriver, SessionHandle, SessionNotice};
use duet_core::StreamLabel;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Headless call participant: joins a room through the relay, negotiates
/// a call and relays stdin lines as chat.
#[derive(Parser, Debug)]
#[command(name = "duet-call")]
struct Args {
    /// Relay WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    #[arg(short, long)]
    room: String,

    #[arg(short, long, default_value = "guest")]
    name: String,

    /// Answer incoming calls without waiting for `/answer`.
    #[arg(long)]
    auto_answer: bool,

    /// Call the remote participant as soon as the relay picks us as caller.
    #[arg(long)]
    auto_offer: bool,

    /// Join without camera or microphone tracks.
    #[arg(long)]
    no_media: bool,
}

/// Tracks with no capture pipeline behind them. They take part in
/// negotiation but never carry samples.
struct SyntheticMedia;

#[async_trait]
impl MediaDevice for SyntheticMedia {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack::new(TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(LocalTrack::new(TrackKind::Video));
        }
        Ok(LocalStream::new(StreamLabel::Camera, tracks))
    }

    async fn acquire_display(&self) -> Result<LocalStream, MediaError> {
        Ok(LocalStream::new(
            StreamLabel::Screen,
            vec![LocalTrack::new(TrackKind::Video)],
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::new(args.room.as_str(), args.name.as_str())
        .with_signaling_url(args.url.as_str())
        .with_auto_offer(args.auto_offer);
    config.acquire_media_on_start = !args.no_media;

    let (driver, handle, mut notices) = SessionDriver::connect(&config, Arc::new(SyntheticMedia))
        .await
        .with_context(|| format!("Failed to connect to relay at {}", args.url))?;
    let session = tokio::spawn(driver.run());
    info!(url = %args.url, room = %args.room, "Session started");

    println!(
        "{} {} as {}",
        "Joining".green().bold(),
        args.room.cyan(),
        args.name.cyan()
    );
    println!("{}", "Commands: /call /answer /end /mute /video /share /state /quit".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else {
                    break;
                };
                print_notice(&notice);
                if args.auto_answer && matches!(notice, SessionNotice::IncomingCall(_))
                    && let Err(e) = handle.answer_call().await
                {
                    println!("{} {}", "Answer failed:".red(), e);
                }
            }

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !run_command(&handle, line.trim()).await {
                    break;
                }
            }
        }
    }

    info!("Leaving room");
    handle.shutdown().await;
    session.await.context("Session task failed")?;
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn run_command(handle: &SessionHandle, line: &str) -> bool {
    let result = match line {
        "/quit" => return false,
        "/call" => handle.start_call().await.map(|_| None),
        "/answer" => handle.answer_call().await.map(|_| None),
        "/end" => handle.end_call().await.map(|_| None),
        "/mute" => handle.toggle_audio().await.map(|o| Some(format!("audio: {o:?}"))),
        "/video" => handle.toggle_video().await.map(|o| Some(format!("video: {o:?}"))),
        "/share" => handle.start_screen_share().await.map(|_| None),
        "/state" => handle.snapshot().await.map(|s| Some(format!("{s:#?}"))),
        text => handle.send_message(text).await.map(|_| None),
    };

    match result {
        Ok(Some(output)) => println!("{}", output.dimmed()),
        Ok(None) => {}
        Err(e) => println!("{} {}", "Error:".red(), e),
    }
    true
}

fn print_notice(notice: &SessionNotice) {
    match notice {
        SessionNotice::Joined { participant_id } => {
            println!("{} {}", "Connected to relay as".green(), participant_id)
        }
        SessionNotice::RemoteOnline(p) => println!("{} joined", p.display_name.cyan()),
        SessionNotice::RemoteLeft(p) => println!("{} left", p.display_name.cyan()),
        SessionNotice::RoleAssigned(role) => println!("{} {:?}", "Role:".dimmed(), role),
        SessionNotice::IncomingCall(p) => {
            println!("{} {}", "Incoming call from".yellow().bold(), p.display_name)
        }
        SessionNotice::CallConnected => println!("{}", "Call connected".green().bold()),
        SessionNotice::CallEnded { by: Some(name) } => {
            println!("{} {}", "Call ended by".yellow(), name)
        }
        SessionNotice::CallEnded { by: None } => println!("{}", "Call ended".yellow()),
        SessionNotice::RemoteStream { stream_id, label } => {
            println!("{} {:?} ({})", "Remote stream".dimmed(), label, stream_id)
        }
        SessionNotice::ScreenShareAnnounced { display_name } => {
            println!("{} is sharing their screen", display_name.cyan())
        }
        SessionNotice::Chat(entry) => {
            println!("{}: {}", entry.sender_display_name.bold(), entry.text)
        }
        SessionNotice::MediaUnavailable(e) => println!("{} {}", "Media unavailable:".red(), e),
        SessionNotice::LinkState(state) => println!("{} {:?}", "Link:".dimmed(), state),
        SessionNotice::RoomFull(room) => println!("{} {}", "Room is full:".red().bold(), room),
        SessionNotice::CallFailed(reason) => println!("{} {}", "Call failed:".red(), reason),
    }
}
