// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Running an interactive capture session driven by stdin
//! - One-shot analysis of a photo file (upload fallback)
//! - Style profile upload and lookup, service health

use fitcam::analysis::{
    CaptureMode, FeedbackItem, HttpAnalysisClient, Season, StyleReferenceSet, build_request,
};
use fitcam::app::{Message, SessionEvent, SessionRuntime, SessionSnapshot, SessionState};
use fitcam::backends::camera::DeviceProber;
use fitcam::backends::{self, PlatformKind};
use fitcam::backends::virtual_camera::load_still_image;
use fitcam::config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// A line typed into the interactive session
#[derive(Debug)]
enum Command {
    Send(Message),
    Status,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  start             start (or restart) the camera
  photo             start the countdown; again to cancel
  pause             toggle live feedback
  switch            switch between front and rear camera
  stop              release the camera and clear feedback
  upload <file>     analyze a photo file
  style add <file>  add a style reference image
  style rm <n>      remove style reference n (1-based)
  style clear       remove all style references
  mode <m>          outfit | style
  season <s>        spring | summer | autumn | winter
  devices           rescan cameras
  status            show the session state
  quit              stop and exit";

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let rest = words.collect::<Vec<_>>().join(" ");

    let message = match (verb, rest.as_str()) {
        ("start" | "retry", _) => Message::Start,
        ("photo" | "p", _) => Message::TakePhoto,
        ("pause" | "resume", _) => Message::TogglePause,
        ("switch", _) => Message::SwitchCamera,
        ("stop", _) => Message::Stop,
        ("devices", _) => Message::RefreshDevices,
        ("upload", "") => return Err("usage: upload <file>".to_string()),
        ("upload", path) => Message::AnalyzeFile(PathBuf::from(path)),
        ("mode", mode) => Message::SetMode(mode.parse()?),
        ("season", season) => Message::SetSeason(season.parse()?),
        ("style", args) => return parse_style_command(args),
        ("status", _) => return Ok(Command::Status),
        ("help" | "?", _) => return Ok(Command::Help),
        ("quit" | "exit" | "q", _) => return Ok(Command::Quit),
        (other, _) => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(Command::Send(message))
}

fn parse_style_command(args: &str) -> Result<Command, String> {
    let (action, arg) = args.split_once(' ').unwrap_or((args, ""));
    let message = match (action, arg.trim()) {
        ("add", "") => return Err("usage: style add <file>".to_string()),
        ("add", path) => Message::AddStyleReference(PathBuf::from(path)),
        ("rm" | "remove", n) => {
            let position: usize = n
                .parse()
                .map_err(|_| format!("not a position: {:?}", n))?;
            if position == 0 {
                return Err("positions start at 1".to_string());
            }
            Message::RemoveStyleReference(position - 1)
        }
        ("clear", _) => Message::ClearStyleReferences,
        _ => return Err("usage: style add <file> | style rm <n> | style clear".to_string()),
    };
    Ok(Command::Send(message))
}

fn print_feedback(items: &[FeedbackItem], confidence_percent: u8) {
    println!("Feedback ({}% confidence):", confidence_percent);
    for item in items {
        println!("  [{}] {}: {}", item.priority, item.category, item.message);
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(SessionState::Error {
            message,
            remediation,
        }) => {
            println!("Camera error: {}", message);
            println!("  Suggestion: {}", remediation);
        }
        SessionEvent::StateChanged(state) => println!("[{}]", state),
        SessionEvent::Countdown(0) => println!("  smile!"),
        SessionEvent::Countdown(n) => println!("  {}...", n),
        SessionEvent::Feedback {
            items,
            confidence_percent,
        } => print_feedback(items, *confidence_percent),
        SessionEvent::Notice(message) => println!("! {}", message),
        SessionEvent::DevicesChanged(cameras) => println!("Cameras available: {}", cameras.len()),
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("State:   {}", snapshot.state);
    println!("Camera:  {}", snapshot.facing);
    if let Some(track) = &snapshot.track {
        println!("Stream:  {} {}x{}", track.label, track.width, track.height);
    }
    println!("Mode:    {}", snapshot.mode);
    if let Some(season) = snapshot.season {
        println!("Season:  {}", season);
    }
    println!("Styles:  {}", snapshot.style_references);
    println!("Paused:  {}", snapshot.paused);
    if !snapshot.feedback.is_empty() {
        print_feedback(&snapshot.feedback, snapshot.confidence_percent);
    }
}

/// List all available cameras
pub fn list_cameras(kind: &PlatformKind) -> CliResult {
    let prober = DeviceProber::new(backends::platform(kind)?);
    let rt = tokio::runtime::Runtime::new()?;
    let (permission, cameras) =
        rt.block_on(async { (prober.query_permission().await, prober.list_cameras().await) });

    println!("Camera permission: {}", permission);
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let facing = camera
            .facing
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  [{}] {} ({}, facing {})", index, camera.label, camera.id, facing);
        if !camera.resolutions.is_empty() {
            let sizes: Vec<String> = camera
                .resolutions
                .iter()
                .map(|(w, h)| format!("{}x{}", w, h))
                .collect();
            println!("      Sizes: {}", sizes.join(", "));
        }
    }
    Ok(())
}

/// Run an interactive session until `quit` or end of input
pub fn run_session(config: Config, kind: &PlatformKind) -> CliResult {
    let client = HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
    let devices = backends::platform(kind)?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let (runtime, handle, mut events) =
            SessionRuntime::new(&config, devices, Arc::new(client));
        let session = tokio::spawn(runtime.run());
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                print_event(&event);
            }
        });

        println!("fitcam: analysis service at {}", config.api_base_url);
        println!("Type 'help' for commands.");
        handle.send(Message::Start);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_command(line) {
                Ok(Command::Send(message)) => {
                    if !handle.send(message) {
                        break;
                    }
                }
                Ok(Command::Status) => print_status(&handle.snapshot()),
                Ok(Command::Help) => println!("{}", HELP),
                Ok(Command::Quit) => break,
                Err(e) => println!("{}", e),
            }
        }

        handle.send(Message::Shutdown);
        session.await?;
        drop(handle);
        printer.await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Analyze a single photo file through the upload fallback path
pub fn analyze_file(
    config: &Config,
    file: &Path,
    mode: CaptureMode,
    season: Season,
    style_files: &[PathBuf],
) -> CliResult {
    let client = HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let styles = load_styles(style_files).await?;
        let frame = load_still_image(file).await?;
        println!(
            "Analyzing {} ({}x{}, {} mode, {})",
            file.display(),
            frame.width(),
            frame.height(),
            mode,
            season
        );

        let request = build_request(&frame, mode, season, &styles);
        drop(frame);
        let outcome = client.analyze(&request).await?;
        print_feedback(&outcome.feedback, outcome.confidence_percent());
        if let Some(seconds) = outcome.processing_time {
            println!("Processed in {:.2}s", seconds);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Upload style references as a stored profile
pub fn upload_style(config: &Config, files: &[PathBuf], tags: &[String]) -> CliResult {
    let client = HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let styles = load_styles(files).await?;
        let upload = client.upload_style(&styles, tags).await?;
        println!("Style saved: {}", upload.style_id);
        for url in &upload.image_urls {
            println!("  {}", url);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Show a stored style profile
pub fn show_style(config: &Config, style_id: &str) -> CliResult {
    let client = HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
    let rt = tokio::runtime::Runtime::new()?;

    let style = rt.block_on(client.get_style(style_id))?;
    println!("Style:    {}", style.style_id);
    if let Some(created_at) = &style.created_at {
        println!("Created:  {}", created_at);
    }
    if let Some(category) = &style.category {
        println!("Category: {}", category);
    }
    if let Some(description) = &style.description {
        println!("About:    {}", description);
    }
    if !style.tags.is_empty() {
        println!("Tags:     {}", style.tags.join(", "));
    }
    for url in &style.image_urls {
        println!("  {}", url);
    }
    Ok(())
}

/// Check the analysis service health
pub fn health(config: &Config) -> CliResult {
    let client = HttpAnalysisClient::new(&config.api_base_url, config.request_timeout())?;
    let rt = tokio::runtime::Runtime::new()?;

    let status = rt.block_on(client.health_check())?;
    println!("{}: {}", client.base_url(), status.status);
    if let Some(ai) = &status.ai_service {
        println!("  ai service: {}", ai);
    }
    if !status.is_healthy() {
        return Err(format!("service reports {}", status.status).into());
    }
    Ok(())
}

async fn load_styles(files: &[PathBuf]) -> Result<StyleReferenceSet, Box<dyn std::error::Error>> {
    let mut styles = StyleReferenceSet::default();
    for path in files {
        let image = load_still_image(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        styles.add(&name, image)?;
    }
    Ok(styles)
}
