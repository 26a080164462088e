// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use fitcam::analysis::{CaptureMode, Season};
use fitcam::backends::PlatformKind;
use fitcam::backends::camera::Facing;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "fitcam")]
#[command(about = "Camera capture client for outfit feedback")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Analysis service base URL (overrides config and FITCAM_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and the permission state
    List {
        /// Use synthetic test pattern cameras
        #[arg(long = "virtual")]
        use_virtual: bool,
    },

    /// Run an interactive capture session (commands on stdin)
    Run {
        /// Use synthetic test pattern cameras
        #[arg(long = "virtual")]
        use_virtual: bool,

        /// Use a virtual camera that shows this picture
        #[arg(long, value_name = "FILE")]
        virtual_image: Option<PathBuf>,

        /// Camera to start with (user or environment)
        #[arg(short, long)]
        facing: Option<Facing>,

        /// Feedback mode (outfit or style)
        #[arg(short, long)]
        mode: Option<CaptureMode>,

        /// Season context (defaults to the current season)
        #[arg(short, long)]
        season: Option<Season>,

        /// Disable the periodic live feedback trigger
        #[arg(long)]
        no_live: bool,
    },

    /// Analyze a photo file instead of the live camera
    Analyze {
        /// Image file (jpg, png, webp, bmp)
        file: PathBuf,

        #[arg(short, long)]
        mode: Option<CaptureMode>,

        #[arg(short, long)]
        season: Option<Season>,

        /// Style reference image, repeatable (up to 5)
        #[arg(long = "style")]
        styles: Vec<PathBuf>,
    },

    /// Upload style reference images as a stored style profile
    UploadStyle {
        /// Reference images (up to 5)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tag, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Show a stored style profile
    Style {
        /// Style id returned by upload-style
        id: String,
    },

    /// Check the analysis service health
    Health,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=fitcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let mut config = fitcam::Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    match cli.command {
        Some(Commands::List { use_virtual }) => {
            cli::list_cameras(&PlatformKind::from_flags(use_virtual, None))
        }
        Some(Commands::Run {
            use_virtual,
            virtual_image,
            facing,
            mode,
            season,
            no_live,
        }) => {
            if let Some(facing) = facing {
                config.default_facing = facing;
            }
            if let Some(mode) = mode {
                config.capture_mode = mode;
            }
            if season.is_some() {
                config.season = season;
            }
            if no_live {
                config.live_feedback = false;
            }
            cli::run_session(config, &PlatformKind::from_flags(use_virtual, virtual_image))
        }
        Some(Commands::Analyze {
            file,
            mode,
            season,
            styles,
        }) => cli::analyze_file(
            &config,
            &file,
            mode.unwrap_or(config.capture_mode),
            season.unwrap_or_else(|| config.effective_season()),
            &styles,
        ),
        Some(Commands::UploadStyle { files, tags }) => cli::upload_style(&config, &files, &tags),
        Some(Commands::Style { id }) => cli::show_style(&config, &id),
        Some(Commands::Health) => cli::health(&config),
        None => cli::run_session(config, &PlatformKind::default()),
    }
}
