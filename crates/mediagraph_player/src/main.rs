// SPDX-License-Identifier: MIT OR Apache-2.0
//! `mediagraph` - command-line host for the media graph engine.
//!
//! - Lists capture devices by category
//! - Opens a source, renders its streams and drives play/pause/stop
//! - Writes a default graph configuration
//!
//! Nodes come from the simulated registry in `mediagraph_core::sim`, so a
//! source is described by a locator such as `sim:video/h264,audio/aac`.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mediagraph", version, about = "Build and run media pipeline graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture devices
    Devices {
        /// RON file with the device list
        #[arg(long)]
        devices: Option<PathBuf>,
    },
    /// Open a source and render its streams
    Open {
        /// Source locator, e.g. `sim:video/h264,audio/aac`
        locator: String,
        /// Source node type
        #[arg(long, default_value = mediagraph_core::sim::FILE_SOURCE)]
        source_type: String,
        /// Graph configuration (RON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run the graph through play, pause and stop before tearing down
        #[arg(long)]
        play: bool,
        /// Print the render report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the default graph configuration
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mediagraph_core=info,mediagraph_player=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Devices { devices } => commands::list_devices(devices.as_deref()),
        Command::Open {
            locator,
            source_type,
            config,
            play,
            json,
        } => commands::open(&commands::OpenArgs {
            locator,
            source_type,
            config,
            play,
            json,
        }),
        Command::InitConfig { path } => commands::init_config(&path),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
