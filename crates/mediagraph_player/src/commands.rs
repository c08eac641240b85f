// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use mediagraph_core::{
    sim, ChannelEventSink, DeviceCategory, DeviceProvider, EventReceiver, GraphConfig,
    GraphController, GraphError, PlaybackState, RenderReport, SourceDescriptor,
    StaticDeviceProvider,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Command errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// Graph engine error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Report serialization error
    #[error("Cannot encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for commands
pub type Result<T> = std::result::Result<T, CommandError>;

/// Arguments of the `open` subcommand
pub struct OpenArgs {
    /// Source locator handed to the source node
    pub locator: String,
    /// Node type of the source
    pub source_type: String,
    /// Optional RON configuration file
    pub config: Option<PathBuf>,
    /// Cycle through play, pause and stop after building
    pub play: bool,
    /// Print the summary as JSON
    pub json: bool,
}

#[derive(Serialize)]
struct OpenSummary<'a> {
    locator: &'a str,
    state: PlaybackState,
    nodes: Vec<String>,
    report: &'a RenderReport,
}

/// Print every device of every category
pub fn list_devices(path: Option<&Path>) -> Result<()> {
    let provider = match path {
        Some(path) => StaticDeviceProvider::load(path)?,
        None => StaticDeviceProvider::default(),
    };

    for category in [DeviceCategory::VideoInput, DeviceCategory::AudioInput] {
        println!("{category:?}:");
        match provider.enumerate(category) {
            Ok(devices) => {
                for device in devices {
                    println!("  {}", device.display_name());
                    if let Some(id) = device.wave_in_id {
                        println!("    WaveIn ID: {id}");
                    }
                    if let Some(device_path) = &device.device_path {
                        println!("    Device path: {device_path}");
                    }
                }
            }
            Err(e) => println!("  ({e})"),
        }
    }
    Ok(())
}

/// Open a source, optionally run it, and tear the graph down
pub fn open(args: &OpenArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => GraphConfig::load_or_default(path)?,
        None => GraphConfig::default(),
    };
    let (sink, mut events) = ChannelEventSink::new();
    let mut controller =
        GraphController::new(Arc::new(sim::simulated_registry()), Arc::new(sink)).with_config(config);

    let source = SourceDescriptor::new(&args.source_type, &args.locator);
    let report = controller.open(&source)?;
    log_events(&mut events);

    if args.play {
        controller.play()?;
        controller.pause()?;
        controller.stop()?;
        log_events(&mut events);
    }

    let nodes = controller
        .graph()
        .map(|g| g.nodes().map(|n| format!("{} ({})", n.name, n.node_type)).collect())
        .unwrap_or_default();
    let summary = OpenSummary {
        locator: &args.locator,
        state: controller.state(),
        nodes,
        report: &report,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Rendered {}/{} stream(s) from '{}'",
            report.rendered, report.attempted, summary.locator
        );
        for node in &summary.nodes {
            println!("  {node}");
        }
        for skipped in &report.skipped {
            println!("  skipped {}: {}", skipped.port, skipped.reason);
        }
        for pruned in &report.pruned {
            println!("  pruned {pruned}");
        }
    }

    controller.tear_down();
    Ok(())
}

/// Write the default configuration to `path`
pub fn init_config(path: &Path) -> Result<()> {
    GraphConfig::default().save(path)?;
    tracing::info!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn log_events(events: &mut EventReceiver) {
    while let Ok(event) = events.try_recv() {
        tracing::debug!("Graph event: {event:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_args(locator: &str, config: Option<PathBuf>) -> OpenArgs {
        OpenArgs {
            locator: locator.to_string(),
            source_type: sim::FILE_SOURCE.to_string(),
            config,
            play: true,
            json: true,
        }
    }

    #[test]
    fn test_open_simulated_source() {
        open(&open_args("sim:video/h264,audio/aac", None)).unwrap();
    }

    #[test]
    fn test_open_unrenderable_source_fails() {
        let err = open(&open_args("sim:subtitle/srt", None)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Graph(GraphError::CannotRender { attempted: 1 })
        ));
    }

    #[test]
    fn test_init_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediagraph.ron");

        init_config(&path).unwrap();
        assert_eq!(GraphConfig::load(&path).unwrap(), GraphConfig::default());
        open(&open_args("sim:audio/pcm", Some(path))).unwrap();
    }

    #[test]
    fn test_list_devices_without_inventory() {
        list_devices(None).unwrap();
    }
}
