// SPDX-License-Identifier: MIT OR Apache-2.0
//! Simulated nodes.
//!
//! Stand-ins for real sources, decoders and renderers. The file source reads
//! its streams from a locator such as `sim:video/h264,audio/aac`.

use crate::controller::PlaybackState;
use crate::error::NodeError;
use crate::format::{MediaFormat, MediaKind};
use crate::node::{FinalizeContext, NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{Port, PortDirection};

/// Simulated file source
pub const FILE_SOURCE: &str = "source.file";
/// Simulated video presentation surface
pub const VIDEO_SURFACE: &str = "video.surface";
/// Simulated audio output
pub const AUDIO_OUTPUT: &str = "audio.output";
/// Compressed video to raw frames
pub const VIDEO_DECODER: &str = "transform.video_decoder";
/// Compressed audio to PCM
pub const AUDIO_DECODER: &str = "transform.audio_decoder";

const LOCATOR_SCHEME: &str = "sim:";

fn parse_kind(kind: &str) -> Option<MediaKind> {
    match kind {
        "video" => Some(MediaKind::Video),
        "audio" => Some(MediaKind::Audio),
        "subtitle" => Some(MediaKind::Subtitle),
        "data" => Some(MediaKind::Data),
        _ => None,
    }
}

/// Parse `sim:kind[/subtype],...` into one format per stream
pub fn parse_locator(locator: &str) -> Result<Vec<MediaFormat>, NodeError> {
    let streams = locator
        .strip_prefix(LOCATOR_SCHEME)
        .ok_or_else(|| NodeError::new(format!("unsupported locator '{locator}'")))?;

    streams
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|stream| {
            let stream = stream.trim();
            let (kind, subtype) = match stream.split_once('/') {
                Some((kind, subtype)) => (kind, Some(subtype)),
                None => (stream, None),
            };
            let kind = parse_kind(kind)
                .ok_or_else(|| NodeError::new(format!("unknown media kind in '{stream}'")))?;
            Ok(match subtype {
                Some(subtype) => MediaFormat::new(kind, subtype),
                None => MediaFormat::any(kind),
            })
        })
        .collect()
}

/// Source exposing one output port per stream in its locator
#[derive(Debug, Default)]
pub struct SimulatedSource;

impl NodeBehavior for SimulatedSource {
    fn open(&mut self, locator: &str) -> Result<Vec<Port>, NodeError> {
        let formats = parse_locator(locator)?;
        Ok(formats
            .into_iter()
            .enumerate()
            .map(|(i, format)| Port::output(format!("Stream {i}"), vec![format]))
            .collect())
    }
}

/// Terminal renderer
#[derive(Debug, Default)]
pub struct SimulatedRenderer {
    fail_finalize: bool,
    fail_state: Option<PlaybackState>,
}

impl SimulatedRenderer {
    /// Renderer whose finalization step always fails
    pub fn failing_finalize() -> Self {
        Self {
            fail_finalize: true,
            ..Self::default()
        }
    }

    /// Renderer that refuses to enter `state`
    pub fn refusing(state: PlaybackState) -> Self {
        Self {
            fail_state: Some(state),
            ..Self::default()
        }
    }
}

impl NodeBehavior for SimulatedRenderer {
    fn set_state(&mut self, state: PlaybackState) -> Result<(), NodeError> {
        if self.fail_state == Some(state) {
            return Err(NodeError::new(format!("cannot enter {state:?}")));
        }
        Ok(())
    }

    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Result<(), NodeError> {
        if self.fail_finalize {
            return Err(NodeError::new("surface composition failed"));
        }
        let format = ctx
            .ports
            .iter()
            .filter(|p| p.direction == PortDirection::Input)
            .find_map(Port::connected_format)
            .ok_or_else(|| NodeError::new("nothing to compose"))?;
        tracing::debug!(
            "Composing {format} surface over {} node(s), {} link(s)",
            ctx.node_count,
            ctx.connection_count
        );
        Ok(())
    }
}

/// Node type of the simulated video surface, under any ID
pub fn video_surface_type(id: &str) -> NodeType {
    NodeType::new(id, "Video Surface", NodeCategory::Renderer)
        .with_description("Presents raw video frames")
        .with_input(
            "Input",
            vec![
                MediaFormat::new(MediaKind::Video, "rgb32"),
                MediaFormat::new(MediaKind::Video, "yuv420"),
            ],
        )
}

/// Registry with the simulated source, renderers and decoders
pub fn simulated_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register_with(
        NodeType::new(FILE_SOURCE, "File Source", NodeCategory::Source)
            .with_description("Streams described by a sim: locator"),
        || Ok(Box::new(SimulatedSource)),
    );
    registry.register_with(video_surface_type(VIDEO_SURFACE), || {
        Ok(Box::new(SimulatedRenderer::default()))
    });
    registry.register_with(
        NodeType::new(AUDIO_OUTPUT, "Audio Output", NodeCategory::Renderer)
            .with_description("Plays PCM audio")
            .with_input("Audio Input", vec![MediaFormat::new(MediaKind::Audio, "pcm")]),
        || Ok(Box::new(SimulatedRenderer::default())),
    );
    registry.register(
        NodeType::new(VIDEO_DECODER, "Video Decoder", NodeCategory::Transform)
            .with_input(
                "XForm In",
                vec![
                    MediaFormat::new(MediaKind::Video, "h264"),
                    MediaFormat::new(MediaKind::Video, "hevc"),
                ],
            )
            .with_output("XForm Out", vec![MediaFormat::new(MediaKind::Video, "yuv420")]),
    );
    registry.register(
        NodeType::new(AUDIO_DECODER, "Audio Decoder", NodeCategory::Transform)
            .with_input(
                "XForm In",
                vec![
                    MediaFormat::new(MediaKind::Audio, "aac"),
                    MediaFormat::new(MediaKind::Audio, "mp3"),
                ],
            )
            .with_output("XForm Out", vec![MediaFormat::new(MediaKind::Audio, "pcm")]),
    );

    registry
}
