// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source rendering: wiring every producible stream of a source node into
//! the renderers already present in the graph.
//!
//! A render pass:
//! 1. inserts one renderer per configured slot,
//! 2. tries each source output in enumeration order, directly into a
//!    renderer, into a transform already feeding one, or through a chain of
//!    freshly created transforms,
//! 3. fails with [`GraphError::CannotRender`] if nothing rendered,
//! 4. prunes renderers left without a connected input,
//! 5. lets the video renderers finalize over the assembled graph.
//!
//! Failures of single ports are absorbed; only the aggregate outcome and
//! construction failures propagate.

use crate::config::{GraphConfig, RendererSlot};
use crate::device::SourceDescriptor;
use crate::error::{GraphError, Result};
use crate::event::GraphEvent;
use crate::format::{MediaFormat, MediaKind};
use crate::graph::Graph;
use crate::matcher;
use crate::negotiator;
use crate::node::{NodeFactory, NodeId};
use crate::port::{PortDirection, PortRef};
use indexmap::IndexSet;
use serde::Serialize;

/// A source output that could not be rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedStream {
    /// Port name on the source
    pub port: String,
    /// Last failure seen while trying it
    pub reason: String,
}

/// Outcome of rendering one source node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Output ports tried
    pub attempted: usize,
    /// Output ports that reached a renderer
    pub rendered: usize,
    /// Output ports that were tried and skipped
    pub skipped: Vec<SkippedStream>,
    /// Renderer types removed for lack of a connected input
    pub pruned: Vec<String>,
}

impl RenderReport {
    /// Whether at least one stream rendered
    pub fn any_rendered(&self) -> bool {
        self.rendered > 0
    }
}

/// A renderer inserted for a configured slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedRenderer {
    /// Media kind of the slot
    pub kind: MediaKind,
    /// Node instance
    pub node: NodeId,
    /// Candidate type that was created
    pub node_type: String,
}

/// Assembles graphs from a node factory and a configuration
pub struct GraphBuilder<'a> {
    factory: &'a dyn NodeFactory,
    config: &'a GraphConfig,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder
    pub fn new(factory: &'a dyn NodeFactory, config: &'a GraphConfig) -> Self {
        Self { factory, config }
    }

    /// Create a node by type and insert it
    pub fn add_node_by_type(
        &self,
        graph: &mut Graph,
        type_id: &str,
        name: Option<&str>,
    ) -> Result<NodeId> {
        let node = self.factory.create(type_id)?;
        let node = match name {
            Some(name) => node.with_name(name),
            None => node,
        };
        graph.add_node(node)
    }

    /// Create the source node, let it open its locator and insert it
    pub fn add_source(&self, graph: &mut Graph, source: &SourceDescriptor) -> Result<NodeId> {
        let mut node = self.factory.create(&source.node_type)?;
        let ports = node
            .behavior_mut()
            .open(&source.locator)
            .map_err(|e| GraphError::Creation {
                type_id: source.node_type.clone(),
                reason: format!("cannot open '{}': {e}", source.locator),
            })?;
        node.add_ports(ports);
        node.name = source.locator.clone();
        graph.add_node(node)
    }

    /// Insert one renderer per configured slot
    pub fn create_renderers(&self, graph: &mut Graph) -> Result<Vec<PlacedRenderer>> {
        self.config
            .renderers
            .iter()
            .map(|slot| self.create_renderer(graph, slot))
            .collect()
    }

    /// Insert the first candidate of `slot` that can be created
    fn create_renderer(&self, graph: &mut Graph, slot: &RendererSlot) -> Result<PlacedRenderer> {
        let mut last_error = None;
        for candidate in &slot.candidates {
            match self.add_node_by_type(graph, candidate, None) {
                Ok(node) => {
                    tracing::debug!("Using '{candidate}' as {} renderer", slot.kind.label());
                    return Ok(PlacedRenderer {
                        kind: slot.kind,
                        node,
                        node_type: candidate.clone(),
                    });
                }
                Err(e) => {
                    tracing::debug!("Renderer candidate '{candidate}' unavailable: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| GraphError::Creation {
            type_id: format!("{} renderer", slot.kind.label()),
            reason: "no candidates configured".to_string(),
        }))
    }

    /// Render every output of `source` into the graph's renderers
    pub fn render_source(&self, graph: &mut Graph, source: NodeId) -> Result<RenderReport> {
        let renderers = self.create_renderers(graph)?;

        let outputs: Vec<(PortRef, String)> = graph
            .node(source)
            .ok_or_else(|| GraphError::NotFound(format!("source {source:?} is not in the graph")))?
            .ports_in(PortDirection::Output)
            .map(|p| (PortRef::new(source, p.id), p.name.clone()))
            .collect();

        let mut report = RenderReport::default();
        for (port, name) in outputs {
            report.attempted += 1;
            match self.render_port(graph, port, 0) {
                Ok(format) => {
                    tracing::debug!("Rendered '{name}' as {format}");
                    report.rendered += 1;
                    graph.events().notify(GraphEvent::StreamRendered { port: name, format });
                }
                Err(e) => {
                    tracing::warn!("Tried and skipped '{name}': {e}");
                    graph.events().notify(GraphEvent::StreamSkipped {
                        port: name.clone(),
                        reason: e.to_string(),
                    });
                    report.skipped.push(SkippedStream {
                        port: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.any_rendered() {
            return Err(GraphError::CannotRender {
                attempted: report.attempted,
            });
        }

        for renderer in &renderers {
            if Self::prune(graph, renderer.node)? {
                tracing::warn!(
                    "Removed unused {} renderer '{}'",
                    renderer.kind.label(),
                    renderer.node_type
                );
                report.pruned.push(renderer.node_type.clone());
            }
        }

        self.finalize(graph, &renderers)?;

        tracing::info!(
            "Rendered {}/{} stream(s), {} node(s) in graph",
            report.rendered,
            report.attempted,
            graph.node_count()
        );
        Ok(report)
    }

    /// Remove `node` if none of its inputs is connected. Returns whether it
    /// was removed. Only meaningful once a render pass is complete.
    pub fn prune(graph: &mut Graph, node: NodeId) -> Result<bool> {
        let target = graph
            .node(node)
            .ok_or_else(|| GraphError::NotFound(format!("node {node:?} is not in the graph")))?;
        if matcher::find_connected_port(target, PortDirection::Input).is_ok() {
            return Ok(false);
        }
        graph.remove_node(node);
        Ok(true)
    }

    fn finalize(&self, graph: &mut Graph, renderers: &[PlacedRenderer]) -> Result<()> {
        let node_count = graph.node_count();
        let connection_count = graph.connection_count();
        for renderer in renderers.iter().filter(|r| r.kind == MediaKind::Video) {
            if let Some(node) = graph.node_mut(renderer.node) {
                node.finalize(node_count, connection_count)
                    .map_err(|source| GraphError::Node {
                        node: renderer.node,
                        source,
                    })?;
            }
        }
        Ok(())
    }

    /// Route one output port to a renderer already in the graph, inserting
    /// transforms when no renderer accepts it directly.
    fn render_port(&self, graph: &mut Graph, output: PortRef, depth: usize) -> Result<MediaFormat> {
        let renderers: Vec<NodeId> = graph
            .nodes()
            .filter(|n| n.is_renderer())
            .map(|n| n.id)
            .collect();

        let mut last_error = None;
        for renderer in renderers {
            match negotiator::connect_to_node(graph, output, renderer) {
                Ok(link) => return Ok(link.format),
                Err(e) => last_error = Some(e),
            }
        }

        for chain in Self::open_chains(graph, output.node) {
            match negotiator::connect_to_node(graph, output, chain) {
                Ok(link) => {
                    tracing::debug!("Joined existing chain at node {chain:?}");
                    return Ok(link.format);
                }
                Err(e) => last_error = Some(e),
            }
        }

        if self.config.allow_intermediate && depth < self.config.max_chain_depth {
            for type_id in self.factory.transform_types() {
                match self.render_through(graph, output, &type_id, depth) {
                    Ok(format) => return Ok(format),
                    Err(e) => {
                        tracing::trace!("Transform '{type_id}' did not help: {e}");
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GraphError::NotFound("no renderer in graph".to_string())))
    }

    /// Transforms already in the graph that have a free input and whose
    /// outputs lead to a renderer, in insertion order. Nodes downstream of
    /// `from` are left out so joining them cannot close a cycle.
    fn open_chains(graph: &Graph, from: NodeId) -> Vec<NodeId> {
        graph
            .nodes()
            .filter(|n| !n.is_renderer() && n.id != from)
            .filter(|n| matcher::find_unconnected_port(n, PortDirection::Input).is_ok())
            .filter(|n| {
                let reachable = Self::downstream(graph, n.id);
                !reachable.contains(&from)
                    && reachable
                        .iter()
                        .any(|id| graph.node(*id).is_some_and(|d| d.is_renderer()))
            })
            .map(|n| n.id)
            .collect()
    }

    /// Every node reachable from `start` by following output links
    fn downstream(graph: &Graph, start: NodeId) -> IndexSet<NodeId> {
        let mut reached = IndexSet::new();
        let mut pending = vec![start];
        while let Some(id) = pending.pop() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            for peer in node.ports_in(PortDirection::Output).filter_map(|p| p.peer()) {
                if reached.insert(peer.node) {
                    pending.push(peer.node);
                }
            }
        }
        reached
    }

    /// Insert a transform behind `output` and render its outputs. On failure
    /// the transform is removed again, taking its links with it.
    fn render_through(
        &self,
        graph: &mut Graph,
        output: PortRef,
        type_id: &str,
        depth: usize,
    ) -> Result<MediaFormat> {
        let transform = self.add_node_by_type(graph, type_id, None)?;
        match self.link_through(graph, output, transform, depth) {
            Ok(format) => Ok(format),
            Err(e) => {
                graph.remove_node(transform);
                Err(e)
            }
        }
    }

    fn link_through(
        &self,
        graph: &mut Graph,
        output: PortRef,
        transform: NodeId,
        depth: usize,
    ) -> Result<MediaFormat> {
        let link = negotiator::connect_to_node(graph, output, transform)?;

        let outputs: Vec<PortRef> = graph
            .node(transform)
            .map(|n| {
                n.ports_in(PortDirection::Output)
                    .map(|p| PortRef::new(transform, p.id))
                    .collect()
            })
            .unwrap_or_default();

        let mut rendered_any = false;
        let mut last_error = None;
        for port in outputs {
            match self.render_port(graph, port, depth + 1) {
                Ok(_) => rendered_any = true,
                Err(e) => last_error = Some(e),
            }
        }

        if rendered_any {
            Ok(link.format)
        } else {
            Err(last_error.unwrap_or_else(|| {
                GraphError::NotFound(format!("transform {transform:?} has no outputs"))
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeCategory, NodeRegistry, NodeType};
    use crate::sim;

    fn render(locator: &str, config: &GraphConfig) -> (Graph, Result<RenderReport>) {
        let registry = sim::simulated_registry();
        let builder = GraphBuilder::new(&registry, config);
        let mut graph = Graph::default();
        let source = builder
            .add_source(&mut graph, &SourceDescriptor::new(sim::FILE_SOURCE, locator))
            .unwrap();
        let result = builder.render_source(&mut graph, source);
        (graph, result)
    }

    fn types(graph: &Graph) -> Vec<&str> {
        graph.nodes().map(|n| n.node_type.as_str()).collect()
    }

    #[test]
    fn test_renders_raw_streams_directly() {
        let (graph, result) = render("sim:video/rgb32,audio/pcm", &GraphConfig::default());
        let report = result.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.rendered, 2);
        assert!(report.pruned.is_empty());
        assert_eq!(types(&graph), vec![sim::FILE_SOURCE, sim::VIDEO_SURFACE, sim::AUDIO_OUTPUT]);
        assert_eq!(graph.connection_count(), 2);
    }

    #[test]
    fn test_inserts_decoders_for_compressed_streams() {
        let (graph, result) = render("sim:video/h264,audio/aac", &GraphConfig::default());
        let report = result.unwrap();

        assert_eq!(report.rendered, 2);
        assert_eq!(graph.node_count(), 5);
        assert!(types(&graph).contains(&sim::VIDEO_DECODER));
        assert!(types(&graph).contains(&sim::AUDIO_DECODER));
        assert_eq!(graph.connection_count(), 4);
    }

    #[test]
    fn test_failed_chain_leaves_no_transforms() {
        let (graph, result) = render("sim:audio/pcm,video/vp9", &GraphConfig::default());
        let report = result.unwrap();

        assert_eq!(report.rendered, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].port, "Stream 1");
        assert_eq!(report.pruned, vec![sim::VIDEO_SURFACE.to_string()]);
        assert_eq!(types(&graph), vec![sim::FILE_SOURCE, sim::AUDIO_OUTPUT]);
    }

    #[test]
    fn test_intermediate_disabled() {
        let config = GraphConfig {
            allow_intermediate: false,
            ..GraphConfig::default()
        };
        let (graph, result) = render("sim:video/h264,audio/pcm", &config);
        let report = result.unwrap();

        assert_eq!(report.rendered, 1);
        assert_eq!(types(&graph), vec![sim::FILE_SOURCE, sim::AUDIO_OUTPUT]);
    }

    #[test]
    fn test_nothing_rendered_is_cannot_render() {
        let (_, result) = render("sim:subtitle/srt", &GraphConfig::default());
        assert!(matches!(result, Err(GraphError::CannotRender { attempted: 1 })));
    }

    #[test]
    fn test_second_stream_of_same_kind_is_skipped() {
        let (graph, result) = render("sim:audio/pcm,audio/pcm", &GraphConfig::default());
        let report = result.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.rendered, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_second_stream_joins_existing_mixer() {
        let mut registry = sim::simulated_registry();
        let opus = MediaFormat::new(MediaKind::Audio, "opus");
        registry.register(
            NodeType::new("transform.mixer", "Mixer", NodeCategory::Transform)
                .with_input("In 0", vec![opus.clone()])
                .with_input("In 1", vec![opus])
                .with_output("Out", vec![MediaFormat::new(MediaKind::Audio, "pcm")]),
        );
        let config = GraphConfig::default();
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();
        let source = builder
            .add_source(&mut graph, &SourceDescriptor::new(sim::FILE_SOURCE, "sim:audio/opus,audio/opus"))
            .unwrap();

        let report = builder.render_source(&mut graph, source).unwrap();
        assert_eq!(report.rendered, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(types(&graph), vec![sim::FILE_SOURCE, sim::AUDIO_OUTPUT, "transform.mixer"]);
        assert_eq!(graph.connection_count(), 3);
    }

    #[test]
    fn test_renderer_candidates_fall_back() {
        let mut registry = sim::simulated_registry();
        registry.register_with(sim::video_surface_type("video.broken"), || {
            Err(crate::error::NodeError::new("no display"))
        });
        let config = GraphConfig {
            renderers: vec![RendererSlot::new(MediaKind::Video, ["video.broken", sim::VIDEO_SURFACE])],
            ..GraphConfig::default()
        };
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();

        let placed = builder.create_renderers(&mut graph).unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].node_type, sim::VIDEO_SURFACE);
    }

    #[test]
    fn test_no_creatable_renderer_is_creation_error() {
        let registry = NodeRegistry::new();
        let config = GraphConfig::default();
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();

        let err = builder.create_renderers(&mut graph).unwrap_err();
        assert!(matches!(err, GraphError::Creation { .. }));
    }

    #[test]
    fn test_finalize_failure_fails_render() {
        let mut registry = sim::simulated_registry();
        registry.register_with(sim::video_surface_type(sim::VIDEO_SURFACE), || {
            Ok(Box::new(sim::SimulatedRenderer::failing_finalize()))
        });
        let config = GraphConfig::default();
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();
        let source = builder
            .add_source(&mut graph, &SourceDescriptor::new(sim::FILE_SOURCE, "sim:video/rgb32"))
            .unwrap();

        let err = builder.render_source(&mut graph, source).unwrap_err();
        assert!(matches!(err, GraphError::Node { .. }));
    }

    #[test]
    fn test_finalize_skipped_when_video_pruned() {
        let mut registry = sim::simulated_registry();
        registry.register_with(sim::video_surface_type(sim::VIDEO_SURFACE), || {
            Ok(Box::new(sim::SimulatedRenderer::failing_finalize()))
        });
        let config = GraphConfig::default();
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();
        let source = builder
            .add_source(&mut graph, &SourceDescriptor::new(sim::FILE_SOURCE, "sim:audio/pcm"))
            .unwrap();

        let report = builder.render_source(&mut graph, source).unwrap();
        assert_eq!(report.pruned, vec![sim::VIDEO_SURFACE.to_string()]);
    }

    #[test]
    fn test_prune_keeps_connected_renderer() {
        let (mut graph, result) = render("sim:audio/pcm", &GraphConfig::default());
        result.unwrap();

        let audio = graph
            .nodes()
            .find(|n| n.node_type == sim::AUDIO_OUTPUT)
            .map(|n| n.id)
            .unwrap();
        assert!(!GraphBuilder::prune(&mut graph, audio).unwrap());
        assert!(graph.contains(audio));
        assert!(matches!(
            GraphBuilder::prune(&mut graph, NodeId::new()),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_locator_is_creation_error() {
        let registry = sim::simulated_registry();
        let config = GraphConfig::default();
        let builder = GraphBuilder::new(&registry, &config);
        let mut graph = Graph::default();

        let err = builder
            .add_source(&mut graph, &SourceDescriptor::new(sim::FILE_SOURCE, "movie.avi"))
            .unwrap_err();
        assert!(matches!(err, GraphError::Creation { .. }));
        assert_eq!(graph.node_count(), 0);
    }
}
