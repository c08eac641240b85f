// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph lifecycle.
//!
//! [`GraphController`] owns at most one graph at a time and drives it
//! through `NoGraph -> Stopped -> Paused/Running`. Events raised while a
//! graph is being built are held back and only delivered once it is
//! complete; any failure while opening a source tears the graph down and
//! discards them, so a host never sees a half-built graph.

use crate::builder::{GraphBuilder, RenderReport};
use crate::config::GraphConfig;
use crate::device::SourceDescriptor;
use crate::error::{GraphError, Result};
use crate::event::{EventRegistration, EventSink, GraphEvent};
use crate::graph::Graph;
use crate::node::NodeFactory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle state of the controller's graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No graph exists
    #[default]
    NoGraph,
    /// Graph built, not streaming
    Stopped,
    /// Graph cued, streams held
    Paused,
    /// Graph streaming
    Running,
}

impl PlaybackState {
    /// Check if a graph exists in this state
    pub fn has_graph(&self) -> bool {
        !matches!(self, PlaybackState::NoGraph)
    }
}

struct ActiveGraph {
    graph: Graph,
    registration: EventRegistration,
}

/// Owner of the active graph and its event registration
pub struct GraphController {
    factory: Arc<dyn NodeFactory>,
    sink: Arc<dyn EventSink>,
    config: GraphConfig,
    active: Option<ActiveGraph>,
    state: PlaybackState,
}

impl GraphController {
    /// Create a controller with the default configuration
    pub fn new(factory: Arc<dyn NodeFactory>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            factory,
            sink,
            config: GraphConfig::default(),
            active: None,
            state: PlaybackState::NoGraph,
        }
    }

    /// Replace the configuration used by the next `open`
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The active graph, if any
    pub fn graph(&self) -> Option<&Graph> {
        self.active.as_ref().map(|a| &a.graph)
    }

    /// Nodes resident in the active graph
    pub fn node_count(&self) -> usize {
        self.graph().map_or(0, Graph::node_count)
    }

    /// Build a fresh graph for `source`, replacing any existing one
    pub fn open(&mut self, source: &SourceDescriptor) -> Result<RenderReport> {
        tracing::info!("Opening '{}' via {}", source.locator, source.node_type);
        match self.build(source) {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Failed to open '{}': {e}", source.locator);
                self.tear_down();
                Err(e)
            }
        }
    }

    fn build(&mut self, source: &SourceDescriptor) -> Result<RenderReport> {
        self.tear_down();
        let active = self.active.insert(Self::initialize_graph(&self.sink));
        let builder = GraphBuilder::new(self.factory.as_ref(), &self.config);
        let source_node = builder.add_source(&mut active.graph, source)?;
        let report = builder.render_source(&mut active.graph, source_node)?;

        active.registration.activate();
        self.set_state(PlaybackState::Stopped);
        Ok(report)
    }

    /// A fresh graph whose events are held back until it is fully built
    fn initialize_graph(sink: &Arc<dyn EventSink>) -> ActiveGraph {
        let registration = EventRegistration::buffered(Arc::clone(sink));
        let graph = Graph::with_events("Playback", registration.handle());
        ActiveGraph {
            graph,
            registration,
        }
    }

    /// Start streaming
    pub fn play(&mut self) -> Result<()> {
        self.transition("play", PlaybackState::Running)
    }

    /// Hold streams in place
    pub fn pause(&mut self) -> Result<()> {
        self.transition("pause", PlaybackState::Paused)
    }

    /// Stop streaming; the graph stays built
    pub fn stop(&mut self) -> Result<()> {
        self.transition("stop", PlaybackState::Stopped)
    }

    fn transition(&mut self, operation: &'static str, target: PlaybackState) -> Result<()> {
        let current = self.state;
        let Some(active) = self.active.as_mut() else {
            return Err(GraphError::InvalidState {
                operation,
                state: current,
            });
        };
        if current == target {
            return Ok(());
        }

        let failure = active.graph.nodes_mut().find_map(|node| {
            node.behavior_mut()
                .set_state(target)
                .err()
                .map(|e| (node.id, e))
        });

        if let Some((node, source)) = failure {
            tracing::warn!("Node {node:?} refused {target:?}: {source}; reverting to {current:?}");
            for node in active.graph.nodes_mut() {
                if let Err(e) = node.behavior_mut().set_state(current) {
                    tracing::warn!("Node '{}' failed to revert: {e}", node.name);
                }
            }
            return Err(GraphError::Node { node, source });
        }

        self.set_state(target);
        Ok(())
    }

    fn set_state(&mut self, state: PlaybackState) {
        tracing::info!("Graph state {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(active) = &self.active {
            active
                .graph
                .events()
                .notify(GraphEvent::StateChanged(state));
        }
    }

    /// Silence events, release every node and drop the graph.
    ///
    /// Safe to call in any state, any number of times.
    pub fn tear_down(&mut self) {
        if let Some(ActiveGraph {
            mut graph,
            registration,
        }) = self.active.take()
        {
            if self.state.has_graph() {
                tracing::info!("Graph state {:?} -> {:?}", self.state, PlaybackState::NoGraph);
                graph
                    .events()
                    .notify(GraphEvent::StateChanged(PlaybackState::NoGraph));
            }
            registration.release();
            let released = graph.clear();
            tracing::info!("Tore down graph '{}', released {released} node(s)", graph.name);
        }
        self.state = PlaybackState::NoGraph;
    }
}

impl Drop for GraphController {
    fn drop(&mut self) {
        self.tear_down();
    }
}
