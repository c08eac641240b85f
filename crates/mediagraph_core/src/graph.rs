// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure owning nodes and their links.

use crate::error::{ConnectionError, GraphError, Result};
use crate::event::{EventHandle, GraphEvent};
use crate::format::MediaFormat;
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortRef};
use indexmap::IndexMap;

/// A media pipeline graph.
///
/// Nodes are owned by the graph; links live on the ports as mutual
/// [`PortRef`] handles, so removing a node only needs to clear its peers.
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    events: EventHandle,
}

impl Graph {
    /// Create a new empty graph with no event delivery
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_events(name, EventHandle::detached())
    }

    /// Create a new empty graph that reports through `events`
    pub fn with_events(name: impl Into<String>, events: EventHandle) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            events,
        }
    }

    /// Event path for this graph
    pub fn events(&self) -> &EventHandle {
        &self.events
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(GraphError::Creation {
                type_id: node.node_type,
                reason: format!("node {id:?} is already in graph '{}'", self.name),
            });
        }
        node.behavior_mut().joined(id, self.events.clone());
        tracing::debug!("Added node '{}' ({})", node.name, node.node_type);
        self.events.notify(GraphEvent::NodeAdded {
            node: id,
            node_type: node.node_type.clone(),
        });
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }
        self.disconnect_node(node_id);
        let node = self.nodes.shift_remove(&node_id)?;
        tracing::debug!("Removed node '{}' ({})", node.name, node.node_type);
        self.events.notify(GraphEvent::NodeRemoved {
            node: node_id,
            node_type: node.node_type.clone(),
        });
        Some(node)
    }

    /// Check whether a node is resident
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link an output port to an input port.
    ///
    /// Formats are tried in the order the input advertises them; the first
    /// one the output can produce and both nodes accept wins. On failure
    /// neither port is touched.
    pub fn link(
        &mut self,
        from: PortRef,
        to: PortRef,
    ) -> std::result::Result<MediaFormat, ConnectionError> {
        if from.node == to.node {
            return Err(ConnectionError::SelfLoop);
        }

        let source_node = self
            .nodes
            .get(&from.node)
            .ok_or(ConnectionError::NodeNotFound(from.node))?;
        let target_node = self
            .nodes
            .get(&to.node)
            .ok_or(ConnectionError::NodeNotFound(to.node))?;
        let source_port = source_node
            .port(from.port)
            .ok_or(ConnectionError::PortNotFound(from.port))?;
        let target_port = target_node
            .port(to.port)
            .ok_or(ConnectionError::PortNotFound(to.port))?;

        if source_port.direction != PortDirection::Output
            || target_port.direction != PortDirection::Input
        {
            return Err(ConnectionError::WrongDirection);
        }
        if source_port.is_connected() {
            return Err(ConnectionError::PortAlreadyConnected(from.port));
        }
        if target_port.is_connected() {
            return Err(ConnectionError::PortAlreadyConnected(to.port));
        }

        let format = target_port
            .formats
            .iter()
            .flat_map(|wanted| {
                source_port
                    .formats
                    .iter()
                    .filter_map(move |offered| wanted.intersect(offered))
            })
            .find(|candidate| {
                source_node.behavior().accept_format(source_port, candidate)
                    && target_node.behavior().accept_format(target_port, candidate)
            })
            .ok_or(ConnectionError::NoCommonFormat)?;

        if let Some(port) = self.nodes.get_mut(&from.node).and_then(|n| n.port_mut(from.port)) {
            port.attach(to, format.clone());
        }
        if let Some(port) = self.nodes.get_mut(&to.node).and_then(|n| n.port_mut(to.port)) {
            port.attach(from, format.clone());
        }
        Ok(format)
    }

    /// Break the link on a port, returning the former peer
    pub fn unlink(&mut self, port: PortRef) -> Option<PortRef> {
        let peer = self
            .nodes
            .get_mut(&port.node)
            .and_then(|n| n.port_mut(port.port))
            .and_then(|p| p.detach())?;
        if let Some(peer_port) = self.nodes.get_mut(&peer.node).and_then(|n| n.port_mut(peer.port)) {
            peer_port.detach();
        }
        Some(peer)
    }

    /// Break every link touching a node, returning how many were broken
    pub fn disconnect_node(&mut self, node_id: NodeId) -> usize {
        let connected: Vec<PortRef> = match self.nodes.get(&node_id) {
            Some(node) => node
                .ports()
                .iter()
                .filter(|p| p.is_connected())
                .map(|p| PortRef::new(node_id, p.id))
                .collect(),
            None => return 0,
        };
        connected
            .into_iter()
            .filter_map(|port| self.unlink(port))
            .count()
    }

    /// All links as `(output, input)` pairs
    pub fn connections(&self) -> Vec<(PortRef, PortRef)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.ports_in(PortDirection::Output)
                    .filter_map(move |p| p.peer().map(|peer| (PortRef::new(node.id, p.id), peer)))
            })
            .collect()
    }

    /// Get the number of links
    pub fn connection_count(&self) -> usize {
        self.nodes
            .values()
            .map(|n| n.ports_in(PortDirection::Output).filter(|p| p.is_connected()).count())
            .sum()
    }

    /// Release every node: links are broken first, then nodes are dropped in
    /// insertion order. Returns how many nodes were released.
    pub fn clear(&mut self) -> usize {
        for node in self.nodes.values_mut() {
            for port in node.ports_mut() {
                port.detach();
            }
        }
        let released = self.nodes.len();
        for (id, node) in self.nodes.drain(..) {
            tracing::trace!("Releasing node '{}' ({:?})", node.name, id);
            drop(node);
        }
        released
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MediaKind;
    use crate::node::{NodeBehavior, NodeCategory, NodeType, PassiveBehavior};
    use crate::port::Port;

    fn source(formats: Vec<MediaFormat>) -> Node {
        let ty = NodeType::new("test.source", "Source", NodeCategory::Source).with_output("out", formats);
        Node::new(&ty, Box::new(PassiveBehavior))
    }

    fn sink(formats: Vec<MediaFormat>) -> Node {
        let ty = NodeType::new("test.sink", "Sink", NodeCategory::Renderer).with_input("in", formats);
        Node::new(&ty, Box::new(PassiveBehavior))
    }

    fn first_port(graph: &Graph, node: NodeId) -> PortRef {
        PortRef::new(node, graph.node(node).unwrap().ports()[0].id)
    }

    #[test]
    fn test_link_sets_both_ends() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::new(MediaKind::Audio, "pcm")])).unwrap();
        let b = graph.add_node(sink(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let (out, inp) = (first_port(&graph, a), first_port(&graph, b));

        let format = graph.link(out, inp).unwrap();
        assert_eq!(format, MediaFormat::new(MediaKind::Audio, "pcm"));
        assert_eq!(graph.node(a).unwrap().port(out.port).unwrap().peer(), Some(inp));
        assert_eq!(graph.node(b).unwrap().port(inp.port).unwrap().peer(), Some(out));
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connections(), vec![(out, inp)]);
    }

    #[test]
    fn test_destination_format_order_wins() {
        let mut graph = Graph::default();
        let a = graph
            .add_node(source(vec![
                MediaFormat::new(MediaKind::Video, "rgb32"),
                MediaFormat::new(MediaKind::Video, "yuv420"),
            ]))
            .unwrap();
        let b = graph
            .add_node(sink(vec![
                MediaFormat::new(MediaKind::Video, "yuv420"),
                MediaFormat::new(MediaKind::Video, "rgb32"),
            ]))
            .unwrap();

        let format = graph.link(first_port(&graph, a), first_port(&graph, b)).unwrap();
        assert_eq!(format.subtype.as_deref(), Some("yuv420"));
    }

    #[test]
    fn test_failed_link_leaves_ports_untouched() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::any(MediaKind::Video)])).unwrap();
        let b = graph.add_node(sink(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let (out, inp) = (first_port(&graph, a), first_port(&graph, b));

        assert_eq!(graph.link(out, inp), Err(ConnectionError::NoCommonFormat));
        assert_eq!(graph.link(inp, out), Err(ConnectionError::WrongDirection));
        assert_eq!(graph.link(out, out), Err(ConnectionError::SelfLoop));

        let c = graph.add_node(source(vec![MediaFormat::any(MediaKind::Video)])).unwrap();
        let other_out = first_port(&graph, c);
        assert_eq!(graph.link(out, other_out), Err(ConnectionError::WrongDirection));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_input_accepts_one_peer() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let b = graph.add_node(source(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let c = graph.add_node(sink(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let inp = first_port(&graph, c);

        graph.link(first_port(&graph, a), inp).unwrap();
        assert_eq!(
            graph.link(first_port(&graph, b), inp),
            Err(ConnectionError::PortAlreadyConnected(inp.port))
        );
    }

    #[derive(Debug)]
    struct RejectAll;

    impl NodeBehavior for RejectAll {
        fn accept_format(&self, _port: &Port, _format: &MediaFormat) -> bool {
            false
        }
    }

    #[test]
    fn test_behavior_can_veto_format() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let ty = NodeType::new("picky", "Picky", NodeCategory::Renderer)
            .with_input("in", vec![MediaFormat::any(MediaKind::Audio)]);
        let b = graph.add_node(Node::new(&ty, Box::new(RejectAll))).unwrap();

        assert_eq!(
            graph.link(first_port(&graph, a), first_port(&graph, b)),
            Err(ConnectionError::NoCommonFormat)
        );
    }

    #[test]
    fn test_remove_node_clears_peer() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let b = graph.add_node(sink(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let out = first_port(&graph, a);
        graph.link(out, first_port(&graph, b)).unwrap();

        assert!(graph.remove_node(b).is_some());
        assert!(!graph.node(a).unwrap().port(out.port).unwrap().is_connected());
        assert!(graph.remove_node(b).is_none());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut graph = Graph::default();
        let a = graph.add_node(source(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        let b = graph.add_node(sink(vec![MediaFormat::any(MediaKind::Audio)])).unwrap();
        graph.link(first_port(&graph, a), first_port(&graph, b)).unwrap();

        assert_eq!(graph.clear(), 2);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.clear(), 0);
    }
}
