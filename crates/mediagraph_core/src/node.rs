// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions, node behaviors and the node factory.

use crate::controller::PlaybackState;
use crate::error::{GraphError, NodeError, Result};
use crate::event::EventHandle;
use crate::format::MediaFormat;
use crate::port::{Port, PortDirection, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Produces streams (files, capture devices)
    Source,
    /// Converts one stream into another (decoders, converters)
    Transform,
    /// Terminal consumer (video surface, audio output)
    Renderer,
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Ports every instance starts with
    pub ports: Vec<Port>,
}

impl NodeType {
    /// Create a node type with no ports
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            ports: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an input port template
    pub fn with_input(mut self, name: impl Into<String>, formats: Vec<MediaFormat>) -> Self {
        self.ports.push(Port::input(name, formats));
        self
    }

    /// Add an output port template
    pub fn with_output(mut self, name: impl Into<String>, formats: Vec<MediaFormat>) -> Self {
        self.ports.push(Port::output(name, formats));
        self
    }
}

/// Read-only view handed to a node during graph finalization
#[derive(Debug)]
pub struct FinalizeContext<'a> {
    /// Node being finalized
    pub node: NodeId,
    /// The node's ports, with their connection state
    pub ports: &'a [Port],
    /// Nodes resident in the graph
    pub node_count: usize,
    /// Links in the graph
    pub connection_count: usize,
}

/// Per-kind behavior plugged into a [`Node`].
///
/// Every method has a passive default so sources, transforms and renderers
/// only override what they need.
pub trait NodeBehavior: Send + fmt::Debug {
    /// Open a locator and report the output ports it exposes (sources only)
    fn open(&mut self, locator: &str) -> std::result::Result<Vec<Port>, NodeError> {
        let _ = locator;
        Ok(Vec::new())
    }

    /// Last word on a format proposed for one of this node's ports
    fn accept_format(&self, port: &Port, format: &MediaFormat) -> bool {
        let _ = (port, format);
        true
    }

    /// Called once the node is inserted into a graph
    fn joined(&mut self, node: NodeId, events: EventHandle) {
        let _ = (node, events);
    }

    /// Follow a graph state transition
    fn set_state(&mut self, state: PlaybackState) -> std::result::Result<(), NodeError> {
        let _ = state;
        Ok(())
    }

    /// Composition/sizing step run once the graph is assembled
    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> std::result::Result<(), NodeError> {
        let _ = ctx;
        Ok(())
    }
}

/// Behavior that accepts everything and does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct PassiveBehavior;

impl NodeBehavior for PassiveBehavior {}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name
    pub name: String,
    /// Category inherited from the type
    pub category: NodeCategory,
    ports: Vec<Port>,
    behavior: Box<dyn NodeBehavior>,
}

impl Node {
    /// Create a new node from a type definition
    pub fn new(node_type: &NodeType, behavior: Box<dyn NodeBehavior>) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.id.clone(),
            name: node_type.name.clone(),
            category: node_type.category,
            ports: node_type.ports.iter().map(Port::instantiate).collect(),
            behavior,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// All ports in enumeration order
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Ports with a given direction, in enumeration order
    pub fn ports_in(&self, direction: PortDirection) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(move |p| p.direction == direction)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == port_id)
    }

    pub(crate) fn port_mut(&mut self, port_id: PortId) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.id == port_id)
    }

    pub(crate) fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    /// Append ports discovered after creation
    pub fn add_ports(&mut self, ports: impl IntoIterator<Item = Port>) {
        self.ports.extend(ports);
    }

    /// Whether this node is a renderer
    pub fn is_renderer(&self) -> bool {
        self.category == NodeCategory::Renderer
    }

    /// Shared access to the behavior
    pub fn behavior(&self) -> &dyn NodeBehavior {
        self.behavior.as_ref()
    }

    /// Exclusive access to the behavior
    pub fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        self.behavior.as_mut()
    }

    /// Run the behavior's finalization over this node's ports
    pub(crate) fn finalize(
        &mut self,
        node_count: usize,
        connection_count: usize,
    ) -> std::result::Result<(), NodeError> {
        let ctx = FinalizeContext {
            node: self.id,
            ports: &self.ports,
            node_count,
            connection_count,
        };
        self.behavior.finalize(&ctx)
    }
}

/// Creates nodes by type identifier
pub trait NodeFactory: Send + Sync {
    /// Instantiate a node of the given type
    fn create(&self, type_id: &str) -> Result<Node>;

    /// Transform types usable as intermediate chain links, in preference order
    fn transform_types(&self) -> Vec<String>;
}

type BehaviorCtor =
    Arc<dyn Fn() -> std::result::Result<Box<dyn NodeBehavior>, NodeError> + Send + Sync>;

struct RegistryEntry {
    node_type: NodeType,
    ctor: BehaviorCtor,
}

/// Registry of available node types
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type with passive behavior
    pub fn register(&mut self, node_type: NodeType) {
        self.register_with(node_type, || Ok(Box::new(PassiveBehavior)));
    }

    /// Register a node type with a behavior constructor
    pub fn register_with<F>(&mut self, node_type: NodeType, ctor: F)
    where
        F: Fn() -> std::result::Result<Box<dyn NodeBehavior>, NodeError> + Send + Sync + 'static,
    {
        self.types.insert(
            node_type.id.clone(),
            RegistryEntry {
                node_type,
                ctor: Arc::new(ctor),
            },
        );
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id).map(|e| &e.node_type)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values().map(|e| &e.node_type)
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types().filter(move |t| t.category == category)
    }
}

impl NodeFactory for NodeRegistry {
    fn create(&self, type_id: &str) -> Result<Node> {
        let entry = self.types.get(type_id).ok_or_else(|| GraphError::Creation {
            type_id: type_id.to_string(),
            reason: "unknown node type".to_string(),
        })?;
        let behavior = (entry.ctor)().map_err(|e| GraphError::Creation {
            type_id: type_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Node::new(&entry.node_type, behavior))
    }

    fn transform_types(&self) -> Vec<String> {
        self.types_in_category(NodeCategory::Transform)
            .map(|t| t.id.clone())
            .collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}
