// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::format::MediaFormat;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction a peer port must have
    pub fn opposite(&self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Non-owning handle to a port somewhere in a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Node that owns the port
    pub node: NodeId,
    /// Port on that node
    pub port: PortId,
}

impl PortRef {
    /// Create a new port reference
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

/// A port on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Formats this port can carry, in preference order
    pub formats: Vec<MediaFormat>,
    peer: Option<PortRef>,
    format: Option<MediaFormat>,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, formats: Vec<MediaFormat>) -> Self {
        Self::new(name, PortDirection::Input, formats)
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, formats: Vec<MediaFormat>) -> Self {
        Self::new(name, PortDirection::Output, formats)
    }

    fn new(name: impl Into<String>, direction: PortDirection, formats: Vec<MediaFormat>) -> Self {
        Self {
            id: PortId::new(),
            name: name.into(),
            direction,
            formats,
            peer: None,
            format: None,
        }
    }

    /// Copy of this port with a fresh ID and no connection (template instantiation)
    pub fn instantiate(&self) -> Self {
        Self::new(self.name.clone(), self.direction, self.formats.clone())
    }

    /// Whether the port is linked to a peer
    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// The port on the other end of the link
    pub fn peer(&self) -> Option<PortRef> {
        self.peer
    }

    /// Format agreed on when the link was made
    pub fn connected_format(&self) -> Option<&MediaFormat> {
        self.format.as_ref()
    }

    /// Check direction and connection state against a query
    pub fn matches(&self, direction: PortDirection, connected: bool) -> bool {
        self.direction == direction && self.is_connected() == connected
    }

    pub(crate) fn attach(&mut self, peer: PortRef, format: MediaFormat) {
        self.peer = Some(peer);
        self.format = Some(format);
    }

    pub(crate) fn detach(&mut self) -> Option<PortRef> {
        self.format = None;
        self.peer.take()
    }
}
