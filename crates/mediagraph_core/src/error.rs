// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types shared by the graph engine.

use crate::controller::PlaybackState;
use crate::node::NodeId;
use crate::port::PortId;
use thiserror::Error;

/// Errors surfaced by graph construction and lifecycle commands
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node or graph component could not be instantiated
    #[error("Failed to create '{type_id}': {reason}")]
    Creation {
        /// Node type (or component) that was requested
        type_id: String,
        /// Why creation failed
        reason: String,
    },

    /// No matching port, node or device for a query
    #[error("Not found: {0}")]
    NotFound(String),

    /// A specific link attempt failed
    #[error("Connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// None of the source's output streams could be rendered
    #[error("Cannot render source: {attempted} stream(s) attempted, none rendered")]
    CannotRender {
        /// Number of output ports that were tried
        attempted: usize,
    },

    /// A lifecycle command was issued from an incompatible state
    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        /// Command that was refused
        operation: &'static str,
        /// State the controller was in
        state: PlaybackState,
    },

    /// A node refused a state change or finalization step
    #[error("Node {node:?} failed: {source}")]
    Node {
        /// Node that reported the failure
        node: NodeId,
        /// Underlying node error
        #[source]
        source: NodeError,
    },

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why a single link between two ports failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0:?}")]
    PortNotFound(PortId),

    /// Port is already connected
    #[error("Port already connected: {0:?}")]
    PortAlreadyConnected(PortId),

    /// The link does not run from an output port to an input port
    #[error("Links must run from an output port to an input port")]
    WrongDirection,

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// No format advertised by the input is producible by the output
    #[error("No common media format")]
    NoCommonFormat,
}

/// Failure reported by a node implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NodeError(pub String);

impl NodeError {
    /// Create a node error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
