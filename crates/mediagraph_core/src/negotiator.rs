// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection negotiation between nodes.
//!
//! All three entry points bottom out in [`Graph::link`], which walks the
//! destination's advertised formats in order. A failed attempt never leaves
//! a half-made link behind.

use crate::error::{GraphError, Result};
use crate::format::MediaFormat;
use crate::graph::Graph;
use crate::matcher;
use crate::node::NodeId;
use crate::port::{PortDirection, PortRef};

/// An established link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Upstream output port
    pub output: PortRef,
    /// Downstream input port
    pub input: PortRef,
    /// Negotiated format
    pub format: MediaFormat,
}

/// Link an output port directly to an input port
pub fn connect_ports(graph: &mut Graph, output: PortRef, input: PortRef) -> Result<Link> {
    let format = graph.link(output, input)?;
    Ok(Link {
        output,
        input,
        format,
    })
}

/// Link an output port to the first free input on `dest`
pub fn connect_to_node(graph: &mut Graph, output: PortRef, dest: NodeId) -> Result<Link> {
    let node = graph
        .node(dest)
        .ok_or_else(|| GraphError::NotFound(format!("node {dest:?} is not in the graph")))?;
    let input = PortRef::new(dest, matcher::find_unconnected_port(node, PortDirection::Input)?.id);
    connect_ports(graph, output, input)
}

/// Link the first free output on `src` to the first free input on `dest`
pub fn connect_nodes(graph: &mut Graph, src: NodeId, dest: NodeId) -> Result<Link> {
    let node = graph
        .node(src)
        .ok_or_else(|| GraphError::NotFound(format!("node {src:?} is not in the graph")))?;
    let output = PortRef::new(src, matcher::find_unconnected_port(node, PortDirection::Output)?.id);
    connect_to_node(graph, output, dest)
}
