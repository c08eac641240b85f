// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port lookup by direction and connection state.

use crate::error::{GraphError, Result};
use crate::node::Node;
use crate::port::{Port, PortDirection};

/// Check a port against a direction and connection-state query
pub fn match_port(port: &Port, direction: PortDirection, connected: bool) -> bool {
    port.matches(direction, connected)
}

/// First port on `node`, in enumeration order, matching the query
pub fn find_port(node: &Node, direction: PortDirection, connected: bool) -> Result<&Port> {
    node.ports()
        .iter()
        .find(|p| match_port(p, direction, connected))
        .ok_or_else(|| {
            GraphError::NotFound(format!(
                "no {} {:?} port on '{}'",
                if connected { "connected" } else { "unconnected" },
                direction,
                node.name
            ))
        })
}

/// First free port with the given direction
pub fn find_unconnected_port(node: &Node, direction: PortDirection) -> Result<&Port> {
    find_port(node, direction, false)
}

/// First linked port with the given direction
pub fn find_connected_port(node: &Node, direction: PortDirection) -> Result<&Port> {
    find_port(node, direction, true)
}
