// SPDX-License-Identifier: MIT OR Apache-2.0
//! Media pipeline graph engine.
//!
//! This crate builds, connects, runs and tears down graphs of media nodes:
//! - Sources, transforms and renderers created from a node factory
//! - Typed ports with format negotiation
//! - Best-effort rendering of every stream a source produces
//! - A lifecycle controller that never leaves a half-built graph behind
//!
//! ## Architecture
//!
//! The [`Graph`] owns its nodes; links are mutual [`PortRef`] handles stored
//! on the ports. [`matcher`] and [`negotiator`] find and link ports,
//! [`GraphBuilder`] renders a source into the renderers configured in
//! [`GraphConfig`], and [`GraphController`] owns the graph's lifecycle and
//! its event registration.

pub mod builder;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod event;
pub mod format;
pub mod graph;
pub mod matcher;
pub mod negotiator;
pub mod node;
pub mod port;
pub mod sim;

pub use builder::{GraphBuilder, RenderReport, SkippedStream};
pub use config::{GraphConfig, RendererSlot};
pub use controller::{GraphController, PlaybackState};
pub use device::{DeviceCategory, DeviceDescriptor, DeviceProvider, SourceDescriptor, StaticDeviceProvider};
pub use error::{ConnectionError, GraphError, NodeError, Result};
pub use event::{ChannelEventSink, EventHandle, EventReceiver, EventSink, GraphEvent};
pub use format::{MediaFormat, MediaKind};
pub use graph::Graph;
pub use node::{Node, NodeBehavior, NodeCategory, NodeFactory, NodeId, NodeRegistry, NodeType};
pub use port::{Port, PortDirection, PortId, PortRef};
