// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capture device enumeration and source descriptors.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Device class to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    /// Cameras and other video capture devices
    VideoInput,
    /// Microphones and line-in
    AudioInput,
}

/// Descriptive properties of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Category the device belongs to
    pub category: DeviceCategory,
    /// Human readable name
    pub friendly_name: String,
    /// Longer description, when the driver provides one
    #[serde(default)]
    pub description: Option<String>,
    /// Stable device path (not meant for display)
    #[serde(default)]
    pub device_path: Option<String>,
    /// Legacy wave-in index (audio capture only)
    #[serde(default)]
    pub wave_in_id: Option<u32>,
}

impl DeviceDescriptor {
    /// Create a descriptor with only a friendly name
    pub fn new(category: DeviceCategory, friendly_name: impl Into<String>) -> Self {
        Self {
            category,
            friendly_name: friendly_name.into(),
            description: None,
            device_path: None,
            wave_in_id: None,
        }
    }

    /// Set the device path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.device_path = Some(path.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name to show a user: the description if present, else the friendly name
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.friendly_name)
    }
}

/// Lazily enumerated devices
pub type DeviceIter<'a> = Box<dyn Iterator<Item = DeviceDescriptor> + 'a>;

/// Read-only source of device descriptors
pub trait DeviceProvider {
    /// Enumerate one category. Each call starts a fresh sequence; an empty
    /// category is reported as [`GraphError::NotFound`].
    fn enumerate(&self, category: DeviceCategory) -> Result<DeviceIter<'_>>;
}

/// Provider serving a fixed device list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticDeviceProvider {
    devices: Vec<DeviceDescriptor>,
}

impl StaticDeviceProvider {
    /// Create a provider from a list of devices
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self { devices }
    }

    /// Load a device list from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))?;
        let devices: Vec<DeviceDescriptor> = ron::from_str(&content)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))?;
        Ok(Self::new(devices))
    }
}

impl DeviceProvider for StaticDeviceProvider {
    fn enumerate(&self, category: DeviceCategory) -> Result<DeviceIter<'_>> {
        let mut devices = self
            .devices
            .iter()
            .filter(move |d| d.category == category)
            .cloned()
            .peekable();
        if devices.peek().is_none() {
            return Err(GraphError::NotFound(format!("no {category:?} devices")));
        }
        Ok(Box::new(devices))
    }
}

/// What to open as the graph's source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Source node type to instantiate
    pub node_type: String,
    /// File path, URL or device path handed to the source node
    pub locator: String,
}

impl SourceDescriptor {
    /// Create a source descriptor
    pub fn new(node_type: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            locator: locator.into(),
        }
    }

    /// Open a capture device through the given source node type
    pub fn from_device(device: &DeviceDescriptor, node_type: impl Into<String>) -> Self {
        let locator = device
            .device_path
            .clone()
            .unwrap_or_else(|| device.friendly_name.clone());
        Self::new(node_type, locator)
    }
}
