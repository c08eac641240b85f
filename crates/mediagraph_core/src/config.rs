// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph building configuration.
//!
//! Stored on disk as RON:
//!
//! ```ron
//! (
//!     renderers: [
//!         (kind: Video, candidates: ["video.surface", "video.fallback"]),
//!         (kind: Audio, candidates: ["audio.output"]),
//!     ],
//!     max_chain_depth: 2,
//!     allow_intermediate: true,
//! )
//! ```

use crate::error::{GraphError, Result};
use crate::format::MediaKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on intermediate transforms between a source port and a renderer
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 2;

/// One renderer to pre-create before rendering a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererSlot {
    /// Media kind this renderer presents
    pub kind: MediaKind,
    /// Node type IDs in preference order; the first that can be created is used
    pub candidates: Vec<String>,
}

impl RendererSlot {
    /// Create a slot
    pub fn new(kind: MediaKind, candidates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

/// Settings for [`GraphBuilder`](crate::builder::GraphBuilder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Renderers inserted before any connection attempt
    pub renderers: Vec<RendererSlot>,
    /// Maximum number of transforms chained for one stream
    pub max_chain_depth: usize,
    /// Whether transforms may be inserted between a port and a renderer
    pub allow_intermediate: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            renderers: vec![
                RendererSlot::new(MediaKind::Video, ["video.surface"]),
                RendererSlot::new(MediaKind::Audio, ["audio.output"]),
            ],
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            allow_intermediate: true,
        }
    }
}

impl GraphConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))?;
        ron::from_str(&content)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from a RON file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)
            .map_err(|e| GraphError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.renderers.len(), 2);
        assert_eq!(config.renderers[0].kind, MediaKind::Video);
        assert!(config.allow_intermediate);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.ron");

        let mut config = GraphConfig::default();
        config.renderers[0]
            .candidates
            .push("video.fallback".to_string());
        config.max_chain_depth = 1;
        config.save(&path).unwrap();

        assert_eq!(GraphConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: GraphConfig = ron::from_str("(allow_intermediate: false)").unwrap();
        assert!(!config.allow_intermediate);
        assert_eq!(config.max_chain_depth, DEFAULT_MAX_CHAIN_DEPTH);
        assert_eq!(config.renderers.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ron");
        assert!(matches!(GraphConfig::load(&path), Err(GraphError::Config(_))));
        assert_eq!(GraphConfig::load_or_default(&path).unwrap(), GraphConfig::default());
    }
}
