// SPDX-License-Identifier: MIT OR Apache-2.0
//! Media formats advertised by ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Major media kind carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Video frames
    Video,
    /// Audio samples
    Audio,
    /// Subtitle / caption text
    Subtitle,
    /// Opaque data stream
    Data,
}

impl MediaKind {
    /// Short lowercase label (for logs and reports)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Data => "data",
        }
    }
}

/// A media format: a kind plus an optional subtype.
///
/// A `None` subtype is a wildcard and pairs with any subtype of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Major kind
    pub kind: MediaKind,
    /// Subtype such as `"h264"` or `"pcm"`
    pub subtype: Option<String>,
}

impl MediaFormat {
    /// Create a format with a concrete subtype
    pub fn new(kind: MediaKind, subtype: impl Into<String>) -> Self {
        Self {
            kind,
            subtype: Some(subtype.into()),
        }
    }

    /// Create a wildcard format for a kind
    pub fn any(kind: MediaKind) -> Self {
        Self {
            kind,
            subtype: None,
        }
    }

    /// Check if this format can pair with another one
    pub fn is_compatible(&self, other: &MediaFormat) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.subtype, &other.subtype) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a == b,
        }
    }

    /// Resolve the format both ends agree on, preferring the concrete subtype
    pub fn intersect(&self, other: &MediaFormat) -> Option<MediaFormat> {
        if !self.is_compatible(other) {
            return None;
        }
        if self.subtype.is_some() {
            Some(self.clone())
        } else {
            Some(other.clone())
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtype {
            Some(subtype) => write!(f, "{}/{}", self.kind.label(), subtype),
            None => write!(f, "{}/*", self.kind.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility() {
        let h264 = MediaFormat::new(MediaKind::Video, "h264");
        let any_video = MediaFormat::any(MediaKind::Video);
        let pcm = MediaFormat::new(MediaKind::Audio, "pcm");

        assert!(h264.is_compatible(&any_video));
        assert!(any_video.is_compatible(&h264));
        assert!(!h264.is_compatible(&pcm));
        assert!(!h264.is_compatible(&MediaFormat::new(MediaKind::Video, "raw")));
    }

    #[test]
    fn test_intersect_prefers_concrete() {
        let h264 = MediaFormat::new(MediaKind::Video, "h264");
        let any_video = MediaFormat::any(MediaKind::Video);

        assert_eq!(any_video.intersect(&h264), Some(h264.clone()));
        assert_eq!(h264.intersect(&any_video), Some(h264.clone()));
        assert_eq!(h264.intersect(&MediaFormat::any(MediaKind::Audio)), None);
        assert_eq!(h264.to_string(), "video/h264");
    }
}
