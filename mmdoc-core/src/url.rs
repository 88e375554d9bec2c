//! URL field types
//!
//! URLs are validated on assignment. Remote URLs must parse as absolute
//! URLs; anything that fails only for lack of a scheme is kept as a local
//! path. Typed kinds additionally reject paths whose extension clearly
//! belongs to another kind of resource. Fetching is left to the caller.

use std::fmt;
use std::path::Path;

use ::url::{ParseError, Url};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The resource a URL is expected to point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlKind {
    /// Any resource
    Any,

    /// Image file
    Image,

    /// Text file
    Text,

    /// Audio file
    Audio,

    /// Video file
    Video,

    /// 3D mesh
    Mesh3D,

    /// 3D point cloud
    PointCloud3D,
}

impl UrlKind {
    /// Every URL kind
    pub const ALL: [UrlKind; 7] = [
        UrlKind::Any,
        UrlKind::Image,
        UrlKind::Text,
        UrlKind::Audio,
        UrlKind::Video,
        UrlKind::Mesh3D,
        UrlKind::PointCloud3D,
    ];

    /// Type name of this URL kind
    pub fn name(self) -> &'static str {
        match self {
            UrlKind::Any => "AnyUrl",
            UrlKind::Image => "ImageUrl",
            UrlKind::Text => "TextUrl",
            UrlKind::Audio => "AudioUrl",
            UrlKind::Video => "VideoUrl",
            UrlKind::Mesh3D => "Mesh3DUrl",
            UrlKind::PointCloud3D => "PointCloud3DUrl",
        }
    }

    /// File extensions accepted for this kind; `None` accepts any extension
    pub fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            UrlKind::Any => None,
            UrlKind::Image => Some(&["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"]),
            UrlKind::Text => Some(&["txt", "md", "rst", "html", "htm", "csv", "tsv", "json", "xml", "log"]),
            UrlKind::Audio => Some(&["wav", "mp3", "flac", "ogg", "m4a", "aac"]),
            UrlKind::Video => Some(&["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"]),
            UrlKind::Mesh3D | UrlKind::PointCloud3D => Some(&["obj", "glb", "gltf", "ply", "off", "stl"]),
        }
    }
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated URL or local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocUrl {
    kind: UrlKind,
    raw: String,
    parsed: Option<Url>,
}

impl DocUrl {
    /// Validate `raw` as a URL of the given kind
    pub fn parse(kind: UrlKind, raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(Error::url_rule(kind.name(), "URL must not be empty"));
        }

        let parsed = match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(ParseError::RelativeUrlWithoutBase) => None,
            Err(e) => return Err(Error::url_rule(kind.name(), format!("'{raw}' is not a valid URL: {e}"))),
        };

        let url = Self { kind, raw, parsed };
        url.check_extension()?;
        Ok(url)
    }

    /// Create an untyped URL
    pub fn any(raw: impl Into<String>) -> Result<Self> {
        Self::parse(UrlKind::Any, raw)
    }

    fn check_extension(&self) -> Result<()> {
        let (Some(allowed), Some(ext)) = (self.kind.extensions(), self.extension()) else {
            return Ok(());
        };

        if allowed.contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(Error::url_rule(
                self.kind.name(),
                format!("extension '.{ext}' of '{}' is not one of {allowed:?}", self.raw),
            ))
        }
    }

    /// Re-validate this URL as another kind
    pub fn with_kind(self, kind: UrlKind) -> Result<Self> {
        if kind == self.kind {
            return Ok(self);
        }
        let url = Self { kind, ..self };
        url.check_extension()?;
        Ok(url)
    }

    /// Get the URL kind
    pub fn kind(&self) -> UrlKind {
        self.kind
    }

    /// Get the URL as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether this is an absolute URL rather than a local path
    pub fn is_remote(&self) -> bool {
        self.parsed.is_some()
    }

    /// Get the parsed URL, if remote
    pub fn url(&self) -> Option<&Url> {
        self.parsed.as_ref()
    }

    /// Get the host of a remote URL
    pub fn host(&self) -> Option<&str> {
        self.parsed.as_ref().and_then(Url::host_str)
    }

    /// Lowercase file extension of the last path segment
    pub fn extension(&self) -> Option<String> {
        let path = match &self.parsed {
            Some(url) => url.path(),
            None => self.raw.as_str(),
        };
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Display for DocUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
