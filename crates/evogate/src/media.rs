//! Media reference classification and resolution.
//!
//! Only local and platform-internal sources are resolved to bytes in this
//! process; the gateway fetches remote URLs itself, so those pass through
//! unresolved. Inline payloads travel base64-encoded, capped at
//! `max_inline_bytes`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tracing::debug;

use crate::error::ResolutionError;

/// Scheme prefix of platform media-source references.
pub const PLATFORM_SCHEME: &str = "media-source://";

/// Default cap on inline payload size (16 MiB of raw bytes).
pub const DEFAULT_MAX_INLINE_BYTES: u64 = 16 * 1024 * 1024;

/// Kind of media being sent; drives the gateway `mediatype` field and the
/// fallback MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
    Sticker,
}

impl MediaKind {
    /// The gateway `mediatype` value. Only image/video/document travel on
    /// the generic media endpoint; audio and stickers have their own.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Sticker => "sticker",
        }
    }

    /// Parse a caller-supplied kind for the generic media action.
    pub fn parse_sendable(raw: &str) -> Option<MediaKind> {
        match raw {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "document" => Some(MediaKind::Document),
            _ => None,
        }
    }

    fn default_mime(self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
            MediaKind::Document => "application/pdf",
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Sticker => "image/webp",
        }
    }
}

/// A classified media reference. Constructed per call, resolved once,
/// discarded after the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// Platform media-source URI, resolved by the host collaborator.
    PlatformUri(String),
    /// Absolute local filesystem path.
    LocalPath(PathBuf),
    /// Remote URL, passed to the gateway unresolved.
    RemoteUrl(String),
}

impl MediaReference {
    /// Classify a raw reference string. First match wins: platform scheme,
    /// then absolute path, then remote URL.
    pub fn classify(raw: &str) -> MediaReference {
        let trimmed = raw.trim();
        if trimmed.starts_with(PLATFORM_SCHEME) {
            MediaReference::PlatformUri(trimmed.to_string())
        } else if Path::new(trimmed).is_absolute() {
            MediaReference::LocalPath(PathBuf::from(trimmed))
        } else {
            MediaReference::RemoteUrl(trimmed.to_string())
        }
    }
}

/// A transmittable media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    /// Base64-encoded bytes for the gateway's inline transport.
    Inline { base64: String, mime: String },
    /// Direct URL the gateway fetches itself.
    Url(String),
}

impl ResolvedMedia {
    /// The value placed in the gateway's media field (URL or base64 blob).
    pub fn media_value(&self) -> &str {
        match self {
            ResolvedMedia::Inline { base64, .. } => base64,
            ResolvedMedia::Url(url) => url,
        }
    }

    /// MIME type for the wire body, falling back to the kind default for
    /// URL payloads the gateway fetches itself.
    pub fn mime_or_default(&self, kind: MediaKind) -> String {
        match self {
            ResolvedMedia::Inline { mime, .. } => mime.clone(),
            ResolvedMedia::Url(url) => mime_for(url, kind).to_string(),
        }
    }
}

/// Host collaborator that turns a platform media-source reference into bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> std::io::Result<Bytes>;
}

/// Resolves heterogeneous media references into transmittable payloads.
pub struct MediaResolver {
    source: Option<Arc<dyn MediaSource>>,
    max_inline_bytes: u64,
}

impl Default for MediaResolver {
    fn default() -> Self {
        Self {
            source: None,
            max_inline_bytes: DEFAULT_MAX_INLINE_BYTES,
        }
    }
}

impl MediaResolver {
    pub fn new(source: Option<Arc<dyn MediaSource>>, max_inline_bytes: u64) -> Self {
        Self {
            source,
            max_inline_bytes,
        }
    }

    /// Resolve a raw reference for the given kind.
    pub async fn resolve(
        &self,
        raw: &str,
        kind: MediaKind,
    ) -> Result<ResolvedMedia, ResolutionError> {
        match MediaReference::classify(raw) {
            MediaReference::PlatformUri(uri) => self.resolve_platform(&uri, kind).await,
            MediaReference::LocalPath(path) => self.resolve_local(&path, kind).await,
            MediaReference::RemoteUrl(url) => Self::resolve_remote(&url),
        }
    }

    async fn resolve_platform(
        &self,
        uri: &str,
        kind: MediaKind,
    ) -> Result<ResolvedMedia, ResolutionError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ResolutionError::UnsupportedScheme(uri.to_string()))?;
        let bytes = source
            .fetch(uri)
            .await
            .map_err(|e| ResolutionError::UnreadableSource {
                reference: uri.to_string(),
                reason: e.to_string(),
            })?;
        if bytes.len() as u64 > self.max_inline_bytes {
            return Err(ResolutionError::PayloadTooLarge {
                size: bytes.len() as u64,
                limit: self.max_inline_bytes,
            });
        }
        debug!(uri, size = bytes.len(), "resolved platform media source");
        Ok(ResolvedMedia::Inline {
            base64: BASE64.encode(&bytes),
            mime: mime_for(uri, kind).to_string(),
        })
    }

    /// Size and regularity are checked against metadata before any read, so
    /// an oversized file is rejected without touching its contents. The file
    /// handle is scoped to `tokio::fs::read` and released on every exit
    /// path, including read errors and cancellation.
    async fn resolve_local(
        &self,
        path: &Path,
        kind: MediaKind,
    ) -> Result<ResolvedMedia, ResolutionError> {
        let reference = path.display().to_string();
        let meta =
            tokio::fs::metadata(path)
                .await
                .map_err(|e| ResolutionError::UnreadableSource {
                    reference: reference.clone(),
                    reason: e.to_string(),
                })?;
        if !meta.is_file() {
            return Err(ResolutionError::UnreadableSource {
                reference,
                reason: "not a regular file".to_string(),
            });
        }
        if meta.len() > self.max_inline_bytes {
            return Err(ResolutionError::PayloadTooLarge {
                size: meta.len(),
                limit: self.max_inline_bytes,
            });
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ResolutionError::UnreadableSource {
                reference: reference.clone(),
                reason: e.to_string(),
            })?;
        debug!(path = %reference, size = bytes.len(), "resolved local media file");
        Ok(ResolvedMedia::Inline {
            base64: BASE64.encode(&bytes),
            mime: mime_for(&reference, kind).to_string(),
        })
    }

    fn resolve_remote(url: &str) -> Result<ResolvedMedia, ResolutionError> {
        let parsed =
            url::Url::parse(url).map_err(|_| ResolutionError::UnsupportedScheme(url.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(ResolvedMedia::Url(url.to_string())),
            _ => Err(ResolutionError::UnsupportedScheme(url.to_string())),
        }
    }
}

/// MIME type from the reference's extension, with a per-kind fallback.
fn mime_for(reference: &str, kind: MediaKind) -> &'static str {
    let ext = reference
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "mp3" => "audio/mpeg",
        "ogg" | "opus" => "audio/ogg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        _ => kind.default_mime(),
    }
}
