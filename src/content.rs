//! Video type detection.
//!
//! Drive reports a content type for most downloads, but large or unusual
//! files often come back as `application/octet-stream`. In that case the
//! filename from `Content-Disposition` is the only remaining signal.

use std::path::Path;

use mime_guess::mime::Mime;

/// Content types accepted into the cache.
pub const SUPPORTED_MIME_TYPES: [&str; 6] = [
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
];

/// File extensions accepted into the cache, with the leading dot.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = [".mp4", ".webm", ".ogg", ".mov", ".avi", ".mkv"];

/// Content types that say nothing about the payload.
const GENERIC_MIME_TYPES: [&str; 5] = [
    "application/octet-stream",
    "binary/octet-stream",
    "application/download",
    "application/x-download",
    "application/force-download",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    Mp4,
    Webm,
    Ogg,
    QuickTime,
    Avi,
    Matroska,
}

impl VideoKind {
    pub const ALL: [VideoKind; 6] = [
        VideoKind::Mp4,
        VideoKind::Webm,
        VideoKind::Ogg,
        VideoKind::QuickTime,
        VideoKind::Avi,
        VideoKind::Matroska,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            VideoKind::Mp4 => "video/mp4",
            VideoKind::Webm => "video/webm",
            VideoKind::Ogg => "video/ogg",
            VideoKind::QuickTime => "video/quicktime",
            VideoKind::Avi => "video/x-msvideo",
            VideoKind::Matroska => "video/x-matroska",
        }
    }

    /// Extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            VideoKind::Mp4 => "mp4",
            VideoKind::Webm => "webm",
            VideoKind::Ogg => "ogg",
            VideoKind::QuickTime => "mov",
            VideoKind::Avi => "avi",
            VideoKind::Matroska => "mkv",
        }
    }

    pub fn from_mime(essence: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime_type().eq_ignore_ascii_case(essence))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }
}

/// Outcome of [`classify_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentClass {
    Video(VideoKind),
    /// Carries the detected type for diagnostics (`"unknown"` when nothing
    /// usable was reported).
    Unsupported(String),
}

/// Decides whether a download is a supported video from its response
/// headers alone.
///
/// A specific content type is authoritative. The filename hint is only
/// consulted when the content type is missing, unparsable or generic.
pub fn classify_content(content_type: Option<&str>, filename_hint: Option<&str>) -> ContentClass {
    let raw = content_type.map(str::trim).filter(|value| !value.is_empty());
    let essence = raw.map(|value| match value.parse::<Mime>() {
        Ok(mime) => mime.essence_str().to_ascii_lowercase(),
        Err(_) => value.to_ascii_lowercase(),
    });

    if let Some(essence) = essence.as_deref() {
        if let Some(kind) = VideoKind::from_mime(essence) {
            return ContentClass::Video(kind);
        }
        if !GENERIC_MIME_TYPES.contains(&essence) {
            return ContentClass::Unsupported(essence.to_string());
        }
    }

    if let Some(kind) = filename_hint.and_then(VideoKind::from_path) {
        return ContentClass::Video(kind);
    }

    ContentClass::Unsupported(essence.unwrap_or_else(|| "unknown".to_string()))
}

/// Content type used when serving a cached file back to clients.
pub fn serving_mime(path: &Path) -> Mime {
    VideoKind::from_path(path)
        .and_then(|kind| kind.mime_type().parse::<Mime>().ok())
        .or_else(|| mime_guess::from_path(path).first())
        .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_type_maps_to_a_kind() {
        for mime in SUPPORTED_MIME_TYPES {
            assert!(matches!(
                classify_content(Some(mime), None),
                ContentClass::Video(_)
            ));
        }
        assert_eq!(VideoKind::ALL.len(), SUPPORTED_EXTENSIONS.len());
        for kind in VideoKind::ALL {
            assert!(SUPPORTED_EXTENSIONS.contains(&format!(".{}", kind.extension()).as_str()));
        }
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        assert_eq!(
            classify_content(Some("Video/MP4; charset=binary"), None),
            ContentClass::Video(VideoKind::Mp4)
        );
    }

    #[test]
    fn specific_non_video_type_is_rejected_even_with_video_name() {
        assert_eq!(
            classify_content(Some("application/pdf"), Some("clip.mp4")),
            ContentClass::Unsupported("application/pdf".into())
        );
        assert_eq!(
            classify_content(Some("text/html; charset=utf-8"), None),
            ContentClass::Unsupported("text/html".into())
        );
    }

    #[test]
    fn generic_type_falls_back_to_extension() {
        assert_eq!(
            classify_content(Some("application/octet-stream"), Some("Holiday.MKV")),
            ContentClass::Video(VideoKind::Matroska)
        );
        assert_eq!(
            classify_content(None, Some("talk.mov")),
            ContentClass::Video(VideoKind::QuickTime)
        );
        assert_eq!(
            classify_content(Some("application/octet-stream"), Some("notes.txt")),
            ContentClass::Unsupported("application/octet-stream".into())
        );
    }

    #[test]
    fn nothing_known_is_unsupported() {
        assert_eq!(
            classify_content(None, None),
            ContentClass::Unsupported("unknown".into())
        );
        assert_eq!(
            classify_content(Some("   "), None),
            ContentClass::Unsupported("unknown".into())
        );
    }

    #[test]
    fn serving_mime_prefers_video_table() {
        assert_eq!(serving_mime(Path::new("a.ogg")).essence_str(), "video/ogg");
        assert_eq!(serving_mime(Path::new("a.mkv")).essence_str(), "video/x-matroska");
        assert_eq!(serving_mime(Path::new("a.txt")).essence_str(), "text/plain");
    }
}
