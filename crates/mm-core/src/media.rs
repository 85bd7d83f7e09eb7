//! Media-domain tables: media kinds, conversion scenarios, encoder selection,
//! and MIME helpers.
//!
//! All enums serialize in kebab/lowercase and implement `Display` manually
//! for consistent string representation. The encoder tables are total: every
//! format token, known or not, maps to an encoder.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Format tables
// ---------------------------------------------------------------------------

/// Target tokens that resolve to [`MediaKind::Video`].
pub const VIDEO_FORMATS: &[&str] = &["mp4", "webm", "mkv", "mov", "avi", "m4v", "flv"];

/// Target tokens that resolve to [`MediaKind::Audio`].
pub const AUDIO_FORMATS: &[&str] = &["mp3", "wav", "ogg", "aac", "m4a", "flac", "opus"];

/// Target tokens that resolve to [`MediaKind::Image`].
pub const IMAGE_FORMATS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff", "ico", "avif",
];

/// Extension to MIME type table used when a declared MIME type is unusable.
const EXTENSION_MIME: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("apng", "image/apng"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("ico", "image/x-icon"),
    ("avif", "image/avif"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("flv", "video/x-flv"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("aac", "audio/aac"),
    ("m4a", "audio/mp4"),
    ("flac", "audio/flac"),
    ("opus", "audio/opus"),
];

/// Lowercase a user-supplied format token and drop a leading dot.
pub fn normalize_format(token: &str) -> String {
    token.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Look up the MIME type for a file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = normalize_format(ext);
    EXTENSION_MIME
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Pick a file extension for a MIME type (first table entry wins).
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let mime = mime.trim().to_ascii_lowercase();
    EXTENSION_MIME
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
}

/// The MIME type tagged on converted output: `<kind>/<format>`.
///
/// Returns `None` when the format token is not in any kind table.
pub fn output_mime(target: &str) -> Option<String> {
    let target = normalize_format(target);
    MediaKind::of_format(&target).map(|kind| format!("{}/{}", kind.mime_prefix(), target))
}

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Broad media category of an input file or a target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classify a MIME type by its top-level prefix.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let (prefix, subtype) = mime.split_once('/')?;
        if subtype.is_empty() {
            return None;
        }
        match prefix {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Classify a target format token by table membership.
    pub fn of_format(format: &str) -> Option<Self> {
        let format = normalize_format(format);
        let format = format.as_str();
        if VIDEO_FORMATS.contains(&format) {
            Some(Self::Video)
        } else if AUDIO_FORMATS.contains(&format) {
            Some(Self::Audio)
        } else if IMAGE_FORMATS.contains(&format) {
            Some(Self::Image)
        } else {
            None
        }
    }

    /// The MIME top-level type for this kind.
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Whether this kind is time-based (video or audio).
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_prefix())
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// The classified conversion path for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    ImageToImage,
    ImageToVideo,
    VideoToImage,
    VideoToVideo,
    AudioToAudio,
    VideoToAudio,
    AnimatedImageToVideo,
    VideoToGif,
}

impl Scenario {
    /// Every scenario, in declaration order.
    pub const ALL: [Scenario; 8] = [
        Self::ImageToImage,
        Self::ImageToVideo,
        Self::VideoToImage,
        Self::VideoToVideo,
        Self::AudioToAudio,
        Self::VideoToAudio,
        Self::AnimatedImageToVideo,
        Self::VideoToGif,
    ];

    /// Number of transcoding engine invocations this scenario performs.
    pub fn engine_passes(&self) -> usize {
        match self {
            Self::VideoToGif => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ImageToImage => "image-to-image",
            Self::ImageToVideo => "image-to-video",
            Self::VideoToImage => "video-to-image",
            Self::VideoToVideo => "video-to-video",
            Self::AudioToAudio => "audio-to-audio",
            Self::VideoToAudio => "video-to-audio",
            Self::AnimatedImageToVideo => "animated-image-to-video",
            Self::VideoToGif => "video-to-gif",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Video encoder chosen for a target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoEncoder {
    H264,
    Vp9,
    Gif,
}

impl VideoEncoder {
    /// Select the encoder for a target format. Unknown formats get H.264.
    pub fn for_format(target: &str) -> Self {
        match normalize_format(target).as_str() {
            "webm" => Self::Vp9,
            "gif" => Self::Gif,
            _ => Self::H264,
        }
    }

    /// The ffmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Vp9 => "libvpx-vp9",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Audio encoder chosen for a target container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoder {
    Mp3,
    Aac,
    Vorbis,
    Pcm,
    Flac,
    Opus,
}

impl AudioEncoder {
    /// Select the encoder for a target format. Unknown formats get AAC.
    pub fn for_format(target: &str) -> Self {
        match normalize_format(target).as_str() {
            "mp3" => Self::Mp3,
            "aac" | "m4a" => Self::Aac,
            "ogg" => Self::Vorbis,
            "wav" => Self::Pcm,
            "flac" => Self::Flac,
            // WebM cannot carry AAC.
            "opus" | "webm" => Self::Opus,
            _ => Self::Aac,
        }
    }

    /// The ffmpeg encoder name.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Vorbis => "libvorbis",
            Self::Pcm => "pcm_s16le",
            Self::Flac => "flac",
            Self::Opus => "libopus",
        }
    }
}

impl fmt::Display for AudioEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}
