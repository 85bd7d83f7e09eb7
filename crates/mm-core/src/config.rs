//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs. Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::normalize_format;
use crate::Error;

/// 100 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
    pub routing: RoutingConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse a config file. Unlike [`Config::load_or_default`], a
    /// missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.limits.max_input_bytes == 0 {
            warnings.push("limits.max_input_bytes is 0; every input will be rejected".into());
        }

        let c = &self.conversion;
        if c.frame_rate == 0 {
            warnings.push("conversion.frame_rate is 0; encodes will fail".into());
        }
        if c.frame_batch_size == 0 {
            warnings.push("conversion.frame_batch_size is 0; treated as 1".into());
        }
        if c.extraction_share == 0 || c.extraction_share >= 100 {
            warnings.push(format!(
                "conversion.extraction_share {} leaves no room for one of the two phases",
                c.extraction_share
            ));
        }
        if c.gif_width % 2 == 1 {
            warnings.push(format!("conversion.gif_width {} is odd", c.gif_width));
        }

        if let Some(ref p) = self.tools.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        for target in &self.routing.transcoder_targets {
            if crate::MediaKind::of_format(target) != Some(crate::MediaKind::Image) {
                warnings.push(format!(
                    "routing.transcoder_targets entry '{target}' is not an image format"
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Input size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_input_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Encode parameters for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Constant frame rate for still-to-video and animated-image-to-video.
    pub frame_rate: u32,
    /// Clip length for image-to-video.
    pub still_clip_secs: u32,
    /// Frames handed to the transcoder per batch.
    pub frame_batch_size: usize,
    /// Percent of the progress range reserved for frame extraction.
    pub extraction_share: u8,
    pub gif_fps: u32,
    pub gif_width: u32,
    pub snapshot_max_width: u32,
    pub engine_timeout_secs: u64,
}

impl ConversionConfig {
    /// Per-invocation engine timeout.
    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// Batch size, never zero.
    pub fn batch_size(&self) -> usize {
        self.frame_batch_size.max(1)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            still_clip_secs: 5,
            frame_batch_size: 10,
            extraction_share: 40,
            gif_fps: 10,
            gif_width: 480,
            snapshot_max_width: 1280,
            engine_timeout_secs: 3600,
        }
    }
}

/// Decides which engine handles image-to-image jobs.
///
/// A static image conversion goes to the still-image engine unless the
/// target is listed in `transcoder_targets`, or the input is animated-capable
/// and the target can hold animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Input formats (MIME subtypes) that may carry several frames.
    pub animated_formats: Vec<String>,
    /// Target formats that can hold animation.
    pub animated_targets: Vec<String>,
    /// Image targets that always go to the transcoding engine.
    pub transcoder_targets: Vec<String>,
}

impl RoutingConfig {
    /// Whether a MIME type names an animated-capable image format.
    pub fn is_animated_mime(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.split_once('/') {
            Some(("image", subtype)) => self.animated_formats.iter().any(|f| f == subtype),
            _ => false,
        }
    }

    /// Whether a target format can hold animation.
    pub fn is_animated_target(&self, target: &str) -> bool {
        let target = normalize_format(target);
        self.animated_targets.iter().any(|t| *t == target)
    }

    /// Whether an image target is pinned to the transcoding engine.
    pub fn forces_transcoder(&self, target: &str) -> bool {
        let target = normalize_format(target);
        self.transcoder_targets.iter().any(|t| *t == target)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            animated_formats: vec!["gif".into(), "webp".into(), "apng".into()],
            animated_targets: vec!["gif".into(), "webp".into()],
            transcoder_targets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.limits.max_input_bytes, 104_857_600);
        assert_eq!(cfg.conversion.frame_rate, 25);
        assert_eq!(cfg.conversion.still_clip_secs, 5);
        assert_eq!(cfg.conversion.frame_batch_size, 10);
        assert_eq!(cfg.conversion.extraction_share, 40);
        assert!(cfg.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn parse_toml_config() {
        let toml = r#"
            [limits]
            max_input_bytes = 1024

            [conversion]
            frame_batch_size = 4
        "#;
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.limits.max_input_bytes, 1024);
        assert_eq!(cfg.conversion.frame_batch_size, 4);
        assert_eq!(cfg.conversion.frame_rate, 25);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.limits.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn parse_invalid_toml_is_validation_error() {
        let err = Config::from_toml("limits = 3").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/mediamorph.toml")));
        assert_eq!(cfg.conversion.frame_rate, 25);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mediamorph.toml");
        std::fs::write(&path, "[conversion]\ngif_fps = 15\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.conversion.gif_fps, 15);
    }

    #[test]
    fn zero_batch_size_warns_and_clamps() {
        let mut cfg = Config::default();
        cfg.conversion.frame_batch_size = 0;
        assert!(cfg.validate().iter().any(|w| w.contains("frame_batch_size")));
        assert_eq!(cfg.conversion.batch_size(), 1);
    }

    #[test]
    fn non_image_transcoder_target_warns() {
        let mut cfg = Config::default();
        cfg.routing.transcoder_targets.push("mp4".into());
        assert!(cfg.validate().iter().any(|w| w.contains("'mp4'")));
    }

    #[test]
    fn routing_predicates() {
        let routing = RoutingConfig::default();
        assert!(routing.is_animated_mime("image/gif"));
        assert!(routing.is_animated_mime("IMAGE/WEBP"));
        assert!(!routing.is_animated_mime("image/png"));
        assert!(!routing.is_animated_mime("video/gif"));
        assert!(routing.is_animated_target("GIF"));
        assert!(!routing.is_animated_target("png"));
        assert!(!routing.forces_transcoder("png"));
    }
}
