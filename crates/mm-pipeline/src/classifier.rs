//! Scenario classification and engine routing.
//!
//! [`classify`] is a pure function: it looks only at the declared MIME type,
//! the declared file name, the target token and the routing table.

use mm_core::config::RoutingConfig;
use mm_core::{MediaKind, Scenario};

/// Which collaborator executes a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRoute {
    /// In-process still-image decode/encode; never touches the transcoder.
    StillImage,
    /// The general transcoding engine.
    Transcoder,
}

impl std::fmt::Display for EngineRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StillImage => write!(f, "still-image"),
            Self::Transcoder => write!(f, "transcoder"),
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub scenario: Scenario,
    pub route: EngineRoute,
    pub input_kind: MediaKind,
    pub target_kind: MediaKind,
    /// MIME type actually used, after extension fallback.
    pub input_mime: String,
    /// Normalized target token.
    pub target: String,
    /// Whether the input format may carry several frames.
    pub animated_input: bool,
}

/// The MIME type to classify by.
///
/// An empty or `application/octet-stream` declaration is replaced by the
/// MIME type of the file name's extension, when that is known.
pub fn effective_mime(declared: &str, file_name: &str) -> Option<String> {
    let declared = declared.trim().to_ascii_lowercase();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return Some(declared);
    }

    let ext = std::path::Path::new(file_name).extension()?.to_str()?;
    mm_core::mime_for_extension(ext).map(str::to_string)
}

/// Map an input and a target format onto exactly one scenario and route.
///
/// # Errors
///
/// [`mm_core::Error::UnsupportedScenario`] when the input kind or target kind
/// cannot be resolved, or the pairing has no scenario.
pub fn classify(
    input_mime: &str,
    input_name: &str,
    target: &str,
    routing: &RoutingConfig,
) -> mm_core::Result<Classification> {
    let target = mm_core::normalize_format(target);
    let unsupported = || {
        let input = if input_mime.trim().is_empty() {
            input_name.to_string()
        } else {
            input_mime.to_string()
        };
        mm_core::Error::unsupported(input, target.clone())
    };

    let mime = effective_mime(input_mime, input_name).ok_or_else(unsupported)?;
    let input_kind = MediaKind::from_mime(&mime).ok_or_else(unsupported)?;
    let target_kind = MediaKind::of_format(&target).ok_or_else(unsupported)?;
    let animated_input = input_kind == MediaKind::Image && routing.is_animated_mime(&mime);

    use MediaKind::*;
    let scenario = if animated_input && target_kind == Video {
        Scenario::AnimatedImageToVideo
    } else if input_kind == Video && target == "gif" {
        Scenario::VideoToGif
    } else {
        match (input_kind, target_kind) {
            (Image, Image) => Scenario::ImageToImage,
            (Image, Video) => Scenario::ImageToVideo,
            (Video, Image) => Scenario::VideoToImage,
            (Video, Video) => Scenario::VideoToVideo,
            (Audio, Audio) => Scenario::AudioToAudio,
            (Video, Audio) => Scenario::VideoToAudio,
            (Image, Audio) | (Audio, Image) | (Audio, Video) => return Err(unsupported()),
        }
    };

    let route = match scenario {
        Scenario::ImageToImage
            if !routing.forces_transcoder(&target)
                && !(animated_input && routing.is_animated_target(&target)) =>
        {
            EngineRoute::StillImage
        }
        _ => EngineRoute::Transcoder,
    };

    Ok(Classification {
        scenario,
        route,
        input_kind,
        target_kind,
        input_mime: mime,
        target,
        animated_input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn routing() -> RoutingConfig {
        RoutingConfig::default()
    }

    fn scenario(mime: &str, target: &str) -> Scenario {
        classify(mime, "", target, &routing()).unwrap().scenario
    }

    #[test]
    fn general_matrix() {
        assert_eq!(scenario("image/png", "jpg"), Scenario::ImageToImage);
        assert_eq!(scenario("image/png", "mp4"), Scenario::ImageToVideo);
        assert_eq!(scenario("video/mp4", "png"), Scenario::VideoToImage);
        assert_eq!(scenario("video/mp4", "webm"), Scenario::VideoToVideo);
        assert_eq!(scenario("audio/mpeg", "ogg"), Scenario::AudioToAudio);
        assert_eq!(scenario("video/webm", "mp3"), Scenario::VideoToAudio);
    }

    #[test]
    fn special_cases_take_precedence() {
        assert_eq!(scenario("image/gif", "mp4"), Scenario::AnimatedImageToVideo);
        assert_eq!(scenario("image/webp", "webm"), Scenario::AnimatedImageToVideo);
        assert_eq!(scenario("video/mp4", "gif"), Scenario::VideoToGif);
        assert_eq!(scenario("video/quicktime", ".GIF"), Scenario::VideoToGif);
    }

    #[test]
    fn unsupported_pairs_fail_closed() {
        for (mime, target) in [
            ("audio/mpeg", "png"),
            ("audio/wav", "mp4"),
            ("image/png", "mp3"),
            ("text/plain", "png"),
            ("image/png", "docx"),
            ("", "png"),
        ] {
            let err = classify(mime, "", target, &routing()).unwrap_err();
            assert_matches!(err, mm_core::Error::UnsupportedScenario { .. }, "{mime} -> {target}");
        }
    }

    #[test]
    fn extension_fallback_for_unusable_mime() {
        let c = classify("application/octet-stream", "clip.MOV", "mp4", &routing()).unwrap();
        assert_eq!(c.input_mime, "video/quicktime");
        assert_eq!(c.scenario, Scenario::VideoToVideo);

        let c = classify("", "loop.gif", "mp4", &routing()).unwrap();
        assert_eq!(c.scenario, Scenario::AnimatedImageToVideo);
    }

    #[test]
    fn static_images_take_the_still_path() {
        let c = classify("image/png", "photo.png", "jpg", &routing()).unwrap();
        assert_eq!(c.route, EngineRoute::StillImage);

        // A single-frame decode is a correct re-encode for static targets.
        let c = classify("image/gif", "loop.gif", "png", &routing()).unwrap();
        assert_eq!(c.route, EngineRoute::StillImage);
    }

    #[test]
    fn animation_preserving_targets_use_the_transcoder() {
        let c = classify("image/gif", "loop.gif", "webp", &routing()).unwrap();
        assert_eq!(c.scenario, Scenario::ImageToImage);
        assert_eq!(c.route, EngineRoute::Transcoder);

        let c = classify("image/png", "still.png", "gif", &routing()).unwrap();
        assert_eq!(c.route, EngineRoute::StillImage);
    }

    #[test]
    fn transcoder_targets_override_routing() {
        let routing = RoutingConfig {
            transcoder_targets: vec!["avif".into()],
            ..RoutingConfig::default()
        };
        let c = classify("image/png", "a.png", "avif", &routing).unwrap();
        assert_eq!(c.route, EngineRoute::Transcoder);
    }

    #[test]
    fn every_supported_pair_yields_one_scenario() {
        let inputs = ["image/png", "image/gif", "video/mp4", "audio/flac"];
        let targets = mm_core::VIDEO_FORMATS
            .iter()
            .chain(mm_core::AUDIO_FORMATS)
            .chain(mm_core::IMAGE_FORMATS);
        for mime in inputs {
            for target in targets.clone() {
                match classify(mime, "", target, &routing()) {
                    Ok(c) => {
                        assert!(Scenario::ALL.contains(&c.scenario));
                        if c.route == EngineRoute::StillImage {
                            assert_eq!(c.scenario, Scenario::ImageToImage);
                        }
                    }
                    Err(e) => assert_matches!(e, mm_core::Error::UnsupportedScenario { .. }),
                }
            }
        }
    }
}
