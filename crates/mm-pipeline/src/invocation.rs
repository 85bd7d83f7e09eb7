//! Transcoder argument vectors and working-file names.
//!
//! Nothing here fails: every scenario and every target token yields an
//! argument vector, with unknown targets falling through the encoder tables
//! to their defaults.

use mm_core::config::ConversionConfig;
use mm_core::{AudioEncoder, Scenario, VideoEncoder};

/// Name of the generated palette for two-pass GIF encodes.
pub const PALETTE_NAME: &str = "palette.png";

/// Input pattern matching [`frame_name`].
pub const FRAME_PATTERN: &str = "frame-%04d.png";

/// Share of the progress range given to palette generation.
const PALETTE_SHARE: f64 = 30.0;

/// Forces even output dimensions, which yuv420p encoders require.
const EVEN_SCALE: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Working name of frame `index` (0-based).
pub fn frame_name(index: usize) -> String {
    format!("frame-{index:04}.png")
}

/// Working name of the job input.
///
/// The extension comes from the declared name, falling back to the MIME
/// subtype, then to `bin`.
pub fn input_name(declared_name: &str, mime: &str) -> String {
    let from_name = std::path::Path::new(declared_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(mm_core::normalize_format)
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    let ext = from_name
        .or_else(|| mm_core::extension_for_mime(mime).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());

    format!("input.{ext}")
}

/// Working name of the job output.
pub fn output_name(target: &str) -> String {
    format!("output.{}", mm_core::normalize_format(target))
}

/// One transcoder invocation and its slice of the progress range.
#[derive(Debug, Clone, PartialEq)]
pub struct EnginePass {
    /// Short label used for progress steps and logs.
    pub label: &'static str,
    pub args: Vec<String>,
    /// Working file this pass writes.
    pub produces: String,
    /// Progress percent at the start of the pass.
    pub start: f64,
    /// Progress percent when the pass completes.
    pub end: f64,
}

fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// The argument vector for a scenario's final transcoder pass.
///
/// For [`Scenario::VideoToGif`] this is the palette-based encode; see
/// [`palette_args`] for the first pass. For
/// [`Scenario::AnimatedImageToVideo`] `input` is ignored and the frame
/// sequence pattern is used.
pub fn build(
    scenario: Scenario,
    input: &str,
    output: &str,
    target: &str,
    config: &ConversionConfig,
) -> Vec<String> {
    let video = VideoEncoder::for_format(target).ffmpeg_name();
    let audio = AudioEncoder::for_format(target).ffmpeg_name();

    match scenario {
        Scenario::ImageToImage => to_args(&["-i", input, output]),
        Scenario::ImageToVideo => {
            let secs = config.still_clip_secs.to_string();
            let rate = config.frame_rate.to_string();
            to_args(&[
                "-loop",
                "1",
                "-i",
                input,
                "-t",
                secs.as_str(),
                "-r",
                rate.as_str(),
                "-c:v",
                video,
                "-pix_fmt",
                "yuv420p",
                "-vf",
                EVEN_SCALE,
                output,
            ])
        }
        Scenario::VideoToImage => {
            let scale = format!("scale='min({},iw)':-2", config.snapshot_max_width);
            to_args(&["-i", input, "-vf", scale.as_str(), "-frames:v", "1", output])
        }
        Scenario::VideoToVideo => {
            to_args(&["-i", input, "-c:v", video, "-c:a", audio, output])
        }
        Scenario::AudioToAudio | Scenario::VideoToAudio => {
            to_args(&["-i", input, "-vn", "-c:a", audio, output])
        }
        Scenario::AnimatedImageToVideo => frame_sequence_args(output, target, config),
        Scenario::VideoToGif => palette_encode_args(input, PALETTE_NAME, output, config),
    }
}

fn gif_filter(config: &ConversionConfig) -> String {
    format!(
        "fps={},scale={}:-1:flags=lanczos",
        config.gif_fps, config.gif_width
    )
}

/// First GIF pass: build a reduced palette from the source.
pub fn palette_args(input: &str, palette: &str, config: &ConversionConfig) -> Vec<String> {
    let filter = format!("{},palettegen=stats_mode=diff", gif_filter(config));
    to_args(&["-i", input, "-vf", filter.as_str(), palette])
}

/// Second GIF pass: encode through the generated palette.
pub fn palette_encode_args(
    input: &str,
    palette: &str,
    output: &str,
    config: &ConversionConfig,
) -> Vec<String> {
    let filter = format!("{}[x];[x][1:v]paletteuse=dither=bayer", gif_filter(config));
    to_args(&["-i", input, "-i", palette, "-lavfi", filter.as_str(), output])
}

/// Encode the registered frame sequence at a constant frame rate.
pub fn frame_sequence_args(output: &str, target: &str, config: &ConversionConfig) -> Vec<String> {
    let rate = config.frame_rate.to_string();
    let video = VideoEncoder::for_format(target).ffmpeg_name();
    to_args(&[
        "-framerate",
        rate.as_str(),
        "-i",
        FRAME_PATTERN,
        "-c:v",
        video,
        "-pix_fmt",
        "yuv420p",
        "-vf",
        EVEN_SCALE,
        output,
    ])
}

/// Percent of the progress range reserved for frame extraction.
pub fn extraction_share(config: &ConversionConfig) -> f64 {
    f64::from(config.extraction_share.clamp(1, 99))
}

/// Every transcoder pass a scenario performs, in order, with its progress
/// slice.
pub fn passes(
    scenario: Scenario,
    input: &str,
    output: &str,
    target: &str,
    config: &ConversionConfig,
) -> Vec<EnginePass> {
    match scenario {
        Scenario::VideoToGif => vec![
            EnginePass {
                label: "palette",
                args: palette_args(input, PALETTE_NAME, config),
                produces: PALETTE_NAME.to_string(),
                start: 0.0,
                end: PALETTE_SHARE,
            },
            EnginePass {
                label: "encode",
                args: palette_encode_args(input, PALETTE_NAME, output, config),
                produces: output.to_string(),
                start: PALETTE_SHARE,
                end: 100.0,
            },
        ],
        Scenario::AnimatedImageToVideo => vec![EnginePass {
            label: "encode",
            args: frame_sequence_args(output, target, config),
            produces: output.to_string(),
            start: extraction_share(config),
            end: 100.0,
        }],
        _ => vec![EnginePass {
            label: "encode",
            args: build(scenario, input, output, target, config),
            produces: output.to_string(),
            start: 0.0,
            end: 100.0,
        }],
    }
}
