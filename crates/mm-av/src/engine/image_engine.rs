//! Still-image engine backed by the `image` crate.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageError, ImageFormat};

use super::{Frame, StillImageEngine};

const ENGINE: &str = "still-image";

/// In-process [`StillImageEngine`].
///
/// Animated GIF, WebP and APNG inputs are expanded into composited frames;
/// everything else decodes to a single frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }
}

fn decode_error(e: ImageError) -> mm_core::Error {
    mm_core::Error::tool(ENGINE, format!("decode failed: {e}"))
}

fn collect<'a>(decoder: impl AnimationDecoder<'a>) -> mm_core::Result<Vec<Frame>> {
    let frames = decoder.into_frames().collect_frames().map_err(decode_error)?;
    Ok(frames
        .into_iter()
        .map(|f| Frame::new(DynamicImage::ImageRgba8(f.into_buffer())))
        .collect())
}

impl StillImageEngine for ImageEngine {
    fn decode(&self, data: &[u8]) -> mm_core::Result<Frame> {
        image::load_from_memory(data)
            .map(Frame::new)
            .map_err(decode_error)
    }

    fn decode_frames(&self, data: &[u8]) -> mm_core::Result<Vec<Frame>> {
        let format = image::guess_format(data).map_err(decode_error)?;

        let frames = match format {
            ImageFormat::Gif => collect(GifDecoder::new(Cursor::new(data)).map_err(decode_error)?)?,
            ImageFormat::WebP => {
                let decoder = WebPDecoder::new(Cursor::new(data)).map_err(decode_error)?;
                if decoder.has_animation() {
                    collect(decoder)?
                } else {
                    vec![self.decode(data)?]
                }
            }
            ImageFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(data)).map_err(decode_error)?;
                if decoder.is_apng().map_err(decode_error)? {
                    collect(decoder.apng().map_err(decode_error)?)?
                } else {
                    vec![self.decode(data)?]
                }
            }
            _ => vec![self.decode(data)?],
        };

        if frames.is_empty() {
            return Err(mm_core::Error::tool(ENGINE, "image contains no frames"));
        }
        tracing::trace!("decoded {} frame(s) from {format:?}", frames.len());
        Ok(frames)
    }

    fn encode(&self, frame: &Frame, format: &str) -> mm_core::Result<Vec<u8>> {
        let token = mm_core::normalize_format(format);
        let image_format = ImageFormat::from_extension(&token)
            .filter(|f| f.writing_enabled())
            .ok_or_else(|| mm_core::Error::UnsupportedTargetFormat(token.clone()))?;

        // JPEG has no alpha channel.
        let converted;
        let image = if image_format == ImageFormat::Jpeg {
            converted = DynamicImage::ImageRgb8(frame.image().to_rgb8());
            &converted
        } else {
            frame.image()
        };

        let mut out = Cursor::new(Vec::new());
        match image.write_to(&mut out, image_format) {
            Ok(()) => Ok(out.into_inner()),
            Err(ImageError::Unsupported(e)) => {
                tracing::debug!("{token} encode unsupported: {e}");
                Err(mm_core::Error::UnsupportedTargetFormat(token))
            }
            Err(e) => Err(mm_core::Error::tool(ENGINE, format!("encode failed: {e}"))),
        }
    }
}
