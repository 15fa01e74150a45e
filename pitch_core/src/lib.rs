//! Mel spectrogram rendering and pitch contour editing.

pub mod colormap;
pub mod contour;
pub mod document;
pub mod editor;
mod error;
pub mod heatmap;
pub mod render;
pub mod scale;
pub mod surface;

use base64::Engine; // for STANDARD.encode()
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, RgbaImage};

pub use document::{Contours, LoadedDocument, MagnitudeMatrix, PitchDocument, FINAL_CONTOUR};
pub use editor::{EditorEvent, EditorSession, LoadTicket, Mode, RenderCommand, Selection, ViewState};
pub use error::{PitchError, Result};
pub use render::{render_overview, Compositor, Frame, FrameTarget};
pub use scale::MelScale;

/// Encode an RGBA buffer as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    // Pre-allocate roughly what a compressed frame needs
    let mut png_bytes: Vec<u8> = Vec::with_capacity(image.as_raw().len() / 4);
    let encoder = PngEncoder::new(&mut png_bytes);
    encoder.write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)?;
    Ok(png_bytes)
}

/// Encode an RGBA buffer as base64 PNG, the form frames travel in over JSON.
pub fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let png_bytes = encode_png(image)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png_bytes))
}
