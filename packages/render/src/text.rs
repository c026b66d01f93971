//! Labels drawn with the bundled DejaVu Sans font.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::RenderError;

static DEJAVU_SANS: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Parses the embedded font.
///
/// # Errors
///
/// Returns [`RenderError::Font`] if the font data is unreadable.
pub fn load_font() -> Result<FontRef<'static>, RenderError> {
    FontRef::try_from_slice(DEJAVU_SANS).map_err(RenderError::Font)
}

/// Width and height in pixels of `text` at `px` pixels per em.
#[must_use]
pub fn measure(font: &FontRef<'_>, px: f32, text: &str) -> (u32, u32) {
    text_size(PxScale::from(px), font, text)
}

/// Draws `text` with its top-left corner at `(x, y)`.
pub fn draw_label(
    image: &mut RgbImage,
    font: &FontRef<'_>,
    px: f32,
    (x, y): (i32, i32),
    text: &str,
    color: Rgb<u8>,
) {
    draw_text_mut(image, color, x, y, PxScale::from(px), font, text);
}

/// Draws `text` horizontally centered in `width` pixels starting at `y`.
pub fn draw_centered(
    image: &mut RgbImage,
    font: &FontRef<'_>,
    px: f32,
    width: u32,
    y: i32,
    text: &str,
    color: Rgb<u8>,
) {
    let (text_width, _) = measure(font, px, text);
    let x = i32::try_from(width.saturating_sub(text_width) / 2).unwrap_or(0);
    draw_label(image, font, px, (x, y), text, color);
}
