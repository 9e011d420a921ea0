//! Turns an arbitrary uploaded picture into the round badge that sits in the
//! middle of a generated code.

use crate::artifact::Artifact;
use crate::canvas::{Canvas, ClipPath, WHITE};
use crate::error::{Error, Result};
use crate::upload::RawImageFile;
use image::RgbaImage;

/// Edge length of the finished logo.
pub const LOGO_SIZE: u32 = 100;
/// Gap between the plate edge and the circular picture.
pub const LOGO_BORDER: u32 = 10;
/// Corner radius of the white backing plate.
pub const PLATE_RADIUS: f32 = 20.0;

const CIRCLE_DIAMETER: f32 = (LOGO_SIZE - 2 * LOGO_BORDER) as f32;

/// Produces a 100x100 logo: a white rounded plate with the source picture
/// scaled to fit and cropped to a centred circle of diameter 80.
pub fn preprocess(file: &RawImageFile) -> Result<Artifact> {
    let source = file.decode()?.to_rgba8();
    let artifact = badge(&source)?;
    tracing::info!(
        source = %file.name,
        source_width = source.width(),
        source_height = source.height(),
        "prepared logo"
    );

    Ok(artifact)
}

// Decoders refuse zero-sized images, but the scale below divides by the
// source size, so guard it here as well.
fn badge(source: &RgbaImage) -> Result<Artifact> {
    let (source_width, source_height) = source.dimensions();
    if source_width == 0 || source_height == 0 {
        return Err(Error::EmptyImage);
    }

    let size = LOGO_SIZE as f32;
    let mut canvas = Canvas::new(LOGO_SIZE, LOGO_SIZE);

    canvas.clip(ClipPath::RoundedRect {
        x: 0.0,
        y: 0.0,
        width: size,
        height: size,
        radius: PLATE_RADIUS,
    });
    canvas.fill(WHITE);

    let scale = (CIRCLE_DIAMETER / source_width as f32).min(CIRCLE_DIAMETER / source_height as f32);
    let width = source_width as f32 * scale;
    let height = source_height as f32 * scale;

    canvas.clip(ClipPath::Circle {
        cx: size / 2.0,
        cy: size / 2.0,
        radius: CIRCLE_DIAMETER / 2.0,
    });
    canvas.draw_image(source, (size - width) / 2.0, (size - height) / 2.0, width, height);
    tracing::debug!(scale, "scaled logo source");

    canvas.export()
}
