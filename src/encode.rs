use crate::canvas::{BLACK, WHITE};
use anyhow::Context;
use clap::ValueEnum;
use image::RgbaImage;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

/// How much of the symbol may be damaged while it still scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    /// ~7%
    Low,
    /// ~15%
    Medium,
    /// ~25%
    Quartile,
    /// ~30%, needed when a logo covers the centre.
    #[default]
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrOptions {
    pub error_correction: ErrorCorrection,
    /// Edge length of the rendered bitmap in pixels.
    pub width: u32,
    /// Light modules around the symbol.
    pub margin: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        QrOptions {
            error_correction: ErrorCorrection::High,
            width: 400,
            margin: 1,
        }
    }
}

// Renders text into a square, opaque bitmap. Implementations own the whole
// QR algorithm; callers only place the result.
pub trait Encoder: Send + Sync + 'static {
    fn encode(&self, text: &str, options: &QrOptions) -> anyhow::Result<RgbaImage>;
}

/// [`Encoder`] backed by the `qrcode` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrEncoder;

impl Encoder for QrEncoder {
    fn encode(&self, text: &str, options: &QrOptions) -> anyhow::Result<RgbaImage> {
        let code = QrCode::with_error_correction_level(text, options.error_correction.into())
            .context("Could not encode text")?;

        tracing::debug!(
            version = ?code.version(),
            modules = code.width(),
            "encoded text"
        );

        Ok(rasterize(code.width(), &code.to_colors(), options))
    }
}

/// Scales a module grid onto exactly `options.width` pixels. The scale is
/// fractional, so modules may differ by one pixel in size.
pub fn rasterize(modules: usize, colors: &[Color], options: &QrOptions) -> RgbaImage {
    let margin = options.margin as usize;
    let span = modules + 2 * margin;
    let scale = options.width as f64 / span as f64;

    RgbaImage::from_fn(options.width, options.width, |x, y| {
        let column = (x as f64 / scale) as usize;
        let row = (y as f64 / scale) as usize;

        let dark = column >= margin
            && row >= margin
            && column - margin < modules
            && row - margin < modules
            && colors[(row - margin) * modules + (column - margin)] == Color::Dark;

        if dark { BLACK } else { WHITE }
    })
}
