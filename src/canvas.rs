use crate::artifact::Artifact;
use crate::error::Result;
use image::{
    Pixel, Rgba, RgbaImage,
    imageops::{self, FilterType},
};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Shapes that can restrict where drawing lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipPath {
    RoundedRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
    },
}

impl ClipPath {
    /// Whether the point lies inside the shape. Edges count as inside.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        match *self {
            ClipPath::RoundedRect {
                x,
                y,
                width,
                height,
                radius,
            } => {
                if px < x || py < y || px > x + width || py > y + height {
                    return false;
                }

                let radius = radius.min(width / 2.0).min(height / 2.0);

                // Distance from the nearest corner centre, only relevant when
                // the point sits in one of the four corner squares.
                let cx = px.clamp(x + radius, x + width - radius);
                let cy = py.clamp(y + radius, y + height - radius);
                let (dx, dy) = (px - cx, py - cy);
                dx * dx + dy * dy <= radius * radius
            }
            ClipPath::Circle { cx, cy, radius } => {
                let (dx, dy) = (px - cx, py - cy);
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

/// A drawing surface with a single optional clip region. Pixels are tested
/// against the clip at their centres, so there is no anti-aliasing.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
    clip: Option<ClipPath>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Canvas {
            pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
            clip: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = TRANSPARENT;
        }
        self.clip = None;
    }

    pub fn clip(&mut self, path: ClipPath) {
        self.clip = Some(path);
    }

    fn visible(&self, x: u32, y: u32) -> bool {
        match &self.clip {
            Some(path) => path.contains(x as f32 + 0.5, y as f32 + 0.5),
            None => true,
        }
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for y in 0..self.height() {
            for x in 0..self.width() {
                if self.visible(x, y) {
                    self.pixels.get_pixel_mut(x, y).blend(&color);
                }
            }
        }
    }

    /// Draws `image` scaled into the destination rectangle, composited over
    /// whatever is already on the surface. Parts falling outside the surface
    /// or the clip are dropped.
    pub fn draw_image(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) {
        let dest_width = (width.round() as u32).max(1);
        let dest_height = (height.round() as u32).max(1);

        let scaled;
        let source = if image.dimensions() == (dest_width, dest_height) {
            image
        } else {
            scaled = imageops::resize(image, dest_width, dest_height, FilterType::Triangle);
            &scaled
        };

        let (left, top) = (x.round() as i64, y.round() as i64);
        for (sx, sy, pixel) in source.enumerate_pixels() {
            let (tx, ty) = (left + sx as i64, top + sy as i64);
            if tx < 0 || ty < 0 || tx >= self.width() as i64 || ty >= self.height() as i64 {
                continue;
            }

            let (tx, ty) = (tx as u32, ty as u32);
            if self.visible(tx, ty) {
                self.pixels.get_pixel_mut(tx, ty).blend(pixel);
            }
        }
    }

    pub fn export(&self) -> Result<Artifact> {
        Artifact::from_image(self.pixels())
    }
}
