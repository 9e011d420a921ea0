use crate::artifact::Artifact;
use crate::canvas::Canvas;
use crate::encode::{Encoder, QrEncoder, QrOptions};
use crate::error::{Error, Result};
use crate::logo::LOGO_SIZE;
use anyhow::anyhow;
use image::RgbaImage;
use std::sync::Arc;

/// Draws codes onto a single working surface. Composing borrows the
/// compositor mutably, so one generation runs at a time.
pub struct Compositor<E = QrEncoder> {
    encoder: Arc<E>,
    options: QrOptions,
    surface: Canvas,
}

impl Default for Compositor<QrEncoder> {
    fn default() -> Self {
        Compositor::new(QrEncoder, QrOptions::default())
    }
}

impl<E: Encoder> Compositor<E> {
    pub fn new(encoder: E, options: QrOptions) -> Self {
        Compositor {
            encoder: Arc::new(encoder),
            options,
            surface: Canvas::new(options.width, options.width),
        }
    }

    /// Encodes `text` and, if given, lays the logo over the centre.
    ///
    /// The logo is only drawn once the encoded bitmap is on the surface and
    /// the logo itself has been decoded.
    pub async fn compose(&mut self, text: &str, logo: Option<&Artifact>) -> Result<Artifact> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }

        self.surface.clear();

        let encoded = encode(self.encoder.clone(), text.to_string(), self.options).await?;
        let size = self.options.width as f32;
        self.surface.draw_image(&encoded, 0.0, 0.0, size, size);

        if let Some(logo) = logo {
            let image = load_image(logo.clone()).await?;
            let offset = (self.options.width as f32 - LOGO_SIZE as f32) / 2.0;
            let logo_size = LOGO_SIZE as f32;
            self.surface.draw_image(&image, offset, offset, logo_size, logo_size);
        }

        let artifact = self.surface.export()?;
        tracing::info!(
            chars = text.chars().count(),
            logo = logo.is_some(),
            bytes = artifact.as_png().len(),
            "generated qr code"
        );

        Ok(artifact)
    }
}

async fn encode<E: Encoder>(
    encoder: Arc<E>,
    text: String,
    options: QrOptions,
) -> Result<RgbaImage> {
    tokio::task::spawn_blocking(move || encoder.encode(&text, &options))
        .await
        .map_err(|err| Error::Encoding(anyhow!(err)))?
        .map_err(Error::Encoding)
}

async fn load_image(artifact: Artifact) -> Result<RgbaImage> {
    tokio::task::spawn_blocking(move || artifact.decode())
        .await
        .map_err(|err| Error::Io(std::io::Error::other(err)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, WHITE};
    use crate::logo;
    use crate::upload::RawImageFile;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEncoder(Arc<AtomicUsize>);

    impl Encoder for CountingEncoder {
        fn encode(&self, text: &str, options: &QrOptions) -> anyhow::Result<RgbaImage> {
            self.0.fetch_add(1, Ordering::SeqCst);
            QrEncoder.encode(text, options)
        }
    }

    struct FailingEncoder;

    impl Encoder for FailingEncoder {
        fn encode(&self, _: &str, _: &QrOptions) -> anyhow::Result<RgbaImage> {
            Err(anyhow!("capacity exceeded"))
        }
    }

    fn red_logo() -> Artifact {
        let image = RgbaImage::from_pixel(50, 50, Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        logo::preprocess(&RawImageFile::from_bytes("red.png", bytes).unwrap()).unwrap()
    }

    fn decode(artifact: &Artifact) -> String {
        let image = artifact.decode().unwrap();
        let luma = image::DynamicImage::ImageRgba8(image).to_luma8();

        // Pad with a wider quiet zone than the one-module margin.
        let pad = 40;
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            (luma.width() + 2 * pad) as usize,
            (luma.height() + 2 * pad) as usize,
            |x, y| {
                let (x, y) = (x as i64 - pad as i64, y as i64 - pad as i64);
                if x < 0 || y < 0 || x >= luma.width() as i64 || y >= luma.height() as i64 {
                    255
                } else {
                    luma.get_pixel(x as u32, y as u32)[0]
                }
            },
        );
        let grids = prepared.detect_grids();
        let (_, content) = grids.first().unwrap().decode().unwrap();
        content
    }

    #[tokio::test]
    async fn test_compose_without_logo_decodes() {
        let mut compositor: Compositor = Compositor::default();
        let artifact = compositor.compose("https://example.com", None).await.unwrap();

        assert_eq!((artifact.width(), artifact.height()), (400, 400));
        assert_eq!(decode(&artifact), "https://example.com");
    }

    #[tokio::test]
    async fn test_compose_with_logo_still_decodes() {
        let mut compositor: Compositor = Compositor::default();
        let artifact = compositor.compose("hello", Some(&red_logo())).await.unwrap();

        let image = artifact.decode().unwrap();
        assert_eq!(image.get_pixel(200, 200), &Rgba([255, 0, 0, 255]));
        // Plate corner sits outside the rounded rect, so the code shows through.
        let corner = image.get_pixel(150, 150);
        assert!(*corner == WHITE || *corner == BLACK);
        assert!(image.pixels().all(|p| p[3] == 255));

        assert_eq!(decode(&artifact), "hello");
    }

    #[tokio::test]
    async fn test_empty_text_never_encodes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut compositor = Compositor::new(CountingEncoder(calls.clone()), QrOptions::default());

        for text in ["", "   ", "\n\t"] {
            let result = compositor.compose(text, None).await;
            assert!(matches!(result, Err(Error::EmptyText)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        compositor.compose("ok", None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_encoder_failure() {
        let mut compositor = Compositor::new(FailingEncoder, QrOptions::default());
        let result = compositor.compose("anything", None).await;

        let Err(err) = result else {
            unreachable!()
        };
        assert!(matches!(err, Error::Encoding(_)));
        assert_eq!(err.to_string(), "Failed to generate QR code");
    }

    #[tokio::test]
    async fn test_oversized_text_fails_encoding() {
        let mut compositor: Compositor = Compositor::default();
        let result = compositor.compose(&"x".repeat(4000), None).await;
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[tokio::test]
    async fn test_previous_logo_does_not_leak() {
        let mut compositor: Compositor = Compositor::default();
        let plain = compositor.compose("same text", None).await.unwrap();
        compositor
            .compose("same text", Some(&red_logo()))
            .await
            .unwrap();
        let again = compositor.compose("same text", None).await.unwrap();

        assert_eq!(plain, again);
    }

    #[tokio::test]
    async fn test_logo_is_not_mutated() {
        let logo = red_logo();
        let before = logo.clone();
        let mut compositor: Compositor = Compositor::default();
        compositor.compose("hello", Some(&logo)).await.unwrap();
        assert_eq!(logo, before);
    }
}
