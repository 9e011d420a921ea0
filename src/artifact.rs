use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbaImage};
use std::{
    fmt,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

/// A finished, exportable raster. Stored as lossless PNG bytes so that
/// holding on to it can never be affected by later drawing.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl Artifact {
    pub fn from_image(image: &RgbaImage) -> Result<Self> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        Ok(Artifact {
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        let image = image::load_from_memory_with_format(&self.png, ImageFormat::Png)?;
        Ok(image.to_rgba8())
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&self.png)
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.png)?;
        Ok(())
    }

    /// Saves into `directory` as `qrcode-<unix-epoch-ms>.png` and returns the
    /// path that was written.
    pub fn download(&self, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(download_file_name(chrono::Utc::now().timestamp_millis()));
        self.save(&path)?;

        tracing::info!(path = %path.display(), "downloaded qr code");
        Ok(path)
    }
}

// Keep the png bytes out of debug output.
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.png.len())
            .finish()
    }
}

pub fn download_file_name(epoch_ms: i64) -> String {
    format!("qrcode-{}.png", epoch_ms)
}

/// Saves an optional artifact, failing the way a download button with nothing
/// behind it would.
pub fn download(artifact: Option<&Artifact>, directory: &Path) -> Result<PathBuf> {
    artifact.ok_or(Error::NoArtifact)?.download(directory)
}
