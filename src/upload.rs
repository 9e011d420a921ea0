use crate::error::{Error, Result};
use image::{DynamicImage, ImageReader};
use std::{fs, io::Cursor, path::Path};

/// Largest logo file accepted, in bytes (5 MiB).
pub const MAX_LOGO_BYTES: u64 = 5 * 1024 * 1024;

/// An image file as picked by the user, not yet decoded.
#[derive(Debug, Clone)]
pub struct RawImageFile {
    pub name: String,
    bytes: Vec<u8>,
}

impl RawImageFile {
    /// Reads a file from disk. The size is checked against the file metadata
    /// first so oversized files are never read into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let size = fs::metadata(path)?.len();
        if size > MAX_LOGO_BYTES {
            tracing::warn!(path = %path.display(), size, "rejecting oversized logo");
            return Err(Error::logo_too_large(size));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_bytes(name, fs::read(path)?)
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let size = bytes.len() as u64;
        if size > MAX_LOGO_BYTES {
            return Err(Error::logo_too_large(size));
        }

        Ok(RawImageFile {
            name: name.into(),
            bytes,
        })
    }

    /// Decodes the file, sniffing the format from its contents rather than
    /// trusting the name.
    pub fn decode(&self) -> Result<DynamicImage> {
        let image = ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()?
            .decode()?;

        Ok(image)
    }
}
