use thiserror::Error;

use crate::upload::MAX_LOGO_BYTES;

/// Everything that can go wrong while preparing a logo, composing a code,
/// downloading it or scanning one. The display strings are shown to the user
/// as-is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Please enter text to generate QR code")]
    EmptyText,

    #[error("Logo file size must be less than 5MB")]
    LogoTooLarge { size: u64 },

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Failed to generate QR code")]
    Encoding(#[source] anyhow::Error),

    #[error("No QR code to download")]
    NoArtifact,

    #[error("Could not process image")]
    Image(#[from] image::ImageError),

    #[error("Could not access file")]
    Io(#[from] std::io::Error),

    #[error("Scanner failed: {0}")]
    Scanner(String),
}

impl Error {
    /// Validation errors are the ones the user fixes by changing their input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyText | Error::LogoTooLarge { .. })
    }

    pub(crate) fn logo_too_large(size: u64) -> Self {
        debug_assert!(size > MAX_LOGO_BYTES);
        Error::LogoTooLarge { size }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
