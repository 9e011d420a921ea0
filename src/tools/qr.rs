use crate::{
    args::StringInput,
    compositor::Compositor,
    encode::{ErrorCorrection, QrEncoder, QrOptions},
    logo,
    tool::{Output, Tool},
    upload::RawImageFile,
};
use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qr", about = "Generate QR codes, optionally with a logo in the middle")]
pub struct QRTool {
    /// The text or URL to encode as QR code (use "-" for stdin)
    text: StringInput,

    /// Image to place in the centre of the code (at most 5MB)
    #[arg(short, long)]
    logo: Option<PathBuf>,

    /// Save QR code to file (PNG format)
    #[arg(short, long, conflicts_with = "download")]
    output: Option<PathBuf>,

    /// Save QR code as qrcode-<unix-ms>.png into this directory
    #[arg(short, long)]
    download: Option<PathBuf>,

    /// Error correction level
    #[arg(long, value_enum, default_value_t = ErrorCorrection::High)]
    error_correction: ErrorCorrection,
}

impl Tool for QRTool {
    fn cli() -> Command {
        QRTool::command()
    }

    fn execute(&self) -> Result<Option<Output>> {
        tokio::runtime::Runtime::new()
            .context("Could not create tokio runtime")?
            .block_on(self.run())
    }
}

impl QRTool {
    async fn run(&self) -> Result<Option<Output>> {
        let logo = match &self.logo {
            Some(path) => {
                let file = RawImageFile::open(path)
                    .with_context(|| format!("Could not read logo {}", path.display()))?;
                Some(logo::preprocess(&file).context("Could not prepare logo")?)
            }
            None => None,
        };

        let options = QrOptions {
            error_correction: self.error_correction,
            ..QrOptions::default()
        };
        let code = Compositor::new(QrEncoder, options)
            .compose(self.text.as_ref(), logo.as_ref())
            .await
            .context("Could not generate QR code")?;

        if let Some(output_path) = &self.output {
            code.save(output_path)
                .context("Failed to save QR code image")?;
            Ok(None)
        } else if let Some(directory) = &self.download {
            let path = code
                .download(directory)
                .context("Failed to download QR code image")?;
            Ok(Some(Output::Text(path.display().to_string())))
        } else {
            Ok(Some(Output::Bytes(code.as_png().to_vec())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::fs;

    fn tool(text: &str) -> QRTool {
        QRTool {
            text: StringInput(text.to_string()),
            logo: None,
            output: None,
            download: None,
            error_correction: ErrorCorrection::High,
        }
    }

    #[test]
    fn test_png_to_stdout() {
        let result = tool("https://example.com").execute().unwrap().unwrap();

        let Output::Bytes(bytes) = result else {
            unreachable!()
        };
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (400, 400));
    }

    #[test]
    fn test_save_with_logo() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(50, 50, Rgba([255, 0, 0, 255]))
            .save(&logo_path)
            .unwrap();
        let output = dir.path().join("out.png");

        let tool = QRTool {
            logo: Some(logo_path),
            output: Some(output.clone()),
            ..tool("hello")
        };
        assert!(tool.execute().unwrap().is_none());

        let image = image::open(&output).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(200, 200), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_download_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = QRTool {
            download: Some(dir.path().to_path_buf()),
            ..tool("hello")
        };

        let Some(Output::Text(path)) = tool.execute().unwrap() else {
            unreachable!()
        };
        let path = PathBuf::from(path);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("qrcode-") && name.ends_with(".png"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_empty_text() {
        let result = tool("   ").execute();

        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Could not generate QR code"));
        assert!(message.contains("Please enter text to generate QR code"));
    }

    #[test]
    fn test_missing_logo() {
        let tool = QRTool {
            logo: Some(PathBuf::from("/no/such/logo.png")),
            ..tool("hello")
        };
        let result = tool.execute();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Could not read logo"));
    }
}
