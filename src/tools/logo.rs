use crate::{
    logo,
    tool::{Output, Tool},
    upload::RawImageFile,
};
use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "logo",
    about = "Turn an image into a round 100x100 logo for placing on QR codes"
)]
pub struct LogoTool {
    /// Image file to convert (at most 5MB)
    file: PathBuf,

    /// Save the logo to file (PNG format) instead of printing a data URL
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Tool for LogoTool {
    fn cli() -> Command {
        LogoTool::command()
    }

    fn execute(&self) -> Result<Option<Output>> {
        let file = RawImageFile::open(&self.file)
            .with_context(|| format!("Could not read {}", self.file.display()))?;
        let logo = logo::preprocess(&file).context("Could not prepare logo")?;

        match &self.output {
            Some(path) => {
                logo.save(path).context("Failed to save logo image")?;
                Ok(None)
            }
            None => Ok(Some(Output::Text(logo.to_data_url()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::MAX_LOGO_BYTES;
    use image::{Rgba, RgbaImage};
    use std::fs;

    fn write_source(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("source.png");
        RgbaImage::from_pixel(30, 60, Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let tool = LogoTool {
            file: write_source(dir.path()),
            output: None,
        };

        let Some(Output::Text(url)) = tool.execute().unwrap() else {
            unreachable!()
        };
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("logo.png");
        let tool = LogoTool {
            file: write_source(dir.path()),
            output: Some(output.clone()),
        };
        assert!(tool.execute().unwrap().is_none());

        let logo = image::open(&output).unwrap().to_rgba8();
        assert_eq!(logo.dimensions(), (100, 100));
        assert_eq!(logo.get_pixel(50, 50), &Rgba([0, 0, 255, 255]));
        assert_eq!(logo.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.png");
        fs::File::create(&path)
            .unwrap()
            .set_len(MAX_LOGO_BYTES + 1)
            .unwrap();

        let result = LogoTool {
            file: path,
            output: None,
        }
        .execute();

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Logo file size must be less than 5MB"));
    }
}
