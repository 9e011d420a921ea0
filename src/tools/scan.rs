use crate::{
    scanner::{FrameScanner, ImageFiles, QrBox, ScanConfig, ScannerAdapter},
    tool::{Output, Tool},
};
use anyhow::{Context, Result, anyhow};
use clap::{Command, CommandFactory, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scan", about = "Read a QR code from a sequence of camera frames")]
pub struct ScanTool {
    /// Frame images, scanned in the given order
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Frames sampled per second
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Centred region searched in each frame, "SIZE" or "WIDTHxHEIGHT"
    #[arg(long, default_value = "250")]
    qrbox: QrBox,
}

impl Tool for ScanTool {
    fn cli() -> Command {
        ScanTool::command()
    }

    fn execute(&self) -> Result<Option<Output>> {
        let text = tokio::runtime::Runtime::new()
            .context("Could not create tokio runtime")?
            .block_on(self.run())
            .context("Could not scan frames")?;

        Ok(Some(Output::Text(text)))
    }
}

impl ScanTool {
    async fn run(&self) -> Result<String> {
        let config = ScanConfig {
            fps: self.fps,
            qrbox: self.qrbox,
        };

        let source = ImageFiles::new(self.frames.iter().cloned());
        let mut scanner = ScannerAdapter::new(FrameScanner::new(source));

        scanner
            .scan(config, |_| {})
            .await?
            .ok_or_else(|| anyhow!("No QR code found in {} frame(s)", self.frames.len()))
    }
}
