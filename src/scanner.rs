//! Reading codes back from a stream of frames.
//!
//! The decoding widget sits behind [`ScanWidget`]; [`ScannerAdapter`] turns it
//! into a single-shot scan that hands the first decoded text to the caller
//! and releases the widget afterwards.

use crate::error::{Error, Result};
use anyhow::Context;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, path::PathBuf, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrBox {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Frames sampled per second.
    pub fps: u32,
    /// Centred region of each frame that is searched for a code.
    pub qrbox: QrBox,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            fps: 10,
            qrbox: QrBox {
                width: 250,
                height: 250,
            },
        }
    }
}

/// Why a single frame produced no text. None of these stop a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("No QR code found in frame")]
    NotFound,
    #[error("Could not decode QR code: {0}")]
    Decode(String),
    #[error("Could not read frame: {0:#}")]
    Frame(anyhow::Error),
}

// Shortest gap between two sampled frames, whatever the configured rate.
const MIN_FRAME_PERIOD: Duration = Duration::from_millis(1);

pub type DecodeCallback = Box<dyn FnMut(String) + Send>;
pub type ErrorCallback = Box<dyn FnMut(ScanError) + Send>;

/// Something that yields camera-like frames. `None` means the stream ended.
pub trait FrameSource: Send + 'static {
    fn next_frame(&mut self) -> Option<anyhow::Result<DynamicImage>>;
}

impl FrameSource for VecDeque<DynamicImage> {
    fn next_frame(&mut self) -> Option<anyhow::Result<DynamicImage>> {
        self.pop_front().map(Ok)
    }
}

/// Frames read lazily from image files, in order.
#[derive(Debug, Clone)]
pub struct ImageFiles {
    paths: VecDeque<PathBuf>,
}

impl ImageFiles {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        ImageFiles {
            paths: paths.into_iter().collect(),
        }
    }
}

impl FrameSource for ImageFiles {
    fn next_frame(&mut self) -> Option<anyhow::Result<DynamicImage>> {
        let path = self.paths.pop_front()?;
        Some(image::open(&path).with_context(|| format!("Could not open {}", path.display())))
    }
}

// The narrow interface of a camera scanning widget.
pub trait ScanWidget {
    fn start(
        &mut self,
        config: ScanConfig,
        on_decode: DecodeCallback,
        on_error: ErrorCallback,
    ) -> Result<()>;

    // Must release every resource the widget holds. Safe to call repeatedly.
    fn stop(&mut self);
}

/// A [`ScanWidget`] that samples a [`FrameSource`] at the configured rate and
/// decodes the qrbox region of each frame. Must be started from within a
/// tokio runtime.
pub struct FrameScanner<S: FrameSource> {
    source: Option<S>,
    task: Option<JoinHandle<()>>,
}

impl<S: FrameSource> FrameScanner<S> {
    pub fn new(source: S) -> Self {
        FrameScanner {
            source: Some(source),
            task: None,
        }
    }
}

impl<S: FrameSource> ScanWidget for FrameScanner<S> {
    fn start(
        &mut self,
        config: ScanConfig,
        mut on_decode: DecodeCallback,
        mut on_error: ErrorCallback,
    ) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::Scanner("already started".to_string()));
        }
        let mut source = self
            .source
            .take()
            .ok_or_else(|| Error::Scanner("frame source was released".to_string()))?;

        let period = frame_period(config.fps);
        tracing::debug!(?config, "starting frame scanner");

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;

                let Some(frame) = source.next_frame() else {
                    tracing::debug!("frame source exhausted");
                    break;
                };

                let decoded = match frame {
                    Ok(frame) => {
                        tokio::task::spawn_blocking(move || decode_frame(&frame, config.qrbox))
                            .await
                            .unwrap_or_else(|err| Err(ScanError::Frame(err.into())))
                    }
                    Err(err) => Err(ScanError::Frame(err)),
                };

                match decoded {
                    Ok(text) => on_decode(text),
                    Err(err) => on_error(err),
                }
            }
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("stopped frame scanner");
        }
        self.source = None;
    }
}

impl<S: FrameSource> Drop for FrameScanner<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn frame_period(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64).max(MIN_FRAME_PERIOD)
}

/// Looks for a code inside the centred `qrbox` of `frame`.
pub fn decode_frame(frame: &DynamicImage, qrbox: QrBox) -> std::result::Result<String, ScanError> {
    let width = qrbox.width.min(frame.width());
    let height = qrbox.height.min(frame.height());
    let x = (frame.width() - width) / 2;
    let y = (frame.height() - height) / 2;
    let region = frame.crop_imm(x, y, width, height).to_luma8();

    // Codes touching the box edge need a light border to be found.
    let pad = (width.max(height) / 10).max(8) as i64;
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        (width as i64 + 2 * pad) as usize,
        (height as i64 + 2 * pad) as usize,
        |px, py| {
            let (px, py) = (px as i64 - pad, py as i64 - pad);
            if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                255
            } else {
                region.get_pixel(px as u32, py as u32)[0]
            }
        },
    );

    let mut failure = ScanError::NotFound;
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_, content)) => return Ok(content),
            Err(err) => failure = ScanError::Decode(err.to_string()),
        }
    }

    Err(failure)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerState {
    Inactive,
    Scanning,
    Stopped,
}

/// Drives a [`ScanWidget`] through a single scan.
pub struct ScannerAdapter<W: ScanWidget> {
    widget: W,
    state: ScannerState,
    decoded: Option<mpsc::UnboundedReceiver<String>>,
}

impl<W: ScanWidget> ScannerAdapter<W> {
    pub fn new(widget: W) -> Self {
        ScannerAdapter {
            widget,
            state: ScannerState::Inactive,
            decoded: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn activate(&mut self, config: ScanConfig) -> Result<()> {
        if self.state == ScannerState::Scanning {
            return Err(Error::Scanner("already scanning".to_string()));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.widget.start(
            config,
            Box::new(move |text: String| {
                // The receiver is gone once the first result was taken.
                let _ = sender.send(text);
            }),
            Box::new(|err: ScanError| tracing::debug!(%err, "frame skipped")),
        )?;

        self.decoded = Some(receiver);
        self.state = ScannerState::Scanning;
        Ok(())
    }

    /// Waits for the first decoded text, hands it to `on_scan` and shuts the
    /// widget down. Returns `None` if the frames ran out first.
    pub async fn wait<F: FnOnce(&str)>(&mut self, on_scan: F) -> Result<Option<String>> {
        let Some(receiver) = self.decoded.as_mut() else {
            return Err(Error::Scanner("scanner is not active".to_string()));
        };

        let received = receiver.recv().await;
        match received {
            Some(text) => {
                tracing::info!(chars = text.chars().count(), "scanned qr code");
                on_scan(&text);
                self.release(ScannerState::Stopped);
                Ok(Some(text))
            }
            None => {
                self.release(ScannerState::Inactive);
                Ok(None)
            }
        }
    }

    pub async fn scan<F: FnOnce(&str)>(
        &mut self,
        config: ScanConfig,
        on_scan: F,
    ) -> Result<Option<String>> {
        self.activate(config)?;
        self.wait(on_scan).await
    }

    pub fn deactivate(&mut self) {
        self.release(ScannerState::Inactive);
    }

    fn release(&mut self, state: ScannerState) {
        self.widget.stop();
        self.decoded = None;
        self.state = state;
    }
}

impl<W: ScanWidget> Drop for ScannerAdapter<W> {
    fn drop(&mut self) {
        self.widget.stop();
    }
}
