//! Application state for an interactive session and the commands that
//! change it. Every failure is caught at the command that caused it and
//! left in [`AppState::error`] for the view to show.

use crate::artifact::{self, Artifact};
use crate::compositor::Compositor;
use crate::encode::{Encoder, QrEncoder};
use crate::error::{Error, Result};
use crate::logo;
use crate::scanner::{ScanConfig, ScanWidget, ScannerAdapter};
use crate::upload::RawImageFile;
use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
};

#[derive(Debug, Default)]
pub struct AppState {
    pub text: String,
    pub logo: Option<Artifact>,
    /// Name of the file behind `logo`, as a file picker would show it.
    pub logo_file: Option<String>,
    pub artifact: Option<Artifact>,
    pub error: Option<String>,
    pub busy: bool,
    pub scanning: bool,
    pub last_download: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetText(String),
    UploadLogo(PathBuf),
    RemoveLogo,
    Generate,
    Download(PathBuf),
    /// Text read back by the scanner.
    Scanned(String),
}

// Holds the busy flag up for as long as it lives.
struct Busy<'a>(&'a mut bool);

impl<'a> Busy<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Busy(flag)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

pub struct App<E = QrEncoder> {
    state: AppState,
    compositor: Compositor<E>,
}

impl Default for App<QrEncoder> {
    fn default() -> Self {
        App::new(Compositor::default())
    }
}

impl<E: Encoder> App<E> {
    pub fn new(compositor: Compositor<E>) -> Self {
        App {
            state: AppState::default(),
            compositor,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn apply(&mut self, action: Action) {
        tracing::debug!(?action, "applying action");

        match action {
            Action::SetText(text) => self.state.text = text,
            Action::UploadLogo(path) => self.upload_logo(path).await,
            Action::RemoveLogo => {
                self.state.logo = None;
                self.state.logo_file = None;
            }
            Action::Generate => self.generate().await,
            Action::Download(directory) => self.download(&directory),
            Action::Scanned(text) => {
                self.state.text = text;
                self.state.error = None;
            }
        }
    }

    async fn upload_logo(&mut self, path: PathBuf) {
        match prepare_logo(path).await {
            Ok((name, logo)) => {
                self.state.logo = Some(logo);
                self.state.logo_file = Some(name);
                self.state.error = None;
            }
            Err(err) => self.fail("logo upload", err),
        }
    }

    async fn generate(&mut self) {
        if self.state.busy {
            tracing::debug!("generation already in progress");
            return;
        }

        let state = &mut self.state;
        let _busy = Busy::raise(&mut state.busy);

        match self
            .compositor
            .compose(&state.text, state.logo.as_ref())
            .await
        {
            Ok(artifact) => {
                state.artifact = Some(artifact);
                state.error = None;
            }
            Err(Error::EmptyText) => state.error = Some(Error::EmptyText.to_string()),
            Err(err) => {
                tracing::warn!(error = ?err, "generation failed");
                state.artifact = None;
                state.error = Some(err.to_string());
            }
        }
    }

    fn download(&mut self, directory: &Path) {
        match artifact::download(self.state.artifact.as_ref(), directory) {
            Ok(path) => {
                self.state.last_download = Some(path);
                self.state.error = None;
            }
            Err(err) => self.fail("download", err),
        }
    }

    /// Runs one scan and, on success, puts the decoded text into the input.
    pub async fn scan<W: ScanWidget>(
        &mut self,
        scanner: &mut ScannerAdapter<W>,
        config: ScanConfig,
    ) {
        self.state.scanning = true;
        let result = scanner.scan(config, |_| {}).await;
        self.state.scanning = false;

        tracing::debug!(state = ?scanner.state(), "scan finished");
        scanner.deactivate();

        match result {
            Ok(Some(text)) => self.apply(Action::Scanned(text)).await,
            Ok(None) => self.state.error = Some("No QR code found".to_string()),
            Err(err) => self.fail("scan", err),
        }
    }

    fn fail(&mut self, during: &str, err: Error) {
        if err.is_validation() {
            tracing::info!(during, error = %err, "rejected input");
        } else {
            tracing::warn!(during, error = ?err, "action failed");
        }
        self.state.error = Some(err.to_string());
    }
}

async fn prepare_logo(path: PathBuf) -> Result<(String, Artifact)> {
    tokio::task::spawn_blocking(move || -> Result<(String, Artifact)> {
        let file = RawImageFile::open(&path)?;
        let logo = logo::preprocess(&file)?;
        Ok((file.name, logo))
    })
    .await
    .map_err(|err| Error::Io(std::io::Error::other(err)))?
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

impl From<&Artifact> for Preview {
    fn from(artifact: &Artifact) -> Self {
        Preview {
            width: artifact.width(),
            height: artifact.height(),
            bytes: artifact.as_png().len(),
        }
    }
}

/// What the screen should show for a given state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub input: String,
    pub logo_file: Option<String>,
    pub logo: Option<Preview>,
    pub remove_logo: Button,
    pub generate: Button,
    pub qr_code: Option<Preview>,
    pub download: Button,
    pub scan: Button,
    pub last_download: Option<String>,
    pub error: Option<String>,
}

pub fn render(state: &AppState) -> View {
    View {
        input: state.text.clone(),
        logo_file: state.logo_file.clone(),
        logo: state.logo.as_ref().map(Preview::from),
        remove_logo: Button {
            label: "Remove Logo",
            enabled: state.logo.is_some(),
        },
        generate: Button {
            label: if state.busy {
                "Generating..."
            } else {
                "Generate QR Code"
            },
            enabled: !state.busy,
        },
        qr_code: state.artifact.as_ref().map(Preview::from),
        download: Button {
            label: "Download PNG",
            enabled: state.artifact.is_some(),
        },
        scan: Button {
            label: if state.scanning {
                "Scanning..."
            } else {
                "Scan QR Code"
            },
            enabled: !state.scanning,
        },
        last_download: state
            .last_download
            .as_ref()
            .map(|path| path.display().to_string()),
        error: state.error.clone(),
    }
}

fn button(f: &mut fmt::Formatter<'_>, button: &Button) -> fmt::Result {
    if button.enabled {
        write!(f, "[{}]", button.label)
    } else {
        write!(f, "({})", button.label)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "text: {:?}", self.input)?;

        match (&self.logo_file, &self.logo) {
            (Some(name), Some(logo)) => {
                write!(f, "logo: {} ({}x{}) ", name, logo.width, logo.height)?;
                button(f, &self.remove_logo)?;
                writeln!(f)?;
            }
            _ => writeln!(f, "logo: none")?,
        }

        button(f, &self.generate)?;
        write!(f, " ")?;
        button(f, &self.scan)?;
        writeln!(f)?;

        if let Some(qr) = &self.qr_code {
            write!(f, "qr code: {}x{}, {} bytes ", qr.width, qr.height, qr.bytes)?;
            button(f, &self.download)?;
            writeln!(f)?;
        }
        if let Some(path) = &self.last_download {
            writeln!(f, "saved: {}", path)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "error: {}", error)?;
        }

        Ok(())
    }
}
