use crate::{
    app::{Action, App, render},
    encode::Encoder,
    scanner::{FrameScanner, ImageFiles, QrBox, ScanConfig, ScannerAdapter},
    tool::{Output, Tool},
};
use anyhow::{Context, Result};
use clap::{Command, CommandFactory, Parser};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

const HELP: &str = "\
commands:
  text <TEXT>          set the text to encode
  logo <FILE>          upload a logo image (at most 5MB)
  remove-logo          drop the current logo
  generate             generate the QR code
  download [DIR]       save the QR code as qrcode-<unix-ms>.png (default: .)
  scan <FRAME>...      scan frame images and use the decoded text
  show                 print the current view
  help                 print this help
  quit                 leave the session";

#[derive(Parser, Debug)]
#[command(name = "session", about = "Interactive QR code session driven from stdin")]
pub struct SessionTool {
    /// Print each view as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Frames sampled per second while scanning
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Centred region searched in each frame while scanning
    #[arg(long, default_value = "250")]
    qrbox: QrBox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Action(Action),
    Scan(Vec<PathBuf>),
    Show,
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<Line>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let parsed = match command {
        "text" => Line::Action(Action::SetText(rest.to_string())),
        "logo" if rest.is_empty() => return Err("logo needs a file".to_string()),
        "logo" => Line::Action(Action::UploadLogo(PathBuf::from(rest))),
        "remove-logo" => Line::Action(Action::RemoveLogo),
        "generate" => Line::Action(Action::Generate),
        "download" if rest.is_empty() => Line::Action(Action::Download(PathBuf::from("."))),
        "download" => Line::Action(Action::Download(PathBuf::from(rest))),
        "scan" if rest.is_empty() => return Err("scan needs at least one frame".to_string()),
        "scan" => Line::Scan(rest.split_whitespace().map(PathBuf::from).collect()),
        "show" => Line::Show,
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };

    Ok(Some(parsed))
}

impl Tool for SessionTool {
    fn cli() -> Command {
        SessionTool::command()
    }

    fn execute(&self) -> Result<Option<Output>> {
        tokio::runtime::Runtime::new()
            .context("Could not create tokio runtime")?
            .block_on(async {
                let mut app: App = App::default();
                let input = BufReader::new(tokio::io::stdin());
                self.run(&mut app, input, tokio::io::stdout()).await
            })
            .context("Session failed")?;

        Ok(None)
    }
}

impl SessionTool {
    async fn run<E, R, W>(&self, app: &mut App<E>, input: R, mut output: W) -> Result<()>
    where
        E: Encoder,
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let config = ScanConfig {
            fps: self.fps,
            qrbox: self.qrbox,
        };

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Could not read input")? {
            let line = match parse_line(&line) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(message) => {
                    output.write_all(format!("{}\n", message).as_bytes()).await?;
                    continue;
                }
            };

            match line {
                Line::Action(action) => app.apply(action).await,
                Line::Scan(frames) => {
                    let source = ImageFiles::new(frames);
                    let mut scanner = ScannerAdapter::new(FrameScanner::new(source));
                    app.scan(&mut scanner, config).await;
                }
                Line::Show => {}
                Line::Help => {
                    output.write_all(format!("{}\n", HELP).as_bytes()).await?;
                    continue;
                }
                Line::Quit => break,
            }

            let rendered = if self.json {
                format!("{}\n", serde_json::to_string(&render(app.state()))?)
            } else {
                format!("{}\n", render(app.state()))
            };
            output.write_all(rendered.as_bytes()).await?;
            output.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn tool(json: bool) -> SessionTool {
        SessionTool {
            json,
            fps: 100,
            qrbox: QrBox {
                width: 250,
                height: 250,
            },
        }
    }

    async fn run(tool: &SessionTool, script: &str) -> (App, String) {
        let mut app: App = App::default();
        let mut output = Vec::new();
        tool.run(&mut app, script.as_bytes(), &mut output)
            .await
            .unwrap();
        (app, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(
            parse_line("text  hello world ").unwrap(),
            Some(Line::Action(Action::SetText("hello world".to_string())))
        );
        assert_eq!(
            parse_line("download").unwrap(),
            Some(Line::Action(Action::Download(PathBuf::from("."))))
        );
        assert_eq!(
            parse_line("scan a.png b.png").unwrap(),
            Some(Line::Scan(vec![PathBuf::from("a.png"), PathBuf::from("b.png")]))
        );
        assert_eq!(parse_line("exit").unwrap(), Some(Line::Quit));
        assert!(parse_line("logo").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[tokio::test]
    async fn test_generate_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            "text https://example.com\ngenerate\ndownload {}\nquit\ngenerate\n",
            dir.path().display()
        );
        let (app, output) = run(&tool(false), &script).await;

        assert!(app.state().artifact.is_some());
        assert!(app.state().last_download.is_some());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(output.contains("qr code: 400x400"));
        assert!(output.contains("saved: "));
    }

    #[tokio::test]
    async fn test_errors_are_shown_and_session_continues() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("download {}\ngenerate\nbogus\ntext ok\n", dir.path().display());
        let (app, output) = run(&tool(false), &script).await;

        assert!(output.contains("error: No QR code to download"));
        assert!(output.contains("error: Please enter text to generate QR code"));
        assert!(output.contains("unknown command: bogus"));
        assert_eq!(app.state().text, "ok");
    }

    #[tokio::test]
    async fn test_logo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        RgbaImage::from_pixel(20, 20, Rgba([0, 128, 0, 255]))
            .save(&logo)
            .unwrap();

        let script = format!("logo {}\nremove-logo\n", logo.display());
        let (app, output) = run(&tool(false), &script).await;

        assert!(output.contains("logo: logo.png (100x100) [Remove Logo]"));
        assert!(output.ends_with("logo: none\n[Generate QR Code] [Scan QR Code]\n\n"));
        assert!(app.state().logo.is_none());
    }

    #[tokio::test]
    async fn test_json_view() {
        let (_, output) = run(&tool(true), "text hi\n").await;
        let view: serde_json::Value = serde_json::from_str(output.trim()).unwrap();

        assert_eq!(view["input"], "hi");
        assert_eq!(view["generate"]["label"], "Generate QR Code");
        assert_eq!(view["download"]["enabled"], false);
    }
}
