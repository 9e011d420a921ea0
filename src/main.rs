mod app;
mod args;
mod artifact;
mod canvas;
mod compositor;
mod encode;
mod error;
mod logo;
mod scanner;
mod tool;
mod tools;
mod upload;

use std::io::{self, Write};

use clap::{Arg, ArgAction, FromArgMatches};
use tracing_subscriber::EnvFilter;

use crate::tool::{Output, Tool};
use anyhow::{Context, anyhow};

// This way of building main is not ideal.
macro_rules! toolbox {
    ($cmd:ident, $(($tool:path, $name:literal, $($alias:literal),*)),+) => {
        {
            // Register the tools.
            $(
                $cmd = $cmd.subcommand(
                    <$tool>::cli()
                    .name($name)
                    $(.alias($alias))*
                );
            )*

            // Parse args.
            let matches = $cmd.get_matches();
            init_tracing(matches.get_flag("verbose"));

            let (subcommand_name, subcommand_matches) = matches
                .subcommand()
                .context("Could not determine subcommand")?;

            // Run the specific tool.
            match subcommand_name {
                $(
                    $name => {
                        let output = <$tool>::from_arg_matches(subcommand_matches)
                            .context("Could not initialize the tool")?
                            .execute()
                            .context("Could not execute tool")?;

                        Ok(output)
                    }
                )*
                _ => {
                    Err(anyhow!("Unknown subcommand"))
                }
            }
        }
    };
}

// Logs go to stderr so that PNG bytes on stdout stay intact. RUST_LOG wins
// over --verbose when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let mut cli = clap::builder::Command::new("qrlogo")
        .about("QR codes with a logo in the middle, and a scanner to read them back")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log what is happening to stderr")
                .action(ArgAction::SetTrue)
                .global(true),
        );

    let output = toolbox!(
        cli,
        (tools::logo::LogoTool, "logo",),
        (tools::qr::QRTool, "qr", "generate"),
        (tools::scan::ScanTool, "scan",),
        (tools::session::SessionTool, "session",)
    )
    .context("Could not run tool")?;

    match output {
        Some(Output::Bytes(bytes)) => {
            io::stdout()
                .write_all(&bytes)
                .context("Could not write bytes to stdout")?;
        }
        Some(Output::Text(text)) => {
            println!("{}", text);
        }
        None => {}
    }

    Ok(())
}
