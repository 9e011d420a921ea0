// Represents a command under qrlogo.
pub trait Tool {
    // The contribution of this tool to the qrlogo CLI. The clap::Command
    // returned here will be set up as a subcommand on the binary.
    fn cli() -> clap::Command;

    // Run the tool. All the context that the tool requires should come in
    // through the cli above.
    fn execute(&self) -> anyhow::Result<Option<Output>>;
}

#[derive(Debug)]
pub enum Output {
    /// Raw bytes, e.g. a PNG, written to stdout untouched.
    Bytes(Vec<u8>),
    /// A line of text, printed with a trailing newline.
    Text(String),
}
