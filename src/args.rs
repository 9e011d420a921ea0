use crate::scanner::QrBox;
use std::io::{self, Read};
use std::str::FromStr;

/// A type for clap argument parsing that supports reading from stdin
/// when the value is "-" and allows escaping "-" with "\-".
///
/// Text read from stdin loses a single trailing line break so that
/// `echo url | qrlogo qr -` encodes just the url.
#[derive(Debug, Clone)]
pub struct StringInput(pub String);

impl StringInput {
    fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut buffer = String::new();
        reader.read_to_string(&mut buffer)?;

        let trimmed = buffer
            .strip_suffix("\r\n")
            .or_else(|| buffer.strip_suffix('\n'))
            .unwrap_or(&buffer);
        Ok(StringInput(trimmed.to_string()))
    }
}

impl FromStr for StringInput {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-" => StringInput::from_reader(io::stdin()),
            r"\-" => Ok(StringInput("-".to_string())),
            _ => Ok(StringInput(s.to_string())),
        }
    }
}

impl AsRef<str> for StringInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StringInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts either a single size ("250") or "WIDTHxHEIGHT" ("300x200").
impl FromStr for QrBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| match part.trim().parse::<u32>() {
            Ok(0) => Err("Box size must be greater than zero".to_string()),
            Ok(value) => Ok(value),
            Err(_) => Err(format!("Invalid box size: {}", part)),
        };

        match s.split_once(['x', 'X']) {
            Some((width, height)) => Ok(QrBox {
                width: parse(width)?,
                height: parse(height)?,
            }),
            None => {
                let size = parse(s)?;
                Ok(QrBox {
                    width: size,
                    height: size,
                })
            }
        }
    }
}
