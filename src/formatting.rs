//! Rendering of command results on stdout.
//!
//! Results are rendered as text for operators or as JSON for scripts, see [`Formattable`].
use std::fmt::Display;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

pub trait Formattable {
    fn format(&self, format: Format) -> Result<String>;
}

/// Text uses [`Display`], JSON uses [`Serialize`].
impl<T> Formattable for T
where
    T: Display + Serialize,
{
    fn format(&self, format: Format) -> Result<String> {
        match format {
            Format::Text => Ok(self.to_string()),
            Format::Json => serde_json::to_string(self).context("serializing result to json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Uploaded {
        file: String,
        parts: u32,
    }

    impl Display for Uploaded {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} uploaded in {} parts", self.file, self.parts)
        }
    }

    #[test]
    fn test_format_as_text_and_json() {
        let uploaded = Uploaded {
            file: "app.mtar".to_string(),
            parts: 3,
        };

        assert_eq!(
            uploaded.format(Format::Text).unwrap(),
            "app.mtar uploaded in 3 parts"
        );
        assert_eq!(
            uploaded.format(Format::Json).unwrap(),
            r#"{"file":"app.mtar","parts":3}"#
        );
    }

    #[test]
    fn test_default_format_is_text() {
        assert_eq!(Format::default(), Format::Text);
    }
}
