use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

use crate::config::OutputMode;

/// Render GitHub-flavored markdown to sanitized, highlighted HTML.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "mdrender", version, about)]
pub struct Invocation {
    /// Markdown file to render; stdin when absent or `-`.
    pub input: Option<PathBuf>,

    /// Print a full HTML document with the token stylesheet.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "fragment")]
    pub document: bool,

    /// Print only the scoped HTML fragment.
    #[arg(long, action = ArgAction::SetTrue)]
    pub fragment: bool,

    /// Print the active sanitize allow-list as JSON instead of rendering.
    #[arg(long = "schema", action = ArgAction::SetTrue)]
    pub print_schema: bool,
}

impl Invocation {
    /// Input file, `None` meaning stdin.
    pub fn input_path(&self) -> Option<&Path> {
        self.input
            .as_deref()
            .filter(|path| *path != Path::new("-"))
    }

    /// Output mode requested on the command line, overriding the config.
    pub fn output(&self) -> Option<OutputMode> {
        if self.document {
            Some(OutputMode::Document)
        } else if self.fragment {
            Some(OutputMode::Fragment)
        } else {
            None
        }
    }
}
