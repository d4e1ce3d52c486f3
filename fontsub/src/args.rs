//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::RewriteMode;

/// Which fonts can we shrink for you today?
#[derive(Serialize, Deserialize, Parser, Debug, Clone, PartialEq)]
#[command(version, about)]
pub struct Args {
    /// Stylesheets, or directories to search for them. In bundle mode, directories of emitted assets.
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,

    /// Working directory; subsets are written to `fonts/` within it unless configured otherwise.
    #[arg(short, long)]
    #[clap(default_value = "build")]
    pub build_dir: PathBuf,

    /// Where output goes. Defaults to `<build-dir>/css` for inline mode, `<build-dir>`
    /// for alias mode, and the input directories themselves for bundle mode.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// How references are pointed at subsets
    #[arg(short, long, value_enum)]
    #[clap(default_value = "inline")]
    pub mode: RewriteMode,

    /// Stylesheets must match one of these regexes to be analyzed
    #[arg(long)]
    pub include: Vec<String>,

    /// Stylesheets matching any of these regexes are skipped
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Urls must match this regex to be subset
    #[arg(long)]
    pub font_extensions: Option<String>,

    /// Prefix for subset urls, such as `/assets`
    #[arg(long)]
    pub public_path: Option<String>,

    /// Directories searched for root-relative urls such as `/fonts/a.woff2`
    #[arg(long)]
    pub public_root: Vec<PathBuf>,

    /// A pyftsubset compatible program
    #[arg(long)]
    pub subsetter: Option<String>,

    /// A yaml config file; command line arguments take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Manually create args for testing
    #[cfg(test)]
    pub fn for_test(build_dir: &std::path::Path, input: &std::path::Path) -> Args {
        Args {
            input: vec![input.to_path_buf()],
            build_dir: build_dir.to_path_buf(),
            out_dir: None,
            mode: RewriteMode::Inline,
            include: Vec::new(),
            exclude: Vec::new(),
            font_extensions: None,
            public_path: None,
            public_root: Vec::new(),
            subsetter: None,
            config: None,
        }
    }

    /// Where rewritten output is written for our mode.
    ///
    /// None for bundle mode without an explicit out dir, meaning in place.
    pub fn output_dir(&self) -> Option<PathBuf> {
        if self.out_dir.is_some() {
            return self.out_dir.clone();
        }
        match self.mode {
            RewriteMode::Inline => Some(self.build_dir.join("css")),
            RewriteMode::Alias => Some(self.build_dir.clone()),
            RewriteMode::Bundle => None,
        }
    }
}
