//! The capability that actually shrinks a font.
//!
//! We treat this as a black box: font bytes and code points go in, smaller
//! font bytes (hopefully) come out.

use std::{collections::BTreeSet, fs, process::Command};

use cssface::unicode_range::to_css;
use log::{debug, log_enabled, trace};

use crate::{error::SubsetError, identity::TargetFormat};

/// The default program for [`CommandSubsetter`], from fonttools
pub const DEFAULT_SUBSETTER: &str = "pyftsubset";

pub trait Subsetter: Send + Sync {
    /// Produce a font holding only `code_points`, in `format`.
    fn subset(
        &self,
        font: &[u8],
        code_points: &BTreeSet<u32>,
        format: TargetFormat,
    ) -> Result<Vec<u8>, SubsetError>;
}

/// Subsets by running a fonttools `pyftsubset` compatible program.
#[derive(Debug, Clone)]
pub struct CommandSubsetter {
    program: String,
}

impl Default for CommandSubsetter {
    fn default() -> Self {
        CommandSubsetter::new(DEFAULT_SUBSETTER)
    }
}

impl CommandSubsetter {
    pub fn new(program: impl Into<String>) -> CommandSubsetter {
        CommandSubsetter {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

fn flavor(format: TargetFormat) -> Result<Option<&'static str>, SubsetError> {
    match format {
        TargetFormat::Woff => Ok(Some("woff")),
        TargetFormat::Woff2 => Ok(Some("woff2")),
        TargetFormat::TrueType | TargetFormat::OpenType => Ok(None),
        TargetFormat::Eot => Err(SubsetError::UnsupportedFormat(format)),
    }
}

impl Subsetter for CommandSubsetter {
    fn subset(
        &self,
        font: &[u8],
        code_points: &BTreeSet<u32>,
        format: TargetFormat,
    ) -> Result<Vec<u8>, SubsetError> {
        if code_points.is_empty() {
            return Err(SubsetError::NothingToKeep);
        }
        let flavor = flavor(format)?;

        let tempdir = tempfile::tempdir().map_err(|source| SubsetError::FileIo {
            path: std::env::temp_dir(),
            source,
        })?;
        let input = tempdir.path().join("input");
        let output = tempdir.path().join(format!("output.{}", format.extension()));
        fs::write(&input, font).map_err(|source| SubsetError::FileIo {
            path: input.clone(),
            source,
        })?;

        let mut command = Command::new(&self.program);
        command
            .arg(&input)
            .arg(format!("--unicodes={}", to_css(code_points)))
            .arg(format!("--output-file={}", output.display()))
            .arg("--layout-features=*");
        if let Some(flavor) = flavor {
            command.arg(format!("--flavor={flavor}"));
        }
        if log_enabled!(log::Level::Trace) {
            trace!("{command:?}");
        }

        let result = command.output().map_err(|source| SubsetError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !result.status.success() {
            return Err(SubsetError::Failed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let subset = fs::read(&output).map_err(|source| SubsetError::FileIo {
            path: output.clone(),
            source,
        })?;
        debug!(
            "{} kept {} code points, {} => {} bytes",
            self.program,
            code_points.len(),
            font.len(),
            subset.len()
        );
        Ok(subset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits() -> BTreeSet<u32> {
        (0x30..=0x39).collect()
    }

    #[test]
    fn eot_is_unsupported() {
        let result = CommandSubsetter::default().subset(b"font", &digits(), TargetFormat::Eot);
        assert!(
            matches!(result, Err(SubsetError::UnsupportedFormat(TargetFormat::Eot))),
            "{result:?}"
        );
    }

    #[test]
    fn nothing_to_keep() {
        let result =
            CommandSubsetter::default().subset(b"font", &BTreeSet::new(), TargetFormat::Woff2);
        assert!(matches!(result, Err(SubsetError::NothingToKeep)), "{result:?}");
    }

    #[test]
    fn missing_program() {
        let subsetter = CommandSubsetter::new("fontsub-test-no-such-program");
        let result = subsetter.subset(b"font", &digits(), TargetFormat::Woff2);
        assert!(matches!(result, Err(SubsetError::Spawn { .. })), "{result:?}");
    }

    #[test]
    fn web_formats_set_a_flavor() {
        assert_eq!(Some("woff2"), flavor(TargetFormat::Woff2).unwrap());
        assert_eq!(Some("woff"), flavor(TargetFormat::Woff).unwrap());
        assert_eq!(None, flavor(TargetFormat::TrueType).unwrap());
        assert_eq!(None, flavor(TargetFormat::OpenType).unwrap());
    }
}
