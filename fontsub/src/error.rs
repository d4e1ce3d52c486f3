use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use crate::identity::TargetFormat;

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{0}' exists but is not a directory")]
    ExpectedDirectory(PathBuf),
    #[error("Missing file '{0}'")]
    FileExpected(PathBuf),
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to stdout or stderr: '{0}'")]
    StdioWriteFail(#[source] io::Error),
    #[error("Unable to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: cssface::Error,
    },
    #[error("Bad pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    YamlSerError(#[from] serde_yaml::Error),
}

/// Ways the subsetting capability can let us down.
#[derive(Debug, Error)]
pub enum SubsetError {
    #[error("Unable to produce {0} output")]
    UnsupportedFormat(TargetFormat),
    #[error("No code points to keep")]
    NothingToKeep,
    #[error("Unable to run '{program}': '{source}'")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' failed with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}
