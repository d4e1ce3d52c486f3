//! What we need from the surrounding build: url resolution and file access.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::trace;

use crate::{identity::strip_query, Error};

/// The build system we're running inside of.
pub trait Host: Send + Sync {
    /// Find the file `url` refers to when written in `importer`.
    ///
    /// None if there isn't one, or it's not a local file.
    fn resolve(&self, url: &str, importer: &Path) -> Option<PathBuf>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, Error>;

    /// Write `contents` to `path`, creating directories as needed.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), Error>;
}

/// Is this a url we can never find on disk?
pub fn is_remote(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("//")
        || ["http:", "https:", "data:", "blob:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

/// A host backed by the local file system.
#[derive(Debug, Default, Clone)]
pub struct FsHost {
    public_roots: Vec<PathBuf>,
}

impl FsHost {
    /// `public_roots` are searched, in order, for root-relative urls such as `/fonts/a.woff2`.
    pub fn new(public_roots: Vec<PathBuf>) -> FsHost {
        FsHost { public_roots }
    }

    fn existing(candidate: PathBuf) -> Option<PathBuf> {
        trace!("Trying {candidate:?}");
        candidate.is_file().then_some(candidate)
    }

    // ~pkg/file means node_modules/pkg/file in the nearest node_modules
    fn from_node_modules(&self, module: &str, dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .find_map(|ancestor| Self::existing(ancestor.join("node_modules").join(module)))
    }
}

impl Host for FsHost {
    fn resolve(&self, url: &str, importer: &Path) -> Option<PathBuf> {
        if is_remote(url) {
            return None;
        }
        let url = strip_query(url);
        let dir = importer.parent().unwrap_or(Path::new(""));

        if let Some(module) = url.strip_prefix('~') {
            return self.from_node_modules(module, dir);
        }
        if let Some(rooted) = url.strip_prefix('/') {
            return self
                .public_roots
                .iter()
                .find_map(|root| Self::existing(root.join(rooted)));
        }
        Self::existing(dir.join(url))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, Error> {
        fs::read(path).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::FileIo {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })
    }
}
