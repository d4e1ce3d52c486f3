//! One subset per font per build.
//!
//! The first request for a [`FontIdentity`] decides which code points its subset
//! holds. Later requests, even with different ranges, get that same result.
//! Concurrent first requests are coalesced: the slot for an identity is created
//! under the lock, then filled outside of it, so late arrivals wait on the
//! computation already in flight rather than starting their own.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use cssface::{unicode_range::expand, CodePointRange};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::{
    host::Host,
    identity::{FontIdentity, TargetFormat},
    paths::{subset_file, to_url_path},
    report::Report,
    subsetter::Subsetter,
    Error,
};

/// The result of subsetting one font.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetEntry {
    pub identity: FontIdentity,
    pub format: TargetFormat,
    pub original_size: usize,
    pub subset_size: usize,
    pub subset_bytes: Vec<u8>,
    /// True only if the subset is smaller than the original
    pub accepted: bool,
    /// Where the subset was written; None unless accepted
    pub output_path: Option<PathBuf>,
    /// What references to the font should become; None unless accepted
    pub output_location: Option<String>,
}

// None means we tried and failed; that is remembered for the rest of the build.
type Slot = Arc<OnceLock<Option<Arc<SubsetEntry>>>>;

pub struct SubsetCache {
    cache_dir: PathBuf,
    public_path: Option<String>,
    host: Arc<dyn Host>,
    subsetter: Arc<dyn Subsetter>,
    report: Report,
    slots: Mutex<HashMap<FontIdentity, Slot>>,
}

impl SubsetCache {
    /// Subsets are written to `cache_dir`.
    ///
    /// If `public_path` is set references become `<public_path>/<file>`, otherwise
    /// the path written to.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        public_path: Option<String>,
        host: Arc<dyn Host>,
        subsetter: Arc<dyn Subsetter>,
    ) -> SubsetCache {
        SubsetCache {
            cache_dir: cache_dir.into(),
            public_path,
            host,
            subsetter,
            report: Report::default(),
            slots: Default::default(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn public_path(&self) -> Option<&str> {
        self.public_path.as_deref()
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// The subset for `identity`, computing it if nobody has yet.
    ///
    /// `ranges` only matter for the first call for an identity. `load` is only
    /// called if a computation actually happens. None if the font couldn't be
    /// loaded or subset; the original should be left alone.
    pub fn get_or_create(
        &self,
        identity: &FontIdentity,
        ranges: &[CodePointRange],
        format: TargetFormat,
        load: impl FnOnce() -> Result<Vec<u8>, Error>,
    ) -> Option<Arc<SubsetEntry>> {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(identity.clone()).or_default().clone()
        };

        let mut computed = false;
        let outcome = slot.get_or_init(|| {
            computed = true;
            self.compute(identity, ranges, format, load)
        });
        if !computed {
            debug!("Reusing the subset of {identity}");
        }
        outcome.clone()
    }

    fn compute(
        &self,
        identity: &FontIdentity,
        ranges: &[CodePointRange],
        format: TargetFormat,
        load: impl FnOnce() -> Result<Vec<u8>, Error>,
    ) -> Option<Arc<SubsetEntry>> {
        let font = match load() {
            Ok(font) => font,
            Err(e) => {
                warn!("Unable to load {identity}, leaving it alone: {e}");
                return None;
            }
        };

        let code_points = expand(ranges);
        debug!("Subsetting {identity} to {} code points", code_points.len());
        let subset_bytes = match self.subsetter.subset(&font, &code_points, format) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Unable to subset {identity}, leaving it alone: {e}");
                return None;
            }
        };

        let mut entry = SubsetEntry {
            identity: identity.clone(),
            format,
            original_size: font.len(),
            subset_size: subset_bytes.len(),
            subset_bytes,
            accepted: false,
            output_path: None,
            output_location: None,
        };
        if entry.subset_size >= entry.original_size {
            info!(
                "The subset of {identity} is no smaller ({} >= {} bytes), keeping the original",
                entry.subset_size, entry.original_size
            );
            return Some(Arc::new(entry));
        }

        let path = subset_file(&self.cache_dir, identity);
        if let Err(e) = self.host.write_file(&path, &entry.subset_bytes) {
            warn!("Unable to save the subset of {identity}, leaving it alone: {e}");
            return None;
        }
        let location = match &self.public_path {
            Some(public_path) => format!(
                "{}/{}",
                public_path.trim_end_matches('/'),
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            None => to_url_path(&path),
        };
        info!(
            "Subset {identity} {} => {} bytes, now at {location}",
            entry.original_size, entry.subset_size
        );

        entry.accepted = true;
        entry.output_path = Some(path);
        entry.output_location = Some(location);
        self.report.record(&entry);
        Some(Arc::new(entry))
    }

    /// Every entry created so far, sorted by identity.
    pub fn entries(&self) -> Vec<Arc<SubsetEntry>> {
        let mut entries: Vec<_> = self
            .slots
            .lock()
            .values()
            .filter_map(|slot| slot.get().cloned().flatten())
            .collect();
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        entries
    }
}
