//! The state of one build, from stylesheet text to replacements.

use std::{path::Path, sync::Arc};

use cssface::{font_faces, font_url, parse_with, Dialect, FontFaceDeclaration};
use log::{debug, error, warn};
use rayon::prelude::*;

use crate::{
    cache::{SubsetCache, SubsetEntry},
    config::{Config, Patterns},
    host::Host,
    identity::{FontIdentity, TargetFormat},
    paths::relative_url,
    report::ReportLine,
    rewrite::{AliasTable, Bundle, BundleRewriter, InlineRewriter, Replacement, Rewriter},
    subsetter::Subsetter,
    Error,
};

/// Where the bytes of a font come from.
enum FontSource<'a> {
    File(std::path::PathBuf),
    Bytes(&'a [u8]),
}

/// Everything one build knows about fonts.
///
/// Create one per build and drop it when the build ends; nothing is shared
/// between builds.
pub struct Build {
    patterns: Patterns,
    host: Arc<dyn Host>,
    cache: SubsetCache,
}

impl Build {
    pub fn new(
        config: &Config,
        host: Arc<dyn Host>,
        subsetter: Arc<dyn Subsetter>,
    ) -> Result<Build, Error> {
        let patterns = config.patterns()?;
        let cache = SubsetCache::new(
            config.cache_dir(),
            config.public_path.clone(),
            host.clone(),
            subsetter,
        );
        Ok(Build {
            patterns,
            host,
            cache,
        })
    }

    /// Should `path` be analyzed?
    pub fn is_stylesheet(&self, path: &Path) -> bool {
        self.patterns.is_stylesheet(path)
    }

    pub fn cache(&self) -> &SubsetCache {
        &self.cache
    }

    pub fn entries(&self) -> Vec<Arc<SubsetEntry>> {
        self.cache.entries()
    }

    /// Subset every font the stylesheet at `path` asks for.
    ///
    /// Urls are resolved through the host, relative to `path`. Safe to call for
    /// many stylesheets at once.
    pub fn analyze(&self, path: &Path, text: &str) -> Result<Vec<Replacement>, Error> {
        self.analyze_with(path, text, |url| {
            let resolved = self.host.resolve(url, path)?;
            Some((FontIdentity::from_path(&resolved), FontSource::File(resolved)))
        })
    }

    fn analyze_with<'a>(
        &self,
        path: &Path,
        text: &str,
        locate: impl Fn(&str) -> Option<(FontIdentity, FontSource<'a>)> + Sync,
    ) -> Result<Vec<Replacement>, Error> {
        let dialect = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Dialect::from_extension)
            .unwrap_or_default();
        let stylesheet = parse_with(text, dialect).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let faces = font_faces(&stylesheet);
        debug!("{path:?} has {} subsettable @font-face rules", faces.len());

        let mut replacements: Vec<Replacement> = faces
            .par_iter()
            .flat_map_iter(|face| self.subset_face(path, face, &locate))
            .collect();

        // two rules may well name the same file
        let mut seen = std::collections::HashSet::new();
        replacements.retain(|r| seen.insert(r.original.clone()));
        Ok(replacements)
    }

    fn subset_face<'a>(
        &self,
        path: &Path,
        face: &FontFaceDeclaration,
        locate: &(impl Fn(&str) -> Option<(FontIdentity, FontSource<'a>)> + Sync),
    ) -> Vec<Replacement> {
        face.src_urls
            .iter()
            .filter_map(|src| {
                let url = font_url(src)?;
                if !self.patterns.font_extensions.is_match(url) {
                    debug!("Not subsetting '{url}' in {path:?}, it doesn't look like a font");
                    return None;
                }
                let Some((identity, source)) = locate(url) else {
                    warn!("Unable to resolve '{url}' in {path:?}");
                    return None;
                };
                let format = TargetFormat::from_extension(identity.extension());
                let entry =
                    self.cache
                        .get_or_create(&identity, &face.ranges, format, || match source {
                            FontSource::File(file) => self.host.read_file(&file),
                            FontSource::Bytes(bytes) => Ok(bytes.to_vec()),
                        })?;
                Replacement::for_entry(url, entry)
            })
            .collect()
    }

    /// Rewrite the stylesheet at `path` to use subsets.
    ///
    /// A stylesheet we can't parse is logged and returned unchanged.
    pub fn transform(&self, path: &Path, text: &str) -> String {
        match self.analyze(path, text) {
            Ok(replacements) => rewrite_inline(text, &replacements),
            Err(e) => {
                error!("{e}, leaving it unchanged");
                text.to_string()
            }
        }
    }

    /// Like [`Build::transform`] for a stylesheet that will be written to `written_to`.
    ///
    /// Without a public path, subset urls are made relative to `written_to` so
    /// they resolve from wherever the stylesheet ends up.
    pub fn transform_into(&self, path: &Path, text: &str, written_to: &Path) -> String {
        let mut replacements = match self.analyze(path, text) {
            Ok(replacements) => replacements,
            Err(e) => {
                error!("{e}, leaving it unchanged");
                return text.to_string();
            }
        };
        if self.cache.public_path().is_none() {
            let dir = written_to.parent().unwrap_or(Path::new(""));
            for replacement in replacements.iter_mut() {
                let relative = replacement
                    .entry
                    .output_path
                    .as_deref()
                    .and_then(|subset| relative_url(dir, subset));
                if let Some(relative) = relative {
                    debug!("{} is {relative} from {written_to:?}", replacement.location);
                    replacement.location = relative;
                }
            }
        }
        rewrite_inline(text, &replacements)
    }

    /// Alias the fonts of the stylesheet at `path` to their subsets.
    pub fn add_aliases(&self, path: &Path, text: &str, aliases: &mut AliasTable) {
        match self.analyze(path, text) {
            Ok(replacements) => replacements.iter().for_each(|r| aliases.apply(r)),
            Err(e) => error!("{e}, adding no aliases for it"),
        }
    }

    /// Overwrite the fonts of an already emitted bundle with their subsets.
    ///
    /// Stylesheets in the bundle are analyzed, fonts are read from the bundle
    /// itself. Returns the names of the assets that changed.
    pub fn rewrite_bundle(&self, bundle: &mut Bundle) -> Vec<String> {
        let is_font = |name: &str| {
            !self.is_stylesheet(Path::new(name)) && self.patterns.font_extensions.is_match(name)
        };

        let replacements: Vec<Replacement> = {
            let bundle = &*bundle;
            let stylesheets: Vec<_> = bundle
                .iter()
                .filter(|(name, _)| self.is_stylesheet(Path::new(name)))
                .filter_map(|(name, asset)| match std::str::from_utf8(&asset.source) {
                    Ok(text) => Some((name, text)),
                    Err(e) => {
                        warn!("{name} is not utf-8, skipping it: {e}");
                        None
                    }
                })
                .collect();

            stylesheets
                .par_iter()
                .flat_map_iter(|(name, text)| {
                    let located = self.analyze_with(Path::new(name), text, |url| {
                        let identity = FontIdentity::from_file_name(url);
                        bundle
                            .iter()
                            .find(|(file, _)| {
                                is_font(file.as_str()) && FontIdentity::from_file_name(file) == identity
                            })
                            .map(|(_, asset)| (identity, FontSource::Bytes(&asset.source)))
                    });
                    located.unwrap_or_else(|e| {
                        error!("{e}, leaving its fonts alone");
                        Vec::new()
                    })
                })
                .collect()
        };

        let mut rewriter = BundleRewriter::new(bundle, is_font);
        for replacement in replacements.iter() {
            rewriter.apply(replacement);
        }
        rewriter.into_changed()
    }

    /// End the build, returning what it saved.
    pub fn finish(self) -> Vec<ReportLine> {
        self.cache.report().drain()
    }
}

fn rewrite_inline(text: &str, replacements: &[Replacement]) -> String {
    let mut rewriter = InlineRewriter::new(text);
    for replacement in replacements {
        rewriter.apply(replacement);
    }
    rewriter.into_text()
}
