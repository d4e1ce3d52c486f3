//! Shrinks web fonts to the code points their stylesheets ask for.
//!
//! Stylesheets are read for `@font-face` rules with a `unicode-range`, each
//! font they name is subset (once per build) to just those code points, and
//! references to the font are pointed at the smaller file.

mod args;
pub mod cache;
mod config;
mod error;
pub mod host;
pub mod identity;
pub mod paths;
mod pipeline;
pub mod report;
pub mod rewrite;
pub mod subsetter;

pub use args::Args;
pub use cache::{SubsetCache, SubsetEntry};
pub use config::{Config, Patterns};
pub use error::{Error, SubsetError};
pub use host::{FsHost, Host};
pub use identity::{FontIdentity, TargetFormat};
pub use pipeline::Build;
pub use report::ReportLine;
pub use rewrite::{
    Alias, AliasTable, Asset, AssetKind, Bundle, BundleRewriter, InlineRewriter, Replacement,
    RewriteMode, Rewriter,
};
pub use subsetter::{CommandSubsetter, Subsetter};

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, error, info};
use rayon::prelude::*;

pub fn require_dir(dir: &Path) -> Result<PathBuf, Error> {
    if dir.exists() && !dir.is_dir() {
        return Err(Error::ExpectedDirectory(dir.to_path_buf()));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::FileIo {
            path: dir.to_path_buf(),
            source,
        })?
    }
    debug!("require_dir {:?}", dir);
    Ok(dir.to_path_buf())
}

/// A file found among the inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Relative to the input directory it was found in; just the name for files
    /// given directly
    pub relative: PathBuf,
}

/// The files at or under `input`, sorted. Hidden and `node_modules` directories are not entered.
pub fn collect_files(input: &Path) -> Result<Vec<InputFile>, Error> {
    if input.is_file() {
        let relative = input.file_name().map(PathBuf::from).unwrap_or_default();
        return Ok(vec![InputFile {
            path: input.to_path_buf(),
            relative,
        }]);
    }
    if !input.is_dir() {
        return Err(Error::FileExpected(input.to_path_buf()));
    }
    let mut files = Vec::new();
    walk(input, input, &mut files)?;
    Ok(files)
}

fn walk(root: &Path, dir: &Path, files: &mut Vec<InputFile>) -> Result<(), Error> {
    let io_error = |source| Error::FileIo {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if name.starts_with('.') || name == "node_modules" {
                debug!("Not searching {path:?}");
                continue;
            }
            walk(root, &path, files)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            files.push(InputFile { path, relative });
        }
    }
    Ok(())
}

/// The bytes of a stylesheet; one we can't read is logged and left out.
fn read_stylesheet(host: &dyn Host, path: &Path) -> Option<Vec<u8>> {
    host.read_file(path)
        .map_err(|e| error!("{e}, skipping it"))
        .ok()
}

/// Subset the fonts of the stylesheets named by `args`, writing output per
/// [`RewriteMode`].
pub fn run(
    args: &Args,
    config: &Config,
    subsetter: Arc<dyn Subsetter>,
) -> Result<Vec<ReportLine>, Error> {
    let host: Arc<dyn Host> = Arc::new(FsHost::new(config.public_roots.clone()));
    let build = Build::new(config, host.clone(), subsetter)?;

    match args.mode {
        RewriteMode::Inline => run_inline(args, &build, host.as_ref())?,
        RewriteMode::Alias => run_alias(args, &build, host.as_ref())?,
        RewriteMode::Bundle => run_bundle(args, &build, host.as_ref())?,
    }

    Ok(build.finish())
}

fn stylesheets(args: &Args, build: &Build) -> Result<Vec<InputFile>, Error> {
    let mut stylesheets = Vec::new();
    for input in args.input.iter() {
        stylesheets.extend(
            collect_files(input)?
                .into_iter()
                .filter(|file| build.is_stylesheet(&file.path)),
        );
    }
    info!("Found {} stylesheets", stylesheets.len());
    Ok(stylesheets)
}

fn run_inline(args: &Args, build: &Build, host: &dyn Host) -> Result<(), Error> {
    let out_dir = require_dir(&args.output_dir().unwrap_or_else(|| args.build_dir.join("css")))?;
    stylesheets(args, build)?
        .par_iter()
        .map(|file| -> Result<(), Error> {
            let Some(source) = read_stylesheet(host, &file.path) else {
                return Ok(());
            };
            let out_file = out_dir.join(&file.relative);
            let output = match String::from_utf8(source) {
                Ok(text) => build.transform_into(&file.path, &text, &out_file).into_bytes(),
                Err(e) => {
                    error!("{:?} is not utf-8, copying it unchanged: {e}", file.path);
                    e.into_bytes()
                }
            };
            host.write_file(&out_file, &output)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

fn run_alias(args: &Args, build: &Build, host: &dyn Host) -> Result<(), Error> {
    let out_dir = require_dir(&args.output_dir().unwrap_or_else(|| args.build_dir.clone()))?;
    let analyzed: Vec<Vec<Replacement>> = stylesheets(args, build)?
        .par_iter()
        .map(|file| {
            let Some(source) = read_stylesheet(host, &file.path) else {
                return Vec::new();
            };
            let text = match String::from_utf8(source) {
                Ok(text) => text,
                Err(e) => {
                    error!("{:?} is not utf-8, adding no aliases for it: {e}", file.path);
                    return Vec::new();
                }
            };
            build.analyze(&file.path, &text).unwrap_or_else(|e| {
                error!("{e}, adding no aliases for it");
                Vec::new()
            })
        })
        .collect();

    let mut aliases = AliasTable::new();
    for replacement in analyzed.iter().flatten() {
        aliases.apply(replacement);
    }
    let alias_file = out_dir.join("aliases.yml");
    info!("Writing {} aliases to {alias_file:?}", aliases.len());
    host.write_file(&alias_file, serde_yaml::to_string(&aliases)?.as_bytes())
}

/// Read every file under `dir` into a bundle keyed by relative path.
pub fn load_bundle(dir: &Path) -> Result<Bundle, Error> {
    let mut bundle = Bundle::new();
    for file in collect_files(dir)? {
        let source = fs::read(&file.path).map_err(|source| Error::FileIo {
            path: file.path.clone(),
            source,
        })?;
        bundle.insert(paths::to_url_path(&file.relative), Asset::new(source));
    }
    Ok(bundle)
}

fn run_bundle(args: &Args, build: &Build, host: &dyn Host) -> Result<(), Error> {
    for input in args.input.iter() {
        if !input.is_dir() {
            return Err(Error::ExpectedDirectory(input.clone()));
        }
        let mut bundle = load_bundle(input)?;
        let changed = build.rewrite_bundle(&mut bundle);
        let out_dir = args.output_dir().unwrap_or_else(|| input.clone());
        info!("{} assets changed in {input:?}", changed.len());
        for name in changed {
            if let Some(asset) = bundle.get(&name) {
                host.write_file(&out_dir.join(&name), &asset.source)?;
            }
        }
    }
    Ok(())
}
