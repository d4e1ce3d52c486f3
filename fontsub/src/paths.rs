//! File naming for subset output.

use std::{
    env,
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

use crate::identity::FontIdentity;

#[inline]
fn ok_for_filenames(c: char) -> bool {
    match c as u32 {
        v if v < 32 => false,
        0x7F => false,
        0x0020 => false, // space, legal but a pain in urls
        0x0022 => false, // quotation mark
        0x0023 => false, // number sign
        0x0025 => false, // percent sign
        0x0027 => false, // apostrophe
        0x002a => false, // asterisk
        0x002f => false, // solidus
        0x003a => false, // colon
        0x003c => false, // less-than sign
        0x003e => false, // greater-than sign
        0x003f => false, // question mark
        0x005c => false, // reverse solidus
        0x007c => false, // vertical line
        _ => true,
    }
}

/// Is this name part a poor choice on Windows?
///
/// Applies to the portion of the name preceeding the first '.', see
/// <https://learn.microsoft.com/en-gb/windows/win32/fileio/naming-a-file#naming-conventions>
fn scary_for_windows(name: &str) -> bool {
    let name = name.split('.').next().unwrap_or(name);
    let upper = name.to_ascii_uppercase();
    matches!(upper.as_str(), "CON" | "PRN" | "AUX" | "NUL")
        || (upper.len() == 4
            && (upper.starts_with("COM") || upper.starts_with("LPT"))
            && upper.as_bytes()[3].is_ascii_digit())
}

/// Makes a cursory attempt to not produce bad filenames, or filenames that
/// need escaping in a url.
///
/// Not meant to be reversible.
pub fn safe_filename(name: &str, suffix: &str) -> String {
    let mut filename: Vec<char> = name
        .chars()
        .map(|ch| if ok_for_filenames(ch) { ch } else { '_' })
        .chain(suffix.chars())
        .collect();

    if let Some(ch) = filename.first_mut() {
        if *ch == '.' {
            *ch = '_';
        }
    }

    let filename: String = filename.into_iter().collect();

    // Windows fears no _
    if scary_for_windows(&filename) {
        "_".to_string() + &filename
    } else {
        filename
    }
}

/// The file name a subset of `identity` is written to, such as `inter.subset.woff2`.
///
/// Deterministic so repeated builds reuse names.
pub fn subset_file_name(identity: &FontIdentity) -> String {
    let ext = identity.extension();
    if ext.is_empty() {
        safe_filename(identity.stem(), ".subset")
    } else {
        safe_filename(identity.stem(), &format!(".subset.{ext}"))
    }
}

pub fn subset_file(cache_dir: &Path, identity: &FontIdentity) -> PathBuf {
    cache_dir.join(subset_file_name(identity))
}

/// A path as used in a url: forward slashes throughout.
pub fn to_url_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// absolute, with . and .. resolved without touching the file system
fn lexical_components(path: &Path) -> Option<Vec<OsString>> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().ok()?.join(path)
    };
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                components.pop();
            }
            other => components.push(other.as_os_str().to_os_string()),
        }
    }
    Some(components)
}

/// A url leading from the directory `dir` to `file`, such as `../fonts/a.subset.woff2`.
///
/// None if there is no such url, as between Windows drives.
pub fn relative_url(dir: &Path, file: &Path) -> Option<String> {
    let dir = lexical_components(dir)?;
    let file = lexical_components(file)?;
    let common = dir
        .iter()
        .zip(file.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 || common == file.len() {
        return None;
    }
    let mut parts: Vec<String> = dir[common..].iter().map(|_| "..".to_string()).collect();
    parts.extend(
        file[common..]
            .iter()
            .map(|part| part.to_string_lossy().into_owned()),
    );
    Some(parts.join("/"))
}
