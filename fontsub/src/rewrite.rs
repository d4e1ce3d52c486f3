//! Pointing references at subsets.
//!
//! Hosts give us different places to hook in, so there's one [`Rewriter`] per
//! integration point. All of them may be applied repeatedly without changing the
//! result past the first application.

use std::sync::Arc;

use clap::ValueEnum;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{cache::SubsetEntry, identity::FontIdentity};

/// Which build phase we're hooked into.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    /// Rewrite urls in stylesheet text
    #[default]
    Inline,
    /// Produce an alias table for the host's resolver
    Alias,
    /// Overwrite emitted font assets with their subsets
    Bundle,
}

/// A reference to swap for the location of an accepted subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    /// The url as written in the stylesheet
    pub original: String,
    /// The url of the subset
    pub location: String,
    pub entry: Arc<SubsetEntry>,
}

impl Replacement {
    /// None unless the subset was accepted.
    pub fn for_entry(original: &str, entry: Arc<SubsetEntry>) -> Option<Replacement> {
        if !entry.accepted {
            return None;
        }
        let location = entry.output_location.clone()?;
        Some(Replacement {
            original: original.to_string(),
            location,
            entry,
        })
    }
}

pub trait Rewriter {
    fn apply(&mut self, replacement: &Replacement);
}

/// Rewrites urls in the text of a stylesheet.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRewriter {
    text: String,
}

impl InlineRewriter {
    pub fn new(text: impl Into<String>) -> InlineRewriter {
        InlineRewriter { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Rewriter for InlineRewriter {
    fn apply(&mut self, replacement: &Replacement) {
        self.text = replace_url(&self.text, &replacement.original, &replacement.location);
    }
}

fn bounds_url(ch: Option<char>) -> bool {
    match ch {
        None => true,
        Some(ch) => matches!(ch, '(' | ')' | '"' | '\'' | ',') || ch.is_whitespace(),
    }
}

/// Replace whole occurrences of `url` in `text`.
///
/// Only occurrences that stand alone, bounded by quotes, parens or whitespace,
/// are replaced; `a.woff2` inside `/x/a.woff2` is not `a.woff2`.
fn replace_url(text: &str, url: &str, with: &str) -> String {
    if url.is_empty() {
        return text.to_string();
    }
    let mut result = String::with_capacity(text.len());
    let mut copied_to = 0;
    for (start, _) in text.match_indices(url) {
        let end = start + url.len();
        if !bounds_url(text[..start].chars().next_back()) || !bounds_url(text[end..].chars().next())
        {
            continue;
        }
        result.push_str(&text[copied_to..start]);
        result.push_str(with);
        copied_to = end;
    }
    result.push_str(&text[copied_to..]);
    result
}

/// An entry in a resolver alias table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub find: String,
    pub replacement: String,
}

/// An ordered alias table, consulted first match wins.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct AliasTable {
    aliases: Vec<Alias>,
}

impl AliasTable {
    pub fn new() -> AliasTable {
        Default::default()
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// What `url` resolves to, if it is aliased.
    pub fn resolve(&self, url: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|alias| alias.find == url)
            .map(|alias| alias.replacement.as_str())
    }
}

impl Rewriter for AliasTable {
    fn apply(&mut self, replacement: &Replacement) {
        if let Some(existing) = self.resolve(&replacement.original) {
            debug!(
                "'{}' is already aliased to '{existing}'",
                replacement.original
            );
            return;
        }
        self.aliases.push(Alias {
            find: replacement.original.clone(),
            replacement: replacement.location.clone(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Fonts, stylesheets, images...
    Asset,
    /// Code
    Chunk,
}

/// An emitted output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub kind: AssetKind,
    pub source: Vec<u8>,
}

impl Asset {
    pub fn new(source: impl Into<Vec<u8>>) -> Asset {
        Asset {
            kind: AssetKind::Asset,
            source: source.into(),
        }
    }
}

/// The assets a host has emitted, by file name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bundle {
    assets: IndexMap<String, Asset>,
}

impl Bundle {
    pub fn new() -> Bundle {
        Default::default()
    }

    pub fn insert(&mut self, file_name: impl Into<String>, asset: Asset) {
        self.assets.insert(file_name.into(), asset);
    }

    pub fn get(&self, file_name: &str) -> Option<&Asset> {
        self.assets.get(file_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Asset)> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Overwrites emitted fonts with their subsets, in place.
///
/// The asset keeps its name so nothing referencing it needs to change.
pub struct BundleRewriter<'a> {
    bundle: &'a mut Bundle,
    is_font: Box<dyn Fn(&str) -> bool + 'a>,
    changed: Vec<String>,
}

impl<'a> BundleRewriter<'a> {
    /// Only assets whose names pass `is_font` are candidates for replacement.
    pub fn new(bundle: &'a mut Bundle, is_font: impl Fn(&str) -> bool + 'a) -> Self {
        BundleRewriter {
            bundle,
            is_font: Box::new(is_font),
            changed: Vec::new(),
        }
    }

    /// The names of assets whose content changed.
    pub fn changed(&self) -> &[String] {
        &self.changed
    }

    pub fn into_changed(self) -> Vec<String> {
        self.changed
    }
}

impl Rewriter for BundleRewriter<'_> {
    fn apply(&mut self, replacement: &Replacement) {
        let entry = &replacement.entry;
        for (file_name, asset) in self.bundle.assets.iter_mut() {
            if asset.kind != AssetKind::Asset
                || !(self.is_font)(file_name.as_str())
                || FontIdentity::from_file_name(file_name) != entry.identity
                || asset.source == entry.subset_bytes
            {
                continue;
            }
            debug!("Replacing {file_name} with the subset of {}", entry.identity);
            asset.source = entry.subset_bytes.clone();
            if !self.changed.contains(file_name) {
                self.changed.push(file_name.clone());
            }
        }
    }
}
