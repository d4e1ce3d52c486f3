//! Pulls `@font-face` declarations out of a parsed stylesheet.

use log::debug;

use crate::{
    syntax::{join_tokens, BlockItem, Declaration, Rule, Stylesheet, Token},
    unicode_range::{parse_unicode_range, CodePointRange},
};

const FONT_FAMILY: &str = "font-family";
const SRC: &str = "src";
const UNICODE_RANGE: &str = "unicode-range";

/// A `@font-face` rule carrying everything needed to subset its fonts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceDeclaration {
    /// As written, quotes included
    pub font_family: String,
    /// The comma separated entries of `src`, each trimmed, such as
    /// `url(a.woff2) format("woff2")`
    pub src_urls: Vec<String>,
    /// Never empty
    pub ranges: Vec<CodePointRange>,
}

impl FontFaceDeclaration {
    /// The family name without surrounding quotes.
    pub fn family(&self) -> &str {
        let family = self.font_family.trim();
        for quote in ['"', '\''] {
            if let Some(inner) = family
                .strip_prefix(quote)
                .and_then(|f| f.strip_suffix(quote))
            {
                return inner;
            }
        }
        family
    }
}

/// Every top-level `@font-face` rule with a family, a src and a usable unicode-range,
/// in source order.
pub fn font_faces(stylesheet: &Stylesheet) -> Vec<FontFaceDeclaration> {
    stylesheet
        .rules
        .iter()
        .filter_map(|rule| match rule {
            Rule::At(at) if at.name.eq_ignore_ascii_case("font-face") => at.block.as_deref(),
            _ => None,
        })
        .filter_map(font_face)
        .collect()
}

fn font_face(block: &[BlockItem]) -> Option<FontFaceDeclaration> {
    let (Some(family), Some(src), Some(unicode_range)) = (
        first_declaration(block, FONT_FAMILY),
        first_declaration(block, SRC),
        first_declaration(block, UNICODE_RANGE),
    ) else {
        debug!("Skipping @font-face without {FONT_FAMILY}, {SRC} and {UNICODE_RANGE}");
        return None;
    };

    let ranges = parse_unicode_range(&unicode_range.value_text());
    if ranges.is_empty() {
        debug!(
            "Skipping @font-face with no usable {UNICODE_RANGE} '{}'",
            unicode_range.value_text()
        );
        return None;
    }

    let src_urls: Vec<_> = src
        .value
        .split(|token| *token == Token::Comma)
        .map(|entry| join_tokens(entry).trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();
    if src_urls.is_empty() {
        return None;
    }

    Some(FontFaceDeclaration {
        font_family: family.value_text(),
        src_urls,
        ranges,
    })
}

fn first_declaration<'a>(block: &'a [BlockItem], property: &str) -> Option<&'a Declaration> {
    block.iter().find_map(|item| match item {
        BlockItem::Declaration(decl) if decl.property == property => Some(decl),
        _ => None,
    })
}

/// The URL referenced by one `src` entry, such as `a.woff2` for
/// `url("a.woff2") format("woff2")`.
///
/// None when the entry has no `url(...)`, such as `local(Arial)`.
pub fn font_url(entry: &str) -> Option<&str> {
    let start = entry.to_ascii_lowercase().find("url(")? + "url(".len();
    let rest = entry[start..].trim_start();
    let url = match rest.chars().next()? {
        quote @ ('"' | '\'') => {
            let inner = &rest[1..];
            &inner[..inner.find(quote)?]
        }
        _ => rest[..rest.find(')')?].trim_end(),
    };
    (!url.is_empty()).then_some(url)
}
