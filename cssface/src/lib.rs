//! Reads `@font-face` rules, and the code points they ask for, out of stylesheets.
//!
//! This is the frontend of font subsetting: text goes in, a closed syntax model
//! ([`syntax::Stylesheet`]) comes out, and [`extract::font_faces`] pulls the
//! `font-family`, `src` and `unicode-range` of each `@font-face` rule from it.

mod error;
pub mod extract;
mod lexer;
pub mod syntax;
pub mod unicode_range;

pub use error::Error;
pub use extract::{font_faces, font_url, FontFaceDeclaration};
pub use syntax::{parse, parse_with, Dialect, Stylesheet};
pub use unicode_range::{parse_unicode_range, CodePointRange};
