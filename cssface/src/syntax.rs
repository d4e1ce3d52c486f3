//! A closed model of the parts of CSS syntax we consume.
//!
//! Rules, declarations and component values. Selectors,
//! media queries and property values are never interpreted beyond being tokens.

use std::fmt::{self, Display, Write};

use crate::{
    lexer::{self, Kind, Lexeme},
    Error,
};

/// Which flavour of stylesheet syntax to accept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Plain CSS
    #[default]
    Css,
    /// scss, less, stylus and friends; adds `//` line comments
    Preprocessor,
}

impl Dialect {
    /// Guess the dialect from a file extension, such as `"scss"`.
    pub fn from_extension(ext: &str) -> Dialect {
        match ext.to_ascii_lowercase().as_str() {
            "scss" | "sass" | "less" | "styl" | "stylus" => Dialect::Preprocessor,
            _ => Dialect::Css,
        }
    }
}

/// A parsed stylesheet.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    At(AtRule),
    Qualified(QualifiedRule),
}

/// Such as `@font-face { ... }` or `@import url(x.css);`
#[derive(Debug, Clone, PartialEq)]
pub struct AtRule {
    /// The name without the leading '@'
    pub name: String,
    pub prelude: Vec<Token>,
    /// None for statement at-rules, those ending in ';'
    pub block: Option<Vec<BlockItem>>,
}

/// A selector and its block, such as `a:hover { color: red }`
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedRule {
    pub prelude: Vec<Token>,
    pub block: Vec<BlockItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Declaration(Declaration),
    Rule(Rule),
}

/// `property: value [!important]`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: Vec<Token>,
    pub important: bool,
}

impl Declaration {
    /// The value as text, tokens joined by single spaces.
    pub fn value_text(&self) -> String {
        join_tokens(&self.value)
    }
}

/// A component value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identifiers, numbers, dimensions, hashes, unicode ranges...
    Word(String),
    /// The unescaped content of a quoted string
    String(String),
    /// The content of an unquoted `url(...)`
    Url(String),
    Function { name: String, args: Vec<Token> },
    /// A `(...)`, `[...]` or `{...}` group
    Block { open: char, content: Vec<Token> },
    Comma,
    Colon,
    Delim(char),
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::String(s) => {
                f.write_char('"')?;
                for ch in s.chars() {
                    if matches!(ch, '"' | '\\') {
                        f.write_char('\\')?;
                    }
                    f.write_char(ch)?;
                }
                f.write_char('"')
            }
            Token::Url(url) => write!(f, "url({url})"),
            Token::Function { name, args } => write!(f, "{name}({})", join_tokens(args)),
            Token::Block { open, content } => {
                write!(f, "{open}{}{}", join_tokens(content), closing(*open))
            }
            Token::Comma => f.write_char(','),
            Token::Colon => f.write_char(':'),
            Token::Delim(ch) => f.write_char(*ch),
        }
    }
}

/// Render tokens back to text, separated by single spaces.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut text = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        // writing to a String can't fail
        let _ = write!(text, "{token}");
    }
    text
}

/// Parse plain CSS.
pub fn parse(text: &str) -> Result<Stylesheet, Error> {
    parse_with(text, Dialect::Css)
}

/// Parse in the given dialect.
pub fn parse_with(text: &str, dialect: Dialect) -> Result<Stylesheet, Error> {
    let lexemes = lexer::tokenize(text, dialect)?;
    Parser {
        text,
        lexemes,
        pos: 0,
    }
    .stylesheet()
}

struct Parser<'a> {
    text: &'a str,
    // always ends in Eof
    lexemes: Vec<Lexeme>,
    pos: usize,
}

impl Parser<'_> {
    fn current(&self) -> Lexeme {
        self.lexemes[self.pos.min(self.lexemes.len() - 1)]
    }

    fn kind(&self) -> Kind {
        self.current().kind
    }

    fn bump(&mut self) -> Lexeme {
        let current = self.current();
        if current.kind != Kind::Eof {
            self.pos += 1;
        }
        current
    }

    fn stylesheet(mut self) -> Result<Stylesheet, Error> {
        let mut rules = Vec::new();
        loop {
            match self.kind() {
                Kind::Eof => return Ok(Stylesheet { rules }),
                Kind::Semi => {
                    self.bump();
                }
                Kind::RBrace | Kind::RParen | Kind::RSquare => {
                    return Err(self.unexpected_close());
                }
                _ => rules.extend(self.rule()?),
            }
        }
    }

    fn unexpected_close(&self) -> Error {
        let current = self.current();
        Error::UnexpectedClose {
            ch: self.text[current.start..].chars().next().unwrap_or_default(),
            offset: current.start,
        }
    }

    fn rule(&mut self) -> Result<Option<Rule>, Error> {
        if self.kind() == Kind::AtKeyword {
            self.at_rule().map(|rule| Some(Rule::At(rule)))
        } else {
            Ok(self.qualified_rule()?.map(Rule::Qualified))
        }
    }

    fn at_rule(&mut self) -> Result<AtRule, Error> {
        let keyword = self.bump();
        let name = keyword.text(self.text)[1..].to_string();
        let prelude = self.values_before(&[Kind::Semi, Kind::LBrace, Kind::RBrace])?;
        let block = match self.kind() {
            Kind::Semi => {
                self.bump();
                None
            }
            Kind::LBrace => Some(self.block()?),
            // Eof, or the '}' closing the block we're nested in
            _ => None,
        };
        Ok(AtRule {
            name,
            prelude,
            block,
        })
    }

    /// None for a prelude ended by ';', such as a top-level scss variable.
    fn qualified_rule(&mut self) -> Result<Option<QualifiedRule>, Error> {
        let start = self.current().start;
        let prelude = self.values_before(&[Kind::Semi, Kind::LBrace, Kind::RBrace])?;
        match self.kind() {
            Kind::LBrace => {
                let block = self.block()?;
                Ok(Some(QualifiedRule { prelude, block }))
            }
            Kind::Semi => {
                self.bump();
                log::debug!("Skipping statement '{}'", join_tokens(&prelude));
                Ok(None)
            }
            _ => Err(Error::MissingBlock(start)),
        }
    }

    /// Parse `{ ... }`, positioned on the '{'
    fn block(&mut self) -> Result<Vec<BlockItem>, Error> {
        let open = self.bump();
        let mut items = Vec::new();
        loop {
            match self.kind() {
                Kind::RBrace => {
                    self.bump();
                    return Ok(items);
                }
                Kind::Eof => {
                    return Err(Error::UnclosedBlock {
                        expected: '}',
                        offset: open.start,
                    })
                }
                Kind::Semi => {
                    self.bump();
                }
                Kind::AtKeyword => items.push(BlockItem::Rule(Rule::At(self.at_rule()?))),
                _ => {
                    if let Some(item) = self.declaration_or_rule()? {
                        items.push(item);
                    }
                }
            }
        }
    }

    /// Nested rules and declarations look alike until we hit '{' or ';'.
    fn declaration_or_rule(&mut self) -> Result<Option<BlockItem>, Error> {
        let checkpoint = self.pos;
        let mut values = self.values_before(&[Kind::Semi, Kind::LBrace, Kind::RBrace])?;
        if self.kind() == Kind::LBrace {
            self.pos = checkpoint;
            let rule = self.qualified_rule()?;
            return Ok(rule.map(|rule| BlockItem::Rule(Rule::Qualified(rule))));
        }

        let property = match values.as_slice() {
            [Token::Word(property), Token::Colon, ..] => property.clone(),
            _ => {
                log::debug!("Skipping malformed declaration '{}'", join_tokens(&values));
                return Ok(None);
            }
        };
        values.drain(..2);
        let important = strip_important(&mut values);
        Ok(Some(BlockItem::Declaration(Declaration {
            property,
            value: values,
            important,
        })))
    }

    /// Component values up to, not including, any of `stop` or Eof.
    fn values_before(&mut self, stop: &[Kind]) -> Result<Vec<Token>, Error> {
        let mut values = Vec::new();
        while self.kind() != Kind::Eof && !stop.contains(&self.kind()) {
            values.push(self.component_value()?);
        }
        Ok(values)
    }

    /// Component values up to the `close` matching `open`, consuming the close.
    fn values_until(&mut self, open: Lexeme, close: Kind) -> Result<Vec<Token>, Error> {
        let mut values = Vec::new();
        loop {
            match self.kind() {
                kind if kind == close => {
                    self.bump();
                    return Ok(values);
                }
                Kind::Eof => {
                    let expected = match close {
                        Kind::RParen => ')',
                        Kind::RSquare => ']',
                        _ => '}',
                    };
                    return Err(Error::UnclosedBlock {
                        expected,
                        offset: open.start,
                    });
                }
                _ => values.push(self.component_value()?),
            }
        }
    }

    fn component_value(&mut self) -> Result<Token, Error> {
        let lexeme = self.current();
        let text = lexeme.text(self.text);
        let token = match lexeme.kind {
            Kind::Word | Kind::AtKeyword => Token::Word(text.to_string()),
            Kind::String => Token::String(unescape(&text[1..text.len() - 1])),
            // url( ... )
            Kind::Url => Token::Url(text[4..text.len() - 1].trim().to_string()),
            Kind::Function => {
                self.bump();
                let args = self.values_until(lexeme, Kind::RParen)?;
                return Ok(Token::Function {
                    name: text[..text.len() - 1].to_string(),
                    args,
                });
            }
            Kind::LParen | Kind::LSquare | Kind::LBrace => {
                self.bump();
                let (open, close) = match lexeme.kind {
                    Kind::LParen => ('(', Kind::RParen),
                    Kind::LSquare => ('[', Kind::RSquare),
                    _ => ('{', Kind::RBrace),
                };
                let content = self.values_until(lexeme, close)?;
                return Ok(Token::Block { open, content });
            }
            Kind::Comma => Token::Comma,
            Kind::Colon => Token::Colon,
            Kind::Semi => Token::Delim(';'),
            Kind::Delim => Token::Delim(text.chars().next().unwrap_or_default()),
            Kind::RParen | Kind::RSquare | Kind::RBrace | Kind::Eof => {
                return Err(self.unexpected_close());
            }
        };
        self.bump();
        Ok(token)
    }
}

fn strip_important(values: &mut Vec<Token>) -> bool {
    let is_word = |token: Option<&Token>, expected: &str| {
        matches!(token, Some(Token::Word(w)) if w.eq_ignore_ascii_case(expected))
    };
    if is_word(values.last(), "!important") {
        values.pop();
        return true;
    }
    let len = values.len();
    if len >= 2 && is_word(values.get(len - 2), "!") && is_word(values.get(len - 1), "important")
    {
        values.truncate(len - 2);
        return true;
    }
    false
}

/// Resolve backslash escapes within a string.
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(*c);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            match chars.next() {
                // escaped newline is a line continuation
                Some('\n') | None => (),
                Some(other) => result.push(other),
            }
            continue;
        }
        if chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let escaped = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .filter(|c| *c != '\0')
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        result.push(escaped);
    }
    result
}
