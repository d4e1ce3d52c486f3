//! Splits stylesheet text into a flat run of lexemes.
//!
//! Whitespace and comments are dropped; the parser only ever needs to know
//! where the meaningful bits are.

use crate::{syntax::Dialect, Error};

const EOF: u8 = 0x0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Lexeme {
    pub(crate) start: usize,
    pub(crate) len: usize,
    pub(crate) kind: Kind,
}

impl Lexeme {
    pub(crate) fn end(&self) -> usize {
        self.start + self.len
    }

    pub(crate) fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    // a name, a number, a dimension, a hash, a unicode range or any other block of
    // non-punctuation. We never need to tell these apart.
    Word,
    // `@` followed by a word
    AtKeyword,
    String,
    // unquoted `url(...)`, the `url(` and `)` included
    Url,
    // a word immediately followed by `(`, the `(` included
    Function,
    Semi,
    Comma,
    Colon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LSquare,
    RSquare,
    Delim,
    Eof,
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
    dialect: Dialect,
}

fn is_ascii_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C')
}

fn is_word_byte(b: u8) -> bool {
    !is_ascii_whitespace(b)
        && !matches!(
            b,
            EOF | b'"'
                | b'\''
                | b'('
                | b')'
                | b'{'
                | b'}'
                | b'['
                | b']'
                | b';'
                | b':'
                | b','
                | b'/'
                | b'@'
        )
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str, dialect: Dialect) -> Self {
        Cursor {
            input,
            pos: 0,
            dialect,
        }
    }

    fn nth(&self, index: usize) -> u8 {
        self.input
            .as_bytes()
            .get(self.pos + index)
            .copied()
            .unwrap_or(EOF)
    }

    /// Advance one byte. Never moves past the end of input.
    fn bump(&mut self) -> Option<u8> {
        let byte = self.input.as_bytes().get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// The next lexeme, or `None` for whitespace and comments.
    fn next_lexeme(&mut self) -> Result<Option<Lexeme>, Error> {
        let start = self.pos;
        let Some(first) = self.bump() else {
            return Ok(Some(Lexeme {
                start,
                len: 0,
                kind: Kind::Eof,
            }));
        };
        let kind = match first {
            byte if is_ascii_whitespace(byte) => {
                self.whitespace();
                return Ok(None);
            }
            b'/' if self.nth(0) == b'*' => {
                self.block_comment(start)?;
                return Ok(None);
            }
            b'/' if self.nth(0) == b'/' && self.dialect == Dialect::Preprocessor => {
                self.line_comment();
                return Ok(None);
            }
            b'"' | b'\'' => self.string(first, start)?,
            b'@' if is_word_byte(self.nth(0)) => {
                self.eat_word();
                Kind::AtKeyword
            }
            b';' => Kind::Semi,
            b',' => Kind::Comma,
            b':' => Kind::Colon,
            b'{' => Kind::LBrace,
            b'}' => Kind::RBrace,
            b'(' => Kind::LParen,
            b')' => Kind::RParen,
            b'[' => Kind::LSquare,
            b']' => Kind::RSquare,
            b'/' | b'@' => Kind::Delim,
            b'\\' => {
                // an escape starts a word; keep the escaped byte with it
                self.bump();
                self.eat_word();
                Kind::Word
            }
            _ => {
                self.eat_word();
                self.word_or_function(start)?
            }
        };
        Ok(Some(Lexeme {
            start,
            len: self.pos - start,
            kind,
        }))
    }

    fn whitespace(&mut self) {
        while is_ascii_whitespace(self.nth(0)) {
            self.bump();
        }
    }

    fn block_comment(&mut self, start: usize) -> Result<(), Error> {
        self.bump(); // the '*'
        loop {
            match (self.nth(0), self.nth(1)) {
                (b'*', b'/') => {
                    self.pos += 2;
                    return Ok(());
                }
                _ if self.at_eof() => return Err(Error::UnclosedComment(start)),
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn line_comment(&mut self) {
        while !self.at_eof() && self.nth(0) != b'\n' {
            self.bump();
        }
    }

    fn string(&mut self, quote: u8, start: usize) -> Result<Kind, Error> {
        loop {
            match self.bump() {
                Some(b'\\') => {
                    self.bump();
                }
                Some(b) if b == quote => return Ok(Kind::String),
                Some(_) => (),
                None => return Err(Error::UnclosedString(start)),
            }
        }
    }

    fn eat_word(&mut self) {
        while is_word_byte(self.nth(0)) {
            if self.bump() == Some(b'\\') {
                self.bump();
            }
        }
    }

    fn word_or_function(&mut self, start: usize) -> Result<Kind, Error> {
        if self.nth(0) != b'(' {
            return Ok(Kind::Word);
        }
        let name = &self.input[start..self.pos];
        self.bump(); // the '('
        if !name.eq_ignore_ascii_case("url") {
            return Ok(Kind::Function);
        }

        // url("...") is a plain function holding a string, url(...) is its own thing
        let mut ahead = 0;
        while is_ascii_whitespace(self.nth(ahead)) {
            ahead += 1;
        }
        if matches!(self.nth(ahead), b'"' | b'\'') {
            return Ok(Kind::Function);
        }
        loop {
            match self.bump() {
                Some(b')') => return Ok(Kind::Url),
                Some(b'\\') => {
                    self.bump();
                }
                Some(_) => (),
                None => return Err(Error::UnclosedUrl(start)),
            }
        }
    }
}

/// Lex the whole input; the final lexeme is always [`Kind::Eof`].
pub(crate) fn tokenize(input: &str, dialect: Dialect) -> Result<Vec<Lexeme>, Error> {
    let mut cursor = Cursor::new(input, dialect);
    let mut lexemes = Vec::new();
    loop {
        let Some(lexeme) = cursor.next_lexeme()? else {
            continue;
        };
        lexemes.push(lexeme);
        if lexeme.kind == Kind::Eof {
            return Ok(lexemes);
        }
    }
}
