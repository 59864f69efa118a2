//! Recursive-descent recognizer for mailbox, domain and path syntax
//!
//! Every production runs against a [`Cursor`] over a single input line. A
//! production either consumes exactly what it matched and returns `Ok`, or
//! returns a [`ParseError`] with the cursor back where it started. Commands
//! try several grammars against the same line, so no production may leave a
//! partial advance behind.
//!
//! ```text
//! string       = 1*char
//! local-part   = string
//! element      = letter *(letter | digit)
//! domain       = element ("." element)*
//! mailbox      = local-part "@" domain
//! path         = "<" mailbox ">"
//! whitespace   = 1*(" " | tab)
//! nullspace    = [whitespace]
//! terminator   = "\n" | "\r"
//! ```

use std::fmt;
use std::str::FromStr;

/// Bytes that may never appear in a local-part
const SPECIALS: &[u8] = b"<>()[]\\.,;:@\"";

/// A production failed to match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Name of the production that failed
    pub production: &'static str,
    /// Byte offset of the lookahead when it failed
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {} at position {}", self.production, self.position)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// A `char` in the address grammar: printable ASCII minus specials and space
pub fn is_char(byte: u8) -> bool {
    (33..=126).contains(&byte) && !SPECIALS.contains(&byte)
}

/// ASCII letters only. Digits are never accepted where a letter is required.
pub fn is_letter(byte: u8) -> bool {
    byte.is_ascii_alphabetic()
}

pub fn is_digit(byte: u8) -> bool {
    byte.is_ascii_digit()
}

pub fn is_sp(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// A validated `local-part@domain` address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    local_part: String,
    domain: String,
}

impl Address {
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mailbox(s)
    }
}

/// Index-based scanner over one line of input
///
/// The lookahead is the byte at the current position, `None` once the line is
/// exhausted. Cursors are created per parse attempt and never shared.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current lookahead byte
    pub fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    /// Unconsumed remainder of the line
    pub fn rest(&self) -> &'a str {
        self.line.get(self.pos..).unwrap_or_default()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, production: &'static str) -> ParseError {
        ParseError {
            production,
            position: self.pos,
        }
    }

    // Every matcher only steps over ASCII bytes, so `start..pos` is always
    // on a char boundary.
    fn slice(&self, start: usize) -> &'a str {
        self.line.get(start..self.pos).unwrap_or_default()
    }

    /// Run `production`, restoring the cursor if it fails
    pub fn attempt<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let mark = self.pos;
        let result = production(self);
        if result.is_err() {
            self.pos = mark;
        }
        result
    }

    /// Consume `byte` or fail as `production`
    pub fn expect(&mut self, byte: u8, production: &'static str) -> ParseResult<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(production))
        }
    }

    /// Match a case-sensitive literal such as a command keyword
    pub fn literal(&mut self, word: &'static str) -> ParseResult<()> {
        if self.rest().as_bytes().starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(())
        } else {
            Err(self.error(word))
        }
    }

    pub fn sp(&mut self) -> ParseResult<()> {
        match self.peek() {
            Some(byte) if is_sp(byte) => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error("SP")),
        }
    }

    pub fn whitespace(&mut self) -> ParseResult<()> {
        self.sp().map_err(|_| self.error("whitespace"))?;
        while self.sp().is_ok() {}
        Ok(())
    }

    /// Optional whitespace; never fails
    pub fn nullspace(&mut self) {
        let _ = self.whitespace();
    }

    /// A single `\n` or `\r`. Whatever follows on the line is not inspected.
    pub fn terminator(&mut self) -> ParseResult<()> {
        match self.peek() {
            Some(b'\n' | b'\r') => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error("terminator")),
        }
    }

    pub fn string(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(is_char) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("string"));
        }
        Ok(self.slice(start))
    }

    pub fn local_part(&mut self) -> ParseResult<&'a str> {
        self.string().map_err(|_| self.error("local-part"))
    }

    pub fn element(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(byte) if is_letter(byte) => self.bump(),
            _ => return Err(self.error("element")),
        }
        while self
            .peek()
            .is_some_and(|byte| is_letter(byte) || is_digit(byte))
        {
            self.bump();
        }
        Ok(self.slice(start))
    }

    /// Dot-separated elements. A trailing or doubled `.` fails the whole domain.
    pub fn domain(&mut self) -> ParseResult<&'a str> {
        self.attempt(|c| {
            let start = c.pos;
            c.element()?;
            while c.peek() == Some(b'.') {
                c.bump();
                c.element()?;
            }
            Ok(c.slice(start))
        })
    }

    pub fn mailbox(&mut self) -> ParseResult<Address> {
        self.attempt(|c| {
            let local_part = c.local_part()?;
            c.expect(b'@', "mailbox")?;
            let domain = c.domain()?;
            Ok(Address {
                local_part: local_part.to_owned(),
                domain: domain.to_owned(),
            })
        })
    }

    pub fn path(&mut self) -> ParseResult<Address> {
        self.attempt(|c| {
            c.expect(b'<', "path")?;
            let address = c.mailbox()?;
            c.expect(b'>', "path")?;
            Ok(address)
        })
    }

    pub fn reverse_path(&mut self) -> ParseResult<Address> {
        self.path()
    }

    pub fn forward_path(&mut self) -> ParseResult<Address> {
        self.path()
    }
}

/// Parse a bare mailbox as typed by a user, e.g. `"alice@example.com\n"`
///
/// Surrounding whitespace and a single terminator are allowed.
pub fn parse_mailbox(text: &str) -> ParseResult<Address> {
    let mut cursor = Cursor::new(text);
    cursor.nullspace();
    let address = cursor.mailbox()?;
    cursor.nullspace();
    if !cursor.is_at_end() {
        cursor.terminator()?;
    }
    Ok(address)
}

/// Parse text that must be exactly one domain
pub fn parse_domain(text: &str) -> ParseResult<&str> {
    let mut cursor = Cursor::new(text);
    let domain = cursor.domain()?;
    if !cursor.is_at_end() {
        return Err(cursor.error("end of domain"));
    }
    Ok(domain)
}
