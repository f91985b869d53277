//! Tokenizer for RGVM assembly source.
//!
//! Token set: identifiers (labels, mnemonics, register names), numbers
//! in decimal (optional `#` prefix, optional sign) or hex (`$` prefix,
//! optional sign) form, double-quoted string literals with escapes
//! (`\n \t \r \\ \" \0`), `%` directives, `:` and line breaks.
//! Comments start with `;` and run to end of line.
//!
//! Every token carries its 1-based line and column for error reporting.

use super::{AsmError, AsmErrorKind};

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier: label, mnemonic or register name
    Ident(String),
    /// Numeric literal, stored as its 32-bit two's-complement value
    Number(u32),
    /// String literal with escapes applied (bytes, not chars)
    Str(Vec<u8>),
    /// `%name` directive keyword (without the `%`)
    Directive(String),
    /// `:`
    Colon,
    /// End of line
    Newline,
}

/// A token plus its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

/// Tokenize a whole source file.
pub fn tokenize(source: &str) -> Result<Vec<Token>, AsmError> {
    Lexer {
        source: source.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    }
    .run()
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, AsmError> {
        let mut tokens = Vec::new();

        while let Some(&byte) = self.source.get(self.pos) {
            let (line, col) = (self.line, self.col);
            match byte {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    tokens.push(Token { kind: TokenKind::Newline, line, col });
                    self.advance();
                }
                b';' => {
                    while let Some(&c) = self.source.get(self.pos) {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                b':' => {
                    tokens.push(Token { kind: TokenKind::Colon, line, col });
                    self.advance();
                }
                b'%' => {
                    self.advance();
                    let name = self.take_word();
                    if name.is_empty() {
                        return Err(self.error_at(
                            AsmErrorKind::Parse,
                            line,
                            col,
                            "expected directive name after '%'",
                        ));
                    }
                    tokens.push(Token { kind: TokenKind::Directive(name), line, col });
                }
                b'"' => {
                    let bytes = self.take_string(line, col)?;
                    tokens.push(Token { kind: TokenKind::Str(bytes), line, col });
                }
                b'$' | b'#' | b'-' | b'0'..=b'9' => {
                    let value = self.take_number(line, col)?;
                    tokens.push(Token { kind: TokenKind::Number(value), line, col });
                }
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                    let word = self.take_word();
                    tokens.push(Token { kind: TokenKind::Ident(word), line, col });
                }
                other => {
                    return Err(self.error_at(
                        AsmErrorKind::Parse,
                        line,
                        col,
                        format!("unexpected character '{}'", other as char),
                    ));
                }
            }
        }

        Ok(tokens)
    }

    fn advance(&mut self) {
        if self.source.get(self.pos) == Some(&b'\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    fn take_word(&mut self) -> String {
        let start = self.pos;
        while let Some(&c) = self.source.get(self.pos) {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }

    fn take_string(&mut self, line: usize, col: usize) -> Result<Vec<u8>, AsmError> {
        self.advance(); // opening quote
        let mut bytes = Vec::new();

        loop {
            let Some(&c) = self.source.get(self.pos) else {
                return Err(self.error_at(
                    AsmErrorKind::Parse,
                    line,
                    col,
                    "unterminated string literal",
                ));
            };
            match c {
                b'"' => {
                    self.advance();
                    return Ok(bytes);
                }
                b'\n' => {
                    return Err(self.error_at(
                        AsmErrorKind::Parse,
                        line,
                        col,
                        "unterminated string literal",
                    ));
                }
                b'\\' => {
                    self.advance();
                    let Some(&esc) = self.source.get(self.pos) else {
                        return Err(self.error_at(
                            AsmErrorKind::Parse,
                            line,
                            col,
                            "unterminated string literal",
                        ));
                    };
                    bytes.push(match esc {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'\\' => b'\\',
                        b'"' => b'"',
                        b'0' => 0,
                        other => {
                            return Err(self.error_at(
                                AsmErrorKind::Parse,
                                self.line,
                                self.col,
                                format!("invalid escape sequence '\\{}'", other as char),
                            ));
                        }
                    });
                    self.advance();
                }
                other => {
                    bytes.push(other);
                    self.advance();
                }
            }
        }
    }

    fn take_number(&mut self, line: usize, col: usize) -> Result<u32, AsmError> {
        let hex = self.source.get(self.pos) == Some(&b'$');
        if hex || self.source.get(self.pos) == Some(&b'#') {
            self.advance();
        }

        let negative = self.source.get(self.pos) == Some(&b'-');
        if negative {
            self.advance();
        }

        let start = self.pos;
        while let Some(&c) = self.source.get(self.pos) {
            let is_digit = if hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            };
            if is_digit {
                self.advance();
            } else {
                break;
            }
        }

        let digits = &self.source[start..self.pos];
        if digits.is_empty() {
            return Err(self.error_at(
                AsmErrorKind::InvalidImmediate,
                line,
                col,
                if hex {
                    "missing hex digits after '$'"
                } else {
                    "missing decimal digits"
                },
            ));
        }

        let digits = std::str::from_utf8(digits).expect("digits are ascii");
        let radix = if hex { 16 } else { 10 };
        let magnitude = u32::from_str_radix(digits, radix).map_err(|_| {
            self.error_at(
                AsmErrorKind::InvalidImmediate,
                line,
                col,
                format!("number out of range: {}", digits),
            )
        })?;

        Ok(if negative {
            (magnitude as i64).wrapping_neg() as u32
        } else {
            magnitude
        })
    }

    fn error_at(
        &self,
        kind: AsmErrorKind,
        line: usize,
        col: usize,
        message: impl Into<String>,
    ) -> AsmError {
        AsmError::new(kind, line, col, message)
    }
}
