//! Total parser for the text notation.
//!
//! Grammar:
//!
//! ```text
//! value  := integer | boolean | name | object | array
//! object := '{' (name ':' value (',' name ':' value)* ','?)? '}'
//! array  := '{' (value (',' value)* ','?)? '}'
//! ```
//!
//! Integer literals accept decimal and `0x`-prefixed hexadecimal forms with
//! `_` permitted between digits. `#` starts a comment running to the end of
//! the line, so annotated writer output parses back. Empty braces parse as
//! an empty object; the updater accepts that for arrays too.
//!
//! The parser is an explicit-stack machine iterating over the input bytes:
//! every step consumes at least one token, so it terminates for any input,
//! never reads past the input length, and reports malformed or truncated
//! input as an error instead of faulting.

use crate::ast::TextValue;
use crate::errors::TextError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LBrace,
    RBrace,
    Colon,
    Comma,
    Int(i64),
    Bool(bool),
    Name(String),
    End,
}

struct Lexer<'s> {
    input: &'s [u8],
    pos: usize,
    /// Lookahead of up to two tokens, used to tell objects from arrays.
    peeked: Vec<(Token, usize)>,
}

impl<'s> Lexer<'s> {
    fn new(input: &'s str) -> Self {
        Lexer {
            input: input.as_bytes(),
            pos: 0,
            peeked: Vec::new(),
        }
    }

    fn next_token(&mut self) -> Result<(Token, usize), TextError> {
        if self.peeked.is_empty() {
            self.lex()
        } else {
            Ok(self.peeked.remove(0))
        }
    }

    fn peek(&mut self, depth: usize) -> Result<&Token, TextError> {
        while self.peeked.len() <= depth {
            let t = self.lex()?;
            self.peeked.push(t);
        }
        Ok(&self.peeked[depth].0)
    }

    fn skip_blank(&mut self) {
        while let Some(&b) = self.input.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'#' => {
                    while self.input.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex(&mut self) -> Result<(Token, usize), TextError> {
        self.skip_blank();
        let at = self.pos;
        let Some(&b) = self.input.get(self.pos) else {
            return Ok((Token::End, at));
        };
        self.pos += 1;
        let token = match b {
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'-' | b'0'..=b'9' => {
                self.pos -= 1;
                self.lex_number(at)?
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.pos -= 1;
                self.lex_name()
            }
            _ => {
                // Input is valid UTF-8; recover the full character for the
                // error message.
                let ch = std::str::from_utf8(&self.input[at..])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                return Err(TextError::UnexpectedChar { at, ch });
            }
        };
        Ok((token, at))
    }

    fn lex_number(&mut self, at: usize) -> Result<Token, TextError> {
        let negative = self.input.get(self.pos) == Some(&b'-');
        if negative {
            self.pos += 1;
        }
        let hex = self.input.get(self.pos) == Some(&b'0')
            && matches!(self.input.get(self.pos + 1), Some(&b'x') | Some(&b'X'));
        if hex {
            self.pos += 2;
        }
        let mut digits = 0usize;
        let mut magnitude = 0u64;
        while let Some(&b) = self.input.get(self.pos) {
            let digit = match b {
                b'_' => {
                    self.pos += 1;
                    continue;
                }
                b'0'..=b'9' => (b - b'0') as u64,
                b'a'..=b'f' if hex => (b - b'a' + 10) as u64,
                b'A'..=b'F' if hex => (b - b'A' + 10) as u64,
                _ => break,
            };
            let base = if hex { 16 } else { 10 };
            magnitude = magnitude
                .checked_mul(base)
                .and_then(|m| m.checked_add(digit))
                .ok_or(TextError::NumberOverflow(at))?;
            digits += 1;
            self.pos += 1;
        }
        if digits == 0 {
            return Err(TextError::UnexpectedToken(at));
        }
        let value = if negative {
            if magnitude > i64::MAX as u64 + 1 {
                return Err(TextError::NumberOverflow(at));
            }
            (magnitude as i128).wrapping_neg() as i64
        } else {
            if !hex && magnitude > i64::MAX as u64 {
                return Err(TextError::NumberOverflow(at));
            }
            // Hex literals up to 0xFFFF_FFFF_FFFF_FFFF wrap into i64, matching
            // how 64-bit unsigned fields are carried.
            magnitude as i64
        };
        Ok(Token::Int(value))
    }

    /// Consumes a name token, or fails on anything else.
    fn next_name(&mut self) -> Result<String, TextError> {
        let (token, at) = self.next_token()?;
        match token {
            Token::Name(name) => Ok(name),
            Token::End => Err(TextError::UnexpectedEnd),
            _ => Err(TextError::UnexpectedToken(at)),
        }
    }

    /// Consumes the given punctuation token, or fails on anything else.
    fn expect(&mut self, want: Token) -> Result<(), TextError> {
        let (token, at) = self.next_token()?;
        if token == want {
            Ok(())
        } else if token == Token::End {
            Err(TextError::UnexpectedEnd)
        } else {
            Err(TextError::UnexpectedToken(at))
        }
    }

    fn lex_name(&mut self) -> Token {
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        match name.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            _ => Token::Name(name),
        }
    }
}

enum Frame {
    Object {
        entries: Vec<(String, TextValue)>,
        /// Name awaiting its value.
        name: String,
    },
    Array {
        items: Vec<TextValue>,
    },
}

/// Parses one complete value followed by end of input.
pub fn parse_text(input: &str) -> Result<TextValue, TextError> {
    let mut lex = Lexer::new(input);
    let mut stack: Vec<Frame> = Vec::new();
    let mut value: Option<TextValue> = None;

    loop {
        let v = match value.take() {
            Some(v) => v,
            None => {
                let (token, at) = lex.next_token()?;
                match token {
                    Token::LBrace => {
                        if *lex.peek(0)? == Token::RBrace {
                            lex.next_token()?;
                            value = Some(TextValue::Object(Vec::new()));
                        } else if matches!(lex.peek(0)?, Token::Name(_))
                            && *lex.peek(1)? == Token::Colon
                        {
                            let name = lex.next_name()?;
                            lex.expect(Token::Colon)?;
                            stack.push(Frame::Object {
                                entries: Vec::new(),
                                name,
                            });
                        } else {
                            stack.push(Frame::Array { items: Vec::new() });
                        }
                        continue;
                    }
                    Token::Int(v) => TextValue::Int(v),
                    Token::Bool(b) => TextValue::Bool(b),
                    Token::Name(n) => TextValue::Name(n),
                    Token::End => return Err(TextError::UnexpectedEnd),
                    _ => return Err(TextError::UnexpectedToken(at)),
                }
            }
        };

        // A value is complete: attach it to the enclosing frame, or finish.
        match stack.pop() {
            None => {
                let (token, at) = lex.next_token()?;
                return match token {
                    Token::End => Ok(v),
                    _ => Err(TextError::TrailingInput(at)),
                };
            }
            Some(Frame::Object { mut entries, name }) => {
                entries.push((name, v));
                let (token, at) = lex.next_token()?;
                match token {
                    Token::RBrace => value = Some(TextValue::Object(entries)),
                    Token::Comma => {
                        if *lex.peek(0)? == Token::RBrace {
                            lex.next_token()?;
                            value = Some(TextValue::Object(entries));
                        } else {
                            let name = lex.next_name()?;
                            lex.expect(Token::Colon)?;
                            stack.push(Frame::Object { entries, name });
                        }
                    }
                    Token::End => return Err(TextError::UnexpectedEnd),
                    _ => return Err(TextError::UnexpectedToken(at)),
                }
            }
            Some(Frame::Array { mut items }) => {
                items.push(v);
                let (token, at) = lex.next_token()?;
                match token {
                    Token::RBrace => value = Some(TextValue::Array(items)),
                    Token::Comma => {
                        if *lex.peek(0)? == Token::RBrace {
                            lex.next_token()?;
                            value = Some(TextValue::Array(items));
                        } else {
                            stack.push(Frame::Array { items });
                        }
                    }
                    Token::End => return Err(TextError::UnexpectedEnd),
                    _ => return Err(TextError::UnexpectedToken(at)),
                }
            }
        }
    }
}
