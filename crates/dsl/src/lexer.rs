//! Hand-written tokenizer shared by the wave, board, and contract grammars.
//!
//! Token kinds: `Identifier` (unquoted run of non-whitespace, non-symbol
//! characters), `String` (double-quoted with `\n \t \r \\ \"` escapes),
//! `Symbol` (one of `{ } = ;`), `End`. Whitespace, `//` and `#` line
//! comments, and `/* ... */` block comments are skipped between tokens.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    String,
    Symbol,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {:?}({:?})", self.line, self.column, self.kind, self.text)
    }
}

fn is_symbol_char(c: char) -> bool {
    matches!(c, '{' | '}' | '=' | ';')
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    peeked: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn curr(&self) -> char {
        if self.eof() {
            '\0'
        } else {
            self.chars[self.pos]
        }
    }

    fn next_char(&self) -> char {
        if self.pos + 1 < self.chars.len() {
            self.chars[self.pos + 1]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        if self.eof() {
            return;
        }
        if self.chars[self.pos] == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += 1;
    }

    fn skip_line_comment(&mut self) {
        while !self.eof() && self.curr() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance();
        self.advance();
        while !self.eof() {
            if self.curr() == '*' && self.next_char() == '/' {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn skip_ignorable(&mut self) {
        loop {
            if self.eof() {
                return;
            }
            if self.curr().is_whitespace() {
                self.advance();
                continue;
            }
            if self.curr() == '/' && self.next_char() == '*' {
                self.skip_block_comment();
                continue;
            }
            if self.curr() == '/' && self.next_char() == '/' {
                self.skip_line_comment();
                continue;
            }
            if self.curr() == '#' {
                self.skip_line_comment();
                continue;
            }
            return;
        }
    }

    fn parse_string_token(&mut self) -> Result<Token, String> {
        let line = self.line;
        let column = self.column;
        let mut out = String::new();
        self.advance(); // opening quote
        loop {
            if self.eof() {
                return Err(format!(
                    "unterminated string literal starting at {}:{}",
                    line, column
                ));
            }
            let c = self.curr();
            if c == '"' {
                self.advance();
                return Ok(Token {
                    kind: TokenKind::String,
                    text: out,
                    line,
                    column,
                });
            }
            if c == '\\' {
                self.advance();
                if self.eof() {
                    break;
                }
                let esc = self.curr();
                out.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    other => other,
                });
                self.advance();
                continue;
            }
            out.push(c);
            self.advance();
        }
        Err(format!(
            "unterminated string literal starting at {}:{}",
            line, column
        ))
    }

    fn parse_identifier_token(&mut self) -> Token {
        let line = self.line;
        let column = self.column;
        let mut out = String::new();
        while !self.eof() {
            let c = self.curr();
            if c.is_whitespace() || is_symbol_char(c) {
                break;
            }
            if c == '/' && (self.next_char() == '*' || self.next_char() == '/') {
                break;
            }
            if c == '#' {
                break;
            }
            out.push(c);
            self.advance();
        }
        Token {
            kind: TokenKind::Identifier,
            text: out,
            line,
            column,
        }
    }

    fn next_impl(&mut self) -> Result<Token, String> {
        self.skip_ignorable();
        if self.eof() {
            return Ok(Token {
                kind: TokenKind::End,
                text: String::new(),
                line: self.line,
                column: self.column,
            });
        }
        let line = self.line;
        let column = self.column;
        let c = self.curr();
        if is_symbol_char(c) {
            self.advance();
            return Ok(Token {
                kind: TokenKind::Symbol,
                text: c.to_string(),
                line,
                column,
            });
        }
        if c == '"' {
            return self.parse_string_token();
        }
        Ok(self.parse_identifier_token())
    }

    pub fn peek(&mut self) -> Result<Token, String> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_impl()?);
        }
        Ok(self.peeked.clone().unwrap())
    }

    pub fn next(&mut self) -> Result<Token, String> {
        if let Some(t) = self.peeked.take() {
            return Ok(t);
        }
        self.next_impl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_identifiers_symbols_and_strings() {
        let mut lex = Lexer::new(r#"WAVE p { PATH="a b"; }"#);
        let toks: Vec<Token> = std::iter::from_fn(|| match lex.next() {
            Ok(t) if t.kind != TokenKind::End => Some(t),
            _ => None,
        })
        .collect();
        assert_eq!(toks[0].text, "WAVE");
        assert_eq!(toks[1].text, "p");
        assert_eq!(toks[2].kind, TokenKind::Symbol);
        assert_eq!(toks[4].kind, TokenKind::Symbol); // '='
        assert_eq!(toks[5].text, "a b");
        assert_eq!(toks[5].kind, TokenKind::String);
    }

    #[test]
    fn skips_all_comment_styles() {
        let mut lex = Lexer::new("# line\nWAVE // trailing\n/* block */ p");
        let a = lex.next().unwrap();
        let b = lex.next().unwrap();
        assert_eq!(a.text, "WAVE");
        assert_eq!(b.text, "p");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lex = Lexer::new("WAVE p");
        let peeked = lex.peek().unwrap();
        let next = lex.next().unwrap();
        assert_eq!(peeked, next);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lex = Lexer::new("\"unterminated");
        assert!(lex.next().is_err());
    }
}
