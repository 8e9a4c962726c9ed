//! Shared parsing helpers used by the wave, board, and contract grammars.

pub mod board;
pub mod contract;
pub mod wave;

use crate::lexer::{Lexer, Token, TokenKind};
use std::path::{Path, PathBuf};
use tsiemene_types::TsiemeneError;

/// Thin wrapper around [`Lexer`] that turns raw lexer/EOF failures into
/// `InvalidDsl` errors carrying the offending file's path.
pub(crate) struct Parser<'a> {
    lexer: Lexer,
    path: &'a Path,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &str, path: &'a Path) -> Self {
        Parser {
            lexer: Lexer::new(source),
            path,
        }
    }

    fn err_at(&self, line: usize, column: usize, message: impl Into<String>) -> TsiemeneError {
        TsiemeneError::InvalidDsl {
            path: PathBuf::from(self.path),
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn peek(&mut self) -> Result<Token, TsiemeneError> {
        self.lexer
            .peek()
            .map_err(|e| self.err_at(0, 0, e))
    }

    pub(crate) fn next(&mut self) -> Result<Token, TsiemeneError> {
        self.lexer.next().map_err(|e| self.err_at(0, 0, e))
    }

    pub(crate) fn at_end(&mut self) -> Result<bool, TsiemeneError> {
        Ok(self.peek()?.kind == TokenKind::End)
    }

    /// Consumes a token expected to be an `Identifier` with the given text
    /// (case-sensitive keyword match, e.g. `WAVE`).
    pub(crate) fn expect_keyword(&mut self, keyword: &str) -> Result<Token, TsiemeneError> {
        let tok = self.next()?;
        if tok.kind == TokenKind::Identifier && tok.text == keyword {
            Ok(tok)
        } else {
            Err(self.err_at(
                tok.line,
                tok.column,
                format!("expected keyword {:?}, got {:?}", keyword, tok.text),
            ))
        }
    }

    /// Consumes a bare `Identifier` token (a name/path slot), returning its text.
    pub(crate) fn expect_identifier(&mut self) -> Result<Token, TsiemeneError> {
        let tok = self.next()?;
        if tok.kind == TokenKind::Identifier {
            Ok(tok)
        } else {
            Err(self.err_at(
                tok.line,
                tok.column,
                format!("expected identifier, got {:?}", tok.text),
            ))
        }
    }

    /// Consumes a scalar value: either an `Identifier` or a `String` token.
    pub(crate) fn expect_scalar(&mut self) -> Result<Token, TsiemeneError> {
        let tok = self.next()?;
        if matches!(tok.kind, TokenKind::Identifier | TokenKind::String) {
            Ok(tok)
        } else {
            Err(self.err_at(
                tok.line,
                tok.column,
                format!("expected a scalar value, got {:?}", tok.text),
            ))
        }
    }

    /// Consumes a `Symbol` token with the given text (`{`, `}`, `=`, `;`).
    pub(crate) fn expect_symbol(&mut self, symbol: &str) -> Result<Token, TsiemeneError> {
        let tok = self.next()?;
        if tok.kind == TokenKind::Symbol && tok.text == symbol {
            Ok(tok)
        } else {
            Err(self.err_at(
                tok.line,
                tok.column,
                format!("expected {:?}, got {:?}", symbol, tok.text),
            ))
        }
    }

    /// Parses `KEY = value;` returning the (uppercased) key and scalar text.
    pub(crate) fn parse_assignment(&mut self) -> Result<(String, Token), TsiemeneError> {
        let key = self.expect_identifier()?;
        self.expect_symbol("=")?;
        let value = self.expect_scalar()?;
        self.expect_symbol(";")?;
        Ok((key.text.to_ascii_uppercase(), value))
    }

    /// Consumes a trailing `Symbol` token if present; a no-op otherwise. Used
    /// after a top-level block's closing `}`, which the canonical grammar
    /// examples do not require a trailing `;` for (unlike nested entries).
    pub(crate) fn skip_optional_symbol(&mut self, symbol: &str) -> Result<(), TsiemeneError> {
        if self.peek()?.kind == TokenKind::Symbol && self.peek()?.text == symbol {
            self.next()?;
        }
        Ok(())
    }

    pub(crate) fn error(&self, line: usize, column: usize, message: impl Into<String>) -> TsiemeneError {
        self.err_at(line, column, message)
    }
}

/// Case-insensitive boolean parsing per the `{true,1,yes,on}` / `{false,0,no,off}`
/// scalar convention (§4.1).
pub(crate) fn parse_bool(tok: &Token, path: &Path) -> Result<bool, TsiemeneError> {
    tsiemene_common::text::parse_bool_token(&tok.text).ok_or_else(|| TsiemeneError::InvalidDsl {
        path: PathBuf::from(path),
        line: tok.line,
        column: tok.column,
        message: format!("{:?} is not a valid boolean", tok.text),
    })
}

/// Unsigned base-10 integer parsing, optionally rejecting zero.
pub(crate) fn parse_uint(tok: &Token, path: &Path, nonzero: bool) -> Result<u64, TsiemeneError> {
    let value: u64 = tok.text.parse().map_err(|_| TsiemeneError::InvalidDsl {
        path: PathBuf::from(path),
        line: tok.line,
        column: tok.column,
        message: format!("{:?} is not a valid unsigned integer", tok.text),
    })?;
    if nonzero && value == 0 {
        return Err(TsiemeneError::InvalidDsl {
            path: PathBuf::from(path),
            line: tok.line,
            column: tok.column,
            message: "value must be non-zero".to_string(),
        });
    }
    Ok(value)
}
