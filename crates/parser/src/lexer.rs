//! Logos-based lexer for the operation-kind field of a log line.
//!
//! A log line is `timestamp, thread, kind, payload`. The kind field is a single
//! keyword; anything else in that position is an unknown operation kind.

use std::ops::Range;

use logos::Logos as _;

/// Operation kinds written by the load generator.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(::logos::Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    #[token("Read")]
    Read,

    #[token("Write")]
    Write,

    #[token("Rm")]
    Remove,

    #[token("TxRead")]
    TxRead,

    #[token("TxWrite")]
    TxWrite,

    #[token("TxRm")]
    TxRemove,

    /// Snapshot transaction marker.
    #[token("TxSnap")]
    TxSnap,

    /// Optimistic transaction marker.
    #[token("TxOpt")]
    TxOpt,

    /// Nested transaction marker.
    #[token("TxNest")]
    TxNest,

    /// Always-wins-aborts transaction marker.
    #[token("TxAWA")]
    TxAwa,

    /// Thread version advance.
    #[token("Version")]
    Version,

    /// End-of-run liveness report.
    #[token("Liveness")]
    Liveness,
}

/// A recognised keyword and its byte span in the lexed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Tokenize `input`, skipping anything the lexer cannot recognise.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token> {
    TokenKind::lexer(input)
        .spanned()
        .filter_map(|(result, span)| result.ok().map(|kind| Token { kind, span }))
        .collect()
}

/// Lex an operation-kind field.
///
/// Returns `None` unless the whole field is exactly one keyword.
#[must_use]
pub fn operation_kind(field: &str) -> Option<TokenKind> {
    let mut lexer = TokenKind::lexer(field);
    let kind = lexer.next()?.ok()?;
    (lexer.span() == (0..field.len()) && lexer.next().is_none()).then_some(kind)
}
