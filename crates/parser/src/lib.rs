//! Parsing of load-generator operation logs and exception logs.

pub mod exceptions;
pub mod lexer;
pub mod parser;

pub use exceptions::{exception_name, tally_exceptions};
pub use lexer::{operation_kind, tokenize, Token, TokenKind};
pub use parser::{parse_action, parse_line, split_fields, RawLine};
