//!
//! # DSN Error Types
//!

// Local imports
use crate::read::{DsnParseErrorType, ParserState};

/// # DSN Error Enumeration
#[derive(Debug)]
pub enum DsnError {
    /// Lexer Errors
    Lex {
        next_char: Option<char>,
        line: usize,
        col: usize,
        pos: usize,
    },
    /// Parser Errors
    Parse {
        msg: Option<String>,
        tp: DsnParseErrorType,
        state: ParserState,
    },
    /// File open, read and write failures
    Io(std::io::Error),
    /// Wrapped errors, generally from other crates
    Boxed(Box<dyn std::error::Error + Send + Sync>),
    /// String message-valued errors
    Str(String),
}
impl DsnError {
    /// Boolean indication of whether we are a lexer or parser error
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Lex { .. } | Self::Parse { .. })
    }
    /// Source line number of lexer and parser errors
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. } => Some(*line),
            Self::Parse { state, .. } => Some(state.line_num),
            _ => None,
        }
    }
}
impl From<crate::utils::ser::Error> for DsnError {
    fn from(e: crate::utils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<std::io::Error> for DsnError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<std::fmt::Error> for DsnError {
    fn from(e: std::fmt::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<std::string::FromUtf8Error> for DsnError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<derive_builder::UninitializedFieldError> for DsnError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Self::Str(format!("Missing required field `{}`", e.field_name()))
    }
}
impl From<String> for DsnError {
    /// Convert string-based errors by wrapping them
    fn from(e: String) -> Self {
        Self::Str(e)
    }
}
impl From<&str> for DsnError {
    /// Convert string-based errors by wrapping them
    fn from(e: &str) -> Self {
        Self::Str(e.into())
    }
}
impl std::fmt::Display for DsnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::Lex {
                next_char,
                line,
                col,
                ..
            } => match next_char {
                Some(c) => write!(f, "Lex error at line {line}, column {col}: unexpected {c:?}"),
                None => write!(f, "Lex error at line {line}, column {col}: unexpected end of input"),
            },
            Self::Parse { msg, tp, state } => {
                write!(
                    f,
                    "Parse error at line {}, column {}: {:?}, found `{}`",
                    state.line_num, state.col, tp, state.token
                )?;
                if let Some(msg) = msg {
                    write!(f, " ({msg})")?;
                }
                write!(f, "\n  {}", state.line_content)
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Boxed(e) => e.fmt(f),
            Self::Str(s) => f.write_str(s),
        }
    }
}
impl std::error::Error for DsnError {}

/// Dsn21 Result Type
pub type DsnResult<T> = Result<T, DsnError>;
