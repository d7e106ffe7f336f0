//!
//! # Conversion Result and Error Types
//!

// Local Imports
use dsn21::DsnError;
use dsn21utils::{self as utils, ErrorContext};

/// # [ConvError] Result Type
pub type ConvResult<T> = Result<T, ConvError>;

///
/// # Conversion Error Enumeration
///
pub enum ConvError {
    /// Error Exporting a Native Board to DSN
    Export {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// Error Importing a DSN Session
    Import {
        message: String,
        stack: Vec<ErrorContext>,
    },
    /// Errors Reading or Writing DSN Text
    Dsn(DsnError),
    /// Boxed External Errors
    Boxed(Box<dyn std::error::Error + Send + Sync>),
    /// Uncategorized Error, with String Message
    Str(String),
}
impl ConvError {
    /// Create a [ConvError::Str] from anything String-convertible
    pub fn msg(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }
    /// Create an error-variant [Result] of our [ConvError::Str] variant
    pub fn fail<T>(s: impl Into<String>) -> Result<T, Self> {
        Err(Self::msg(s))
    }
}
impl std::fmt::Debug for ConvError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConvError::Export { message, stack } => {
                write!(f, "Export Error: \n - {} \n - {:?}", message, stack)
            }
            ConvError::Import { message, stack } => {
                write!(f, "Import Error: \n - {} \n - {:?}", message, stack)
            }
            ConvError::Dsn(err) => write!(f, "{}", err),
            ConvError::Boxed(err) => err.fmt(f),
            ConvError::Str(err) => err.fmt(f),
        }
    }
}
impl std::fmt::Display for ConvError {
    /// Display a [ConvError]
    /// Delegates to the [Debug] implementation
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
impl std::error::Error for ConvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dsn(e) => Some(e),
            Self::Boxed(e) => Some(&**e),
            _ => None,
        }
    }
}
impl From<DsnError> for ConvError {
    fn from(e: DsnError) -> Self {
        Self::Dsn(e)
    }
}
impl From<String> for ConvError {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
impl From<&str> for ConvError {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}
impl From<utils::ser::Error> for ConvError {
    fn from(e: utils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<std::io::Error> for ConvError {
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
