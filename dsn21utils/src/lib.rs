//!
//! # DSN21 Internal Utilities Crate
//!
//! Shared pieces of the DSN21 workspace:
//! keyword enumerations, conversion error helpers and serialization to and from files.
//!

pub mod ser;
pub use ser::*;

pub mod error;
pub use error::*;

pub mod context;
pub use context::*;

pub mod enumstr;
pub use enumstr::*;
