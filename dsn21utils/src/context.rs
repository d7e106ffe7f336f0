//!
//! # Conversion Contexts
//!

use serde::{Deserialize, Serialize};

/// Enumerated locations within a board or session conversion.
/// Pushed and popped by converters as they descend, and reported with their errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorContext {
    Board(String),
    Footprint(String),
    Pad(String),
    Padstack(String),
    Image(String),
    Net(String),
    Track,
    Via,
    Session(String),
    Placement,
    Units,
    Unknown,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Board(s) => write!(f, "board {}", s),
            Self::Footprint(s) => write!(f, "footprint {}", s),
            Self::Pad(s) => write!(f, "pad {}", s),
            Self::Padstack(s) => write!(f, "padstack {}", s),
            Self::Image(s) => write!(f, "image {}", s),
            Self::Net(s) => write!(f, "net {}", s),
            Self::Track => write!(f, "track"),
            Self::Via => write!(f, "via"),
            Self::Session(s) => write!(f, "session {}", s),
            Self::Placement => write!(f, "placement"),
            Self::Units => write!(f, "units"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
