//!
//! # Dsn21 Specctra DSN Board & Session Parser & Writer
//!
//! Specctra DSN is the de facto interchange format between circuit-board editors and autorouters.
//! A board is handed off as a *design* file (`.dsn`), and routing results come back as a *session* file (`.ses`).
//! Both are parenthesized keyword expressions, much akin to S-expressions, under a grammar of around 150 keywords.
//!
//! Dsn21 reads both into a [DsnTree]: an arena of tagged element nodes,
//! one per grammar construct, which can be edited, compared, and written back as DSN text.
//! Writing reproduces the exact layout routers expect: indentation, line wrapping,
//! conditional quoting, and `%.6g`-style numbers.
//!
//! Padstack and image definitions are deduplicated by canonical content hashes, see [hash].
//!
//! ## Usage
//!
//! ```skip
//! let tree = dsn21::parse_design_file("board.dsn")?;
//! dsn21::save(&tree, "board2.dsn")?;
//! ```
//!
//! Building and writing a design:
//!
//! ```
//! use dsn21::{DsnKey, DsnTree, DsnUnits, UnitRes};
//! let mut tree = DsnTree::design("board");
//! let root = tree.root;
//! tree.add_child(root, DsnKey::Unit, UnitRes::unit(DsnUnits::Um));
//! assert_eq!(dsn21::to_string(&tree).unwrap(), "(pcb board\n  (unit um)\n)\n");
//! ```
//!

// Internal modules & re-exports
pub use dsn21utils as utils;

pub mod data;
pub use data::*;

pub mod error;
pub use error::{DsnError, DsnResult};

pub mod tree;
pub use tree::{DsnTree, ElemKey, Node};

pub mod read;
pub use read::{
    parse_design_bytes, parse_design_file, parse_design_str, parse_session_bytes,
    parse_session_file, parse_session_str, DsnParser, ReadOptions,
};

pub mod write;
pub use write::{fmt_num, format_node, save, to_bytes, to_string, DsnWriter};

pub mod hash;

#[cfg(test)]
mod tests;
