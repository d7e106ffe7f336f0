//!
//! # Dsn21 Board & Session Converters
//!
//! Bridges a host board model and Specctra DSN:
//!
//! * [export_design] writes a [NativeBoard] as a DSN design, ready for an autorouter.
//! * [import_session] reads the router's session back, as a [SessionUpdate] for the host to apply.
//!
//! The native side measures in integer nanometres, y down.
//! Designs are exported in micrometres at a resolution of ten steps per micrometre, y up.
//!
//! Command-line front-ends are included as the `board2dsn`, `ses2updates` and `dsn2yaml` binaries.
//!

pub use dsn21;
pub use dsn21utils as utils;

pub mod error;
pub use error::{ConvError, ConvResult};

pub mod board;
pub use board::{Board, BoardSide, BoardVia, Footprint, NativeBoard, Pad, PadShape, Point, Track};

pub mod units;
pub use units::UnitConverter;

pub mod config;
pub use config::{ExportOptions, ImportOptions};

pub mod export;
pub use export::{export_design, DsnExporter};

pub mod import;
pub use import::{import_session, NetRoutes, PlacementUpdate, SessionImporter, SessionUpdate};

#[cfg(test)]
mod tests;
