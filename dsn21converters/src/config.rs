//!
//! # Conversion Options
//!
//! Settings for board export and session import, loadable from YAML, JSON or TOML files.
//! Distances are nanometres. Absent fields take their defaults.
//!

// Crates.io Imports
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use dsn21utils::SerdeFile;

/// # Board Export Options
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ExportOptions {
    /// Default track width
    pub track_width: i64,
    /// Default copper clearance
    pub clearance: i64,
    /// Added to every exported clearance
    pub safety_margin: i64,
    /// Default via pad diameter
    pub via_diameter: i64,
    /// Default via drill diameter
    pub via_drill: i64,
    /// Exporting program, written to the `parser` descriptor
    pub host_cad: String,
    pub host_version: String,
    /// Layer name of the board boundary
    pub boundary_layer: String,
}
impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            track_width: 250_000,
            clearance: 200_000,
            safety_margin: 100,
            via_diameter: 600_000,
            via_drill: 300_000,
            host_cad: "dsn21".into(),
            host_version: env!("CARGO_PKG_VERSION").into(),
            boundary_layer: "pcb".into(),
        }
    }
}
impl SerdeFile for ExportOptions {}

/// # Session Import Options
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ImportOptions {
    /// Drill diameter of imported vias. Sessions carry via copper, but no drills.
    pub default_via_drill: i64,
}
impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            default_via_drill: 300_000,
        }
    }
}
impl SerdeFile for ImportOptions {}
