//!
//! # Native Board Model
//!
//! The host-side board the converters translate to and from DSN.
//! All distances are integer nanometres, with y pointing down, as is typical of board editors.
//!
//! The converters read boards only through the [NativeBoard] trait.
//! [Board] is its reference implementation, loadable from YAML, JSON or TOML.
//!

// Crates.io Imports
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use crate::import::SessionUpdate;
use crate::{ConvError, ConvResult};
use dsn21utils::SerdeFile;

/// # Point
/// Integer nanometre coordinates, y down
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}
impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Board side of a footprint
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardSide {
    Front,
    Back,
}
impl Default for BoardSide {
    fn default() -> Self {
        Self::Front
    }
}

/// Pad copper shapes
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PadShape {
    Circle,
    Rect,
    Oval,
}

/// # Footprint Pad
///
/// Described in its footprint's own frame: unrotated, and as if placed on the front side.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Pad {
    /// Pad number, e.g. "1". Unnamed pads cannot be connected, and are not exported.
    #[serde(default)]
    pub number: String,
    pub shape: PadShape,
    /// Width and height
    pub size: Point,
    /// Center, relative to the footprint origin
    #[serde(default)]
    pub offset: Point,
    /// Rotation in degrees, relative to the footprint
    #[serde(default)]
    pub rotation: f64,
    /// Copper layer names
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    /// Drill diameter, zero for surface-mount pads.
    /// Must be smaller than both dimensions of `size`.
    #[serde(default)]
    pub drill: i64,
}
impl Pad {
    /// Boolean indication of whether the pad can join a net: it has a number and copper
    pub fn is_connectable(&self) -> bool {
        !self.number.is_empty() && !self.layers.is_empty()
    }
}

/// # Footprint Instance
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Footprint {
    /// Reference designator, e.g. "R1"
    pub reference: String,
    /// Library footprint name, e.g. "Resistor_SMD:R_0603_1608Metric"
    pub footprint_id: String,
    pub position: Point,
    /// Rotation in degrees, counter-clockwise
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub side: BoardSide,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub pads: Vec<Pad>,
}

/// # Track Segment
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Track {
    pub net: String,
    pub layer: String,
    pub width: i64,
    pub start: Point,
    pub end: Point,
    #[serde(default)]
    pub locked: bool,
}

/// # Via
/// Spans copper layers `top` through `bottom`
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct BoardVia {
    pub net: String,
    pub position: Point,
    pub diameter: i64,
    pub drill: i64,
    pub top: String,
    pub bottom: String,
    #[serde(default)]
    pub locked: bool,
}

///
/// # Native Board Accessors
///
/// Everything the converters read from a host board.
/// Copper layers are listed front to back.
///
pub trait NativeBoard {
    fn name(&self) -> &str;
    fn copper_layers(&self) -> &[String];
    /// Board outline polygon. Empty if the board has none.
    fn outline(&self) -> &[Point];
    fn footprints(&self) -> &[Footprint];
    fn nets(&self) -> &[String];
    fn tracks(&self) -> &[Track];
    fn vias(&self) -> &[BoardVia];

    /// Get the index of copper layer `name`, front being zero
    fn layer_index(&self, name: &str) -> Option<usize> {
        self.copper_layers().iter().position(|l| l == name)
    }
    /// Find the footprint with reference designator `reference`
    fn footprint(&self, reference: &str) -> Option<&Footprint> {
        self.footprints().iter().find(|f| f.reference == reference)
    }
    /// Boolean indication of whether net `name` exists
    fn has_net(&self, name: &str) -> bool {
        self.nets().iter().any(|n| n == name)
    }
}

///
/// # Board
///
/// Reference [NativeBoard] implementation, as used by the command-line converters.
///
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Board {
    pub name: String,
    /// Copper layer names, front to back
    pub layers: Vec<String>,
    #[serde(default)]
    pub outline: Vec<Point>,
    #[serde(default)]
    pub footprints: Vec<Footprint>,
    #[serde(default)]
    pub nets: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub vias: Vec<BoardVia>,
}
impl SerdeFile for Board {}

impl NativeBoard for Board {
    fn name(&self) -> &str {
        &self.name
    }
    fn copper_layers(&self) -> &[String] {
        &self.layers
    }
    fn outline(&self) -> &[Point] {
        &self.outline
    }
    fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }
    fn nets(&self) -> &[String] {
        &self.nets
    }
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }
    fn vias(&self) -> &[BoardVia] {
        &self.vias
    }
}

impl Board {
    /// Apply the updates of a routed session.
    ///
    /// Moves footprints, and replaces the tracks and vias of every routed net.
    /// Nets absent from the session keep their copper.
    /// The board is left untouched if any placement names an unknown footprint.
    pub fn apply(&mut self, update: &SessionUpdate) -> ConvResult<()> {
        for placement in update.placements.iter() {
            if self.footprint(&placement.reference).is_none() {
                return Err(ConvError::msg(format!(
                    "Cannot apply placement of unknown footprint {}",
                    placement.reference
                )));
            }
        }
        for placement in update.placements.iter() {
            for fp in self.footprints.iter_mut() {
                if fp.reference == placement.reference {
                    fp.position = placement.position;
                    fp.rotation = placement.rotation;
                    fp.side = placement.side;
                }
            }
        }
        for routes in update.routes.iter() {
            self.tracks.retain(|t| t.net != routes.net);
            self.vias.retain(|v| v.net != routes.net);
            self.tracks.extend(routes.tracks.iter().cloned());
            self.vias.extend(routes.vias.iter().cloned());
        }
        Ok(())
    }
}
