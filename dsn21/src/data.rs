//!
//! # DSN Data Model
//!
//! Keywords, enumerated values, and the per-construct payloads held by each node of a [crate::DsnTree].
//!

// Crates.io Imports
use chrono::{Local, NaiveDateTime, SubsecRound};
use derive_builder::Builder;
use derive_more::{Add, AddAssign, Sub, SubAssign};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use crate::utils::{enumstr, EnumStr};
use crate::DsnError;

/// # DsnPoint
///
/// Coordinate pair in the units of its enclosing unit/resolution scope.
/// Also used as a vector offset from some origin.
#[derive(
    Clone,
    Default,
    Debug,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Copy,
    Add,
    AddAssign,
    Sub,
    SubAssign,
)]
pub struct DsnPoint {
    pub x: f64,
    pub y: f64,
}
impl DsnPoint {
    /// Create a new [DsnPoint]
    pub fn new(x: impl Into<f64>, y: impl Into<f64>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
        .fix_negative_zero()
    }
    /// Replace negative zero in either coordinate with positive zero
    pub fn fix_negative_zero(self) -> Self {
        Self {
            x: if self.x == 0.0 { 0.0 } else { self.x },
            y: if self.y == 0.0 { 0.0 } else { self.y },
        }
    }
}

/// `comp-pin` reference, as in net pin lists and `was_is` pairs
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PinRef {
    pub component_id: String,
    pub pin_id: String,
}
impl PinRef {
    pub fn new(component_id: impl Into<String>, pin_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            pin_id: pin_id.into(),
        }
    }
}
/// Pin-swap pair from a session's `was_is` section
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct PinPair {
    pub was: PinRef,
    pub is: PinRef,
}
/// User Property, as in `(property (index 0))`
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
}

enumstr!(
    /// # Dsn Key(Word)s
    ///
    /// Keywords of the Specctra DSN grammar.
    /// DSN keywords are not reserved: a net may well be named `pin` or `via`.
    /// Whether a symbol acts as a [DsnKey] is decided by the parser, from context.
    ///
    /// Every node of a [crate::DsnTree] is tagged with the [DsnKey] it is written with.
    DsnKey {
        Pcb: "pcb",
        Session: "session",
        BaseDesign: "base_design",
        Parser: "parser",
        Unit: "unit",
        Resolution: "resolution",
        Structure: "structure",
        StructureOut: "structure_out",
        Layer: "layer",
        LayerNoiseWeight: "layer_noise_weight",
        LayerPair: "layer_pair",
        Boundary: "boundary",
        PlaceBoundary: "place_boundary",
        Rect: "rect",
        Circle: "circle",
        Circ: "circ",
        Path: "path",
        PolylinePath: "polyline_path",
        Polygon: "polygon",
        Qarc: "qarc",
        Window: "window",
        Keepout: "keepout",
        PlaceKeepout: "place_keepout",
        ViaKeepout: "via_keepout",
        WireKeepout: "wire_keepout",
        BendKeepout: "bend_keepout",
        ElongateKeepout: "elongate_keepout",
        Plane: "plane",
        Via: "via",
        Spare: "spare",
        Control: "control",
        ViaAtSmd: "via_at_smd",
        Grid: "grid",
        Region: "region",
        RegionNet: "region_net",
        RegionClass: "region_class",
        RegionClassClass: "region_class_class",
        ClassClass: "class_class",
        Classes: "classes",
        Rule: "rule",
        PlaceRule: "place_rule",
        LayerRule: "layer_rule",
        SnapAngle: "snap_angle",
        Placement: "placement",
        PlaceControl: "place_control",
        FlipStyle: "flip_style",
        Component: "component",
        Place: "place",
        Library: "library",
        LibraryOut: "library_out",
        Image: "image",
        ImageProperty: "image_property",
        Outline: "outline",
        Shape: "shape",
        Pin: "pin",
        Padstack: "padstack",
        Network: "network",
        Net: "net",
        Class: "class",
        Circuit: "circuit",
        CompOrder: "comp_order",
        Fromto: "fromto",
        Topology: "topology",
        Wiring: "wiring",
        Wire: "wire",
        Connect: "connect",
        History: "history",
        Ancestor: "ancestor",
        SelfKey: "self",
        CreatedTime: "created_time",
        Comment: "comment",
        WasIs: "was_is",
        Routes: "routes",
        NetworkOut: "network_out",
        SupplyPin: "supply_pin",
        StringQuote: "string_quote",
        SpaceInQuotedTokens: "space_in_quoted_tokens",
        HostCad: "host_cad",
        HostVersion: "host_version",
        Constant: "constant",
        WriteResolution: "write_resolution",
        RoutesInclude: "routes_include",
        WiresInclude: "wires_include",
        CaseSensitive: "case_sensitive",
        ViaRotateFirst: "via_rotate_first",
        GeneratedByFreeroute: "generated_by_freeroute",
        Testpoint: "testpoint",
        Guides: "guides",
        Guide: "guide",
        ImageConductor: "image_conductor",
        Type: "type",
        Property: "property",
        Direction: "direction",
        Cost: "cost",
        UseNet: "use_net",
        SequenceNumber: "sequence_number",
        ApertureType: "aperture_type",
        Side: "side",
        Rotate: "rotate",
        Attach: "attach",
        UseVia: "use_via",
        Absolute: "absolute",
        Pins: "pins",
        Order: "order",
        Unassigned: "unassigned",
        NetNumber: "net_number",
        LockType: "lock_type",
        LogicalPart: "logical_part",
        Mirror: "mirror",
        Status: "status",
        Pn: "PN",
        ImageType: "image_type",
        Offset: "offset",
        Turret: "turret",
        Attr: "attr",
        Shield: "shield",
        Supply: "supply",
        ViaNumber: "via_number",
        Contact: "contact",
        OffGrid: "off_grid",
        RouteToFanoutOnly: "route_to_fanout_only",
        ForceToTerminalPoint: "force_to_terminal_point",
        SameNetChecking: "same_net_checking",
        CheckingTrimByPin: "checking_trim_by_pin",
        NoiseCalculation: "noise_calculation",
        NoiseAccumulation: "noise_accumulation",
        IncludePinsInCrosstalk: "include_pins_in_crosstalk",
        BbvCtr2ctr: "bbv_ctr2ctr",
        AveragePairLength: "average_pair_length",
        CrosstalkModel: "crosstalk_model",
        RoundoffRotation: "roundoff_rotation",
        Microvia: "microvia",
        RerouteOrderViols: "reroute_order_viols",
    }
);
impl DsnKey {
    /// The keepout family, all sharing the [Keepout] payload
    pub const KEEPOUTS: [DsnKey; 7] = [
        DsnKey::Keepout,
        DsnKey::PlaceKeepout,
        DsnKey::ViaKeepout,
        DsnKey::WireKeepout,
        DsnKey::BendKeepout,
        DsnKey::ElongateKeepout,
        DsnKey::Plane,
    ];
    /// Shape descriptors which may fill a window, shape, keepout or wire
    pub const SHAPES: [DsnKey; 5] = [
        DsnKey::Rect,
        DsnKey::Circle,
        DsnKey::Path,
        DsnKey::Polygon,
        DsnKey::Qarc,
    ];
    /// Keywords accepted as `control` token-properties
    pub const CONTROL_PROPS: [DsnKey; 14] = [
        DsnKey::OffGrid,
        DsnKey::RouteToFanoutOnly,
        DsnKey::ForceToTerminalPoint,
        DsnKey::SameNetChecking,
        DsnKey::CheckingTrimByPin,
        DsnKey::NoiseCalculation,
        DsnKey::NoiseAccumulation,
        DsnKey::IncludePinsInCrosstalk,
        DsnKey::BbvCtr2ctr,
        DsnKey::AveragePairLength,
        DsnKey::CrosstalkModel,
        DsnKey::RoundoffRotation,
        DsnKey::Microvia,
        DsnKey::RerouteOrderViols,
    ];
    /// Boolean indication of whether `self` is among `keys`
    pub fn is_in(&self, keys: &[DsnKey]) -> bool {
        keys.contains(self)
    }
}

enumstr!(
    /// # Units of Measure
    /// Allowed values of `unit` and `resolution` descriptors
    DsnUnits {
        Inch: "inch",
        Mil: "mil",
        Cm: "cm",
        Mm: "mm",
        Um: "um",
    }
);
enumstr!(
    /// Binary On/Off Settings
    OnOff {
        On: "on",
        Off: "off",
    }
);
impl OnOff {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Self::On
        } else {
            Self::Off
        }
    }
    pub fn is_on(&self) -> bool {
        *self == Self::On
    }
}
enumstr!(
    /// Board side of a placed component or image
    Side {
        Front: "front",
        Back: "back",
        Both: "both",
    }
);
enumstr!(
    /// Layer types
    LayerType {
        Signal: "signal",
        Power: "power",
        Mixed: "mixed",
        Jumper: "jumper",
    }
);
enumstr!(
    /// Preferred routing direction of a layer
    LayerDirection {
        Horizontal: "horizontal",
        Vertical: "vertical",
        Orthogonal: "orthogonal",
        PositiveDiagonal: "positive_diagonal",
        NegativeDiagonal: "negative_diagonal",
        Diagonal: "diagonal",
        Off: "off",
    }
);
enumstr!(
    /// Named layer cost levels
    CostLevel {
        Forbidden: "forbidden",
        High: "high",
        Medium: "medium",
        Low: "low",
        Free: "free",
    }
);
/// # Layer Cost
/// Either a named level or a positive integer
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LayerCost {
    Level(CostLevel),
    Value(i32),
}
enumstr!(
    CostType {
        Length: "length",
        Way: "way",
    }
);
enumstr!(
    /// Path aperture shapes
    Aperture {
        Round: "round",
        Square: "square",
    }
);
enumstr!(
    GridType {
        Via: "via",
        Wire: "wire",
        ViaKeepout: "via_keepout",
        Snap: "snap",
        Place: "place",
    }
);
enumstr!(
    Axis {
        X: "x",
        Y: "y",
    }
);
enumstr!(
    ImageType {
        Smd: "smd",
        Pin: "pin",
    }
);
enumstr!(
    Mirror {
        X: "x",
        Y: "y",
        Xy: "xy",
        Off: "off",
    }
);
enumstr!(
    PlaceStatus {
        Added: "added",
        Deleted: "deleted",
        Substituted: "substituted",
    }
);
enumstr!(
    LockType {
        Position: "position",
        Gate: "gate",
        Subgate: "subgate",
        Pin: "pin",
    }
);
enumstr!(
    FlipStyle {
        MirrorFirst: "mirror_first",
        RotateFirst: "rotate_first",
    }
);
enumstr!(
    /// Net pin-list flavors: unordered `pins` or ordered `order`
    PinsType {
        Pins: "pins",
        Order: "order",
    }
);
enumstr!(
    NetType {
        Fix: "fix",
        Normal: "normal",
    }
);
enumstr!(
    FromtoType {
        Fix: "fix",
        Normal: "normal",
        Soft: "soft",
    }
);
enumstr!(
    /// Route-types of wires and wire-vias
    WireType {
        Fix: "fix",
        Route: "route",
        Normal: "normal",
        Protect: "protect",
    }
);
enumstr!(
    WireAttr {
        Test: "test",
        Fanout: "fanout",
        Bus: "bus",
        Jumper: "jumper",
    }
);
enumstr!(
    ViaAttr {
        Test: "test",
        Fanout: "fanout",
        Jumper: "jumper",
        VirtualPin: "virtual_pin",
    }
);

fn is_false(b: &bool) -> bool {
    !b
}
fn is_true(b: &bool) -> bool {
    *b
}
fn default_true() -> bool {
    true
}
fn is_zero(v: &f64) -> bool {
    *v == 0.0
}
fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// # Board Design Header
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Pcb {
    pub name: String,
}

/// # Session Header
///
/// Sessions are written back with the `pcb` outer keyword, as the autorouters that consume them expect.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Session {
    pub id: String,
    pub base_design: String,
}

/// # Parser Settings
///
/// The `parser` descriptor. Not a parser of course, but settings for one:
/// the quote character, whether quoted tokens may hold spaces, and host identification.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ParserConfig {
    pub string_quote: char,
    pub space_in_quoted_tokens: bool,
    pub case_sensitive: bool,
    pub wires_include_testpoint: bool,
    pub routes_include_testpoint: bool,
    pub routes_include_guides: bool,
    pub routes_include_image_conductor: bool,
    pub via_rotate_first: bool,
    pub generated_by_freeroute: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub const_id1: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub const_id2: String,
    #[serde(default)]
    pub host_cad: String,
    #[serde(default)]
    pub host_version: String,
}
impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            string_quote: '"',
            space_in_quoted_tokens: false,
            case_sensitive: false,
            wires_include_testpoint: false,
            routes_include_testpoint: false,
            routes_include_guides: false,
            routes_include_image_conductor: false,
            via_rotate_first: true,
            generated_by_freeroute: false,
            const_id1: String::new(),
            const_id2: String::new(),
            host_cad: String::new(),
            host_version: String::new(),
        }
    }
}

/// # Unit or Resolution Descriptor
///
/// Tagged [DsnKey::Unit] or [DsnKey::Resolution].
/// `value` is only written for resolutions; units carry a value of one.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct UnitRes {
    pub units: DsnUnits,
    pub value: i32,
}
impl UnitRes {
    pub fn unit(units: DsnUnits) -> Self {
        Self { units, value: 1 }
    }
    pub fn resolution(units: DsnUnits, value: i32) -> Self {
        Self { units, value }
    }
}
impl Default for UnitRes {
    fn default() -> Self {
        Self {
            units: DsnUnits::Inch,
            value: 2_540_000,
        }
    }
}

/// # Layer Definition
#[derive(Clone, Default, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct Layer {
    pub name: String,
    #[builder(default = "LayerType::Signal")]
    #[serde(default = "default_layer_type")]
    pub layer_type: LayerType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub direction: Option<LayerDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub cost: Option<LayerCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub cost_type: Option<CostType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub use_net: Vec<String>,
}
fn default_layer_type() -> LayerType {
    LayerType::Signal
}
impl Default for LayerType {
    fn default() -> Self {
        Self::Signal
    }
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LayerPair {
    pub layer_id0: String,
    pub layer_id1: String,
    pub layer_weight: f64,
}

/// # Rectangle
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Rect {
    pub layer_id: String,
    pub point0: DsnPoint,
    pub point1: DsnPoint,
}
/// # Circle
/// The center `vertex` is only written when non-zero.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Circle {
    pub layer_id: String,
    pub diameter: f64,
    #[serde(default)]
    pub vertex: DsnPoint,
}
/// # Path or Polygon
///
/// Tagged [DsnKey::Path] or [DsnKey::Polygon], which share a layout:
/// a layer, an aperture width and a point list.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Path {
    pub layer_id: String,
    pub aperture_width: f64,
    pub points: Vec<DsnPoint>,
    #[serde(default)]
    pub aperture_type: Aperture,
}
impl Default for Aperture {
    fn default() -> Self {
        Self::Round
    }
}
/// # Text Encoding of a DSN File
///
/// Files are read as UTF-8 where valid, and as Latin-1 otherwise.
/// Trees remember which, and are written back the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

/// # Quarter-Arc
/// Vertices are start, end and center.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Qarc {
    pub layer_id: String,
    pub aperture_width: f64,
    pub vertex: [DsnPoint; 3],
}

/// # Keepout
///
/// Shared by the keepout family and copper `plane`s.
/// Shape, rules and windows are held as children.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Keepout {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i32>,
}

/// # Structure-Level Via Declaration
/// Lists the padstacks available to the router as vias.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Via {
    pub padstacks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spares: Vec<String>,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Control {
    pub via_at_smd: bool,
    pub via_at_smd_grid_on: bool,
}

/// Keyword-valued property, e.g. `(off_grid on)`
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TokProp {
    pub value: String,
}
/// String-valued property, e.g. `(region_net GND)`
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct StringProp {
    pub value: String,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Region {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region_id: String,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Classes {
    pub class_ids: Vec<String>,
}

/// # Grid Descriptor
///
/// `direction` is only written for non-`place` grids, `image_type` only for `place` grids.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Grid {
    pub grid_type: GridType,
    pub dimension: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Axis>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
}
impl Default for Grid {
    fn default() -> Self {
        Self {
            grid_type: GridType::Via,
            dimension: 0.0,
            direction: None,
            offset: 0.0,
            image_type: None,
        }
    }
}

/// # Rule Descriptor
///
/// Rules are kept as text, one entry per sub-expression, e.g. `(width 250)`.
/// They are written back verbatim.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Rule {
    pub rules: Vec<String>,
}
impl Rule {
    pub fn new(rules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            rules: rules.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LayerRule {
    pub layer_ids: Vec<String>,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Placement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_style: Option<FlipStyle>,
}

/// # Component
/// Placements of a single image, one `place` child per instance.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Component {
    pub image_id: String,
}

/// # Component Instance Placement
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct Place {
    /// Reference designator
    pub component_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub vertex: Option<DsnPoint>,
    #[builder(default = "Side::Front")]
    pub side: Side,
    #[builder(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub mirror: Option<Mirror>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub status: Option<PlaceStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(default)]
    pub logical_part: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub lock_type: Option<LockType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[builder(default)]
    pub part_number: String,
}
impl Default for Place {
    fn default() -> Self {
        Self {
            component_id: String::new(),
            vertex: None,
            side: Side::Front,
            rotation: 0.0,
            mirror: None,
            status: None,
            logical_part: String::new(),
            properties: Vec::new(),
            lock_type: None,
            part_number: String::new(),
        }
    }
}

/// # Library
///
/// Images and padstacks. Padstacks used as vias trail the pad padstacks,
/// starting at `via_start_index` once it has been set.
/// The index is bookkeeping for deduplication: it is never written, and plays no part in equality.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema)]
pub struct Library {
    #[serde(default, skip)]
    pub via_start_index: Option<usize>,
}
impl PartialEq for Library {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// # Image (Footprint) Definition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Image {
    pub image_id: String,
    pub side: Side,
}
impl Default for Image {
    fn default() -> Self {
        Self {
            image_id: String::new(),
            side: Side::Both,
        }
    }
}

/// # Shape
/// Tagged [DsnKey::Shape] or [DsnKey::Outline]. Its geometry is its single shape-descriptor child.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Shape {
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub connect: bool,
}
impl Default for Shape {
    fn default() -> Self {
        Self { connect: true }
    }
}

/// # Image Pin
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Pin {
    pub padstack_id: String,
    /// Rotation in degrees, written when non-zero
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rotation: f64,
    pub pin_id: String,
    pub vertex: DsnPoint,
}

/// # Padstack Definition
///
/// Shapes, unit and rules are children.
/// `via_id` is only written when `attach` is on.
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct Padstack {
    pub padstack_id: String,
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub rotate: bool,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub absolute: bool,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub attach: bool,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub via_id: String,
}
impl Default for Padstack {
    fn default() -> Self {
        Self {
            padstack_id: String::new(),
            rotate: true,
            absolute: false,
            attach: false,
            via_id: String::new(),
        }
    }
}

/// # Net
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct Net {
    pub net_id: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub unassigned: bool,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_number: Option<i32>,
    #[builder(default = "PinsType::Pins")]
    pub pins_type: PinsType,
    #[builder(default)]
    #[serde(default)]
    pub pins: Vec<PinRef>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_type: Option<NetType>,
}
impl Default for Net {
    fn default() -> Self {
        Self {
            net_id: String::new(),
            unassigned: false,
            net_number: None,
            pins_type: PinsType::Pins,
            pins: Vec::new(),
            net_type: None,
        }
    }
}

/// # Net Class
/// `circuit` holds the circuit descriptors as text, e.g. `(use_via Via_600)`.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Class {
    pub class_id: String,
    #[serde(default)]
    pub net_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circuit: Vec<String>,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CompOrder {
    pub placement_ids: Vec<String>,
}

/// # From-To Descriptor
/// The two endpoints are kept as the raw text they were read as, quotes included.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Fromto {
    pub from_text: String,
    pub to_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fromto_type: Option<FromtoType>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net_id: String,
}

/// # Wire
/// The wire's shape, windows and connect descriptor are children.
#[derive(Clone, Default, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct Wire {
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net_id: String,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turret: Option<i32>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_type: Option<WireType>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<WireAttr>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shield: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub supply: bool,
}

/// Wire connection terms, kept as text
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Connect {
    pub terms: Vec<String>,
}

/// # Routed Via
#[derive(Clone, Default, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DsnError"))]
pub struct WireVia {
    pub padstack_id: String,
    pub vertexes: Vec<DsnPoint>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net_id: String,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_number: Option<i32>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_type: Option<WireType>,
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<ViaAttr>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub virtual_pin_name: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_layers: Vec<String>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub supply: bool,
}

/// # Session History
/// The `self` entry's time stamp and comments. Ancestors are children.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct History {
    pub time_stamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}
impl Default for History {
    fn default() -> Self {
        Self {
            time_stamp: now(),
            comments: Vec::new(),
        }
    }
}
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Ancestor {
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub time_stamp: NaiveDateTime,
}
impl Default for Ancestor {
    fn default() -> Self {
        Self {
            filename: String::new(),
            comment: String::new(),
            time_stamp: now(),
        }
    }
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct WasIs {
    pub pin_pairs: Vec<PinPair>,
}

/// # Routed Net
/// Written with the `net` keyword inside a session's `network_out`.
#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NetOut {
    pub net_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_number: Option<i32>,
}

#[derive(Clone, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SupplyPin {
    pub pin_refs: Vec<PinRef>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub net_id: String,
}

/// Generate the [Elem] sum type, its fieldless [ElemKind] mirror, and typed accessors.
/// `payloads` variants carry a struct, `sections` are bare containers.
macro_rules! elems {
    (
        payloads { $( $(#[$pmeta: meta])* $pvar: ident ( $ptype: ty ), $as_ref: ident, $as_mut: ident; )* }
        sections { $( $(#[$smeta: meta])* $svar: ident, )* }
    ) => {
        /// # Element Payload
        ///
        /// Closed set of DSN constructs. Each node of a [crate::DsnTree] holds one.
        /// Payloads hold scalar fields only; sub-constructs are child nodes.
        #[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
        pub enum Elem {
            $( $(#[$pmeta])* $pvar($ptype), )*
            $( $(#[$smeta])* $svar, )*
        }
        /// Fieldless discriminant of [Elem]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ElemKind {
            $( $pvar, )*
            $( $svar, )*
        }
        impl Elem {
            /// Get our [ElemKind]
            pub fn kind(&self) -> ElemKind {
                match self {
                    $( Self::$pvar(_) => ElemKind::$pvar, )*
                    $( Self::$svar => ElemKind::$svar, )*
                }
            }
            $(
                pub fn $as_ref(&self) -> Option<&$ptype> {
                    match self {
                        Self::$pvar(p) => Some(p),
                        _ => None,
                    }
                }
                pub fn $as_mut(&mut self) -> Option<&mut $ptype> {
                    match self {
                        Self::$pvar(p) => Some(p),
                        _ => None,
                    }
                }
            )*
        }
        $(
            impl From<$ptype> for Elem {
                fn from(p: $ptype) -> Self {
                    Self::$pvar(p)
                }
            }
        )*
    };
}

elems! {
    payloads {
        Pcb(Pcb), as_pcb, as_pcb_mut;
        Session(Session), as_session, as_session_mut;
        Parser(ParserConfig), as_parser, as_parser_mut;
        UnitRes(UnitRes), as_unit_res, as_unit_res_mut;
        Layer(Layer), as_layer, as_layer_mut;
        LayerPair(LayerPair), as_layer_pair, as_layer_pair_mut;
        Rect(Rect), as_rect, as_rect_mut;
        Circle(Circle), as_circle, as_circle_mut;
        Path(Path), as_path, as_path_mut;
        Qarc(Qarc), as_qarc, as_qarc_mut;
        Keepout(Keepout), as_keepout, as_keepout_mut;
        Via(Via), as_via, as_via_mut;
        Control(Control), as_control, as_control_mut;
        TokProp(TokProp), as_tokprop, as_tokprop_mut;
        StringProp(StringProp), as_stringprop, as_stringprop_mut;
        Region(Region), as_region, as_region_mut;
        Classes(Classes), as_classes, as_classes_mut;
        Grid(Grid), as_grid, as_grid_mut;
        Rule(Rule), as_rule, as_rule_mut;
        LayerRule(LayerRule), as_layer_rule, as_layer_rule_mut;
        Placement(Placement), as_placement, as_placement_mut;
        Component(Component), as_component, as_component_mut;
        Place(Place), as_place, as_place_mut;
        Library(Library), as_library, as_library_mut;
        Image(Image), as_image, as_image_mut;
        Shape(Shape), as_shape, as_shape_mut;
        Pin(Pin), as_pin, as_pin_mut;
        Padstack(Padstack), as_padstack, as_padstack_mut;
        Net(Net), as_net, as_net_mut;
        Class(Class), as_class, as_class_mut;
        CompOrder(CompOrder), as_comp_order, as_comp_order_mut;
        Fromto(Fromto), as_fromto, as_fromto_mut;
        Wire(Wire), as_wire, as_wire_mut;
        Connect(Connect), as_connect, as_connect_mut;
        WireVia(WireVia), as_wire_via, as_wire_via_mut;
        History(History), as_history, as_history_mut;
        Ancestor(Ancestor), as_ancestor, as_ancestor_mut;
        WasIs(WasIs), as_was_is, as_was_is_mut;
        NetOut(NetOut), as_net_out, as_net_out_mut;
        SupplyPin(SupplyPin), as_supply_pin, as_supply_pin_mut;
    }
    sections {
        Structure,
        LayerNoiseWeight,
        Boundary,
        Window,
        ClassClass,
        Network,
        Topology,
        Wiring,
        /// Session routing results, written as `routes`
        Route,
    }
}
