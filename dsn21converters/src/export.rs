//!
//! # Board to DSN Design Export
//!
//! Walks a [NativeBoard] and builds the matching DSN design tree.
//! Pad and via geometries become padstacks, and footprints become images,
//! each deduplicated by content hash.
//!

// Crates.io Imports
use tracing::{debug, info, trace, warn};

// Local imports
use crate::board::{BoardSide, BoardVia, Footprint, NativeBoard, Pad, PadShape, Point, Track};
use crate::config::ExportOptions;
use crate::units::UnitConverter;
use crate::{ConvError, ConvResult};
use dsn21::hash;
use dsn21::write::needs_quotes;
use dsn21::*;
use dsn21utils::{ErrorContext, ErrorHelper, Unwrapper};

/// Class holding every net
pub const DEFAULT_CLASS: &str = "default";

/// Export `board` to DSN design text
pub fn export_design(board: &dyn NativeBoard, options: &ExportOptions) -> ConvResult<Vec<u8>> {
    let tree = DsnExporter::export(board, options)?;
    Ok(dsn21::to_bytes(&tree)?)
}

/// # DSN Exporter
pub struct DsnExporter<'brd> {
    board: &'brd dyn NativeBoard,
    options: &'brd ExportOptions,
    cv: UnitConverter,
    tree: DsnTree,
    ctx: Vec<ErrorContext>,
}
impl<'brd> DsnExporter<'brd> {
    /// Export `board` to a new [DsnTree]
    pub fn export(board: &'brd dyn NativeBoard, options: &'brd ExportOptions) -> ConvResult<DsnTree> {
        Self {
            board,
            options,
            cv: UnitConverter::export(),
            tree: DsnTree::design(board.name()),
            ctx: Vec::new(),
        }
        .export_board()
    }
    /// Primary export method
    fn export_board(mut self) -> ConvResult<DsnTree> {
        debug!(board = self.board.name(), "Exporting board");
        self.ctx.push(ErrorContext::Board(self.board.name().to_string()));
        if self.board.copper_layers().is_empty() {
            return self.fail("Board has no copper layers");
        }
        let root = self.tree.root;
        self.export_header(root);

        let structure = self.tree.add_child(root, DsnKey::Structure, Elem::Structure);
        self.export_layers(structure)?;
        self.export_boundary(structure)?;
        let rule = Rule::new(self.rules(true));
        self.tree.add_child(structure, DsnKey::Rule, rule);

        // Pads first, then the via boundary, then vias
        let library = self.tree.add_child(root, DsnKey::Library, Library::default());
        let placement = self.tree.add_child(root, DsnKey::Placement, Placement::default());
        let board = self.board;
        for fp in board.footprints() {
            self.export_footprint(fp, library, placement)?;
        }
        hash::set_via_boundary(&mut self.tree, library);

        let (dia, drill) = (self.options.via_diameter, self.options.via_drill);
        let last = board.copper_layers().len() - 1;
        let default_via = self.export_via_padstack(library, 0, last, dia, drill)?;
        let mut via_names = vec![default_via.clone()];
        self.export_wiring(root, library, &mut via_names)?;
        let via = Via {
            padstacks: via_names,
            spares: Vec::new(),
        };
        self.tree.add_child(structure, DsnKey::Via, via);

        self.export_network(root, &default_via)?;
        self.ctx.pop();

        info!(
            images = self.tree.children_tagged(library, DsnKey::Image).len(),
            padstacks = self.tree.children_tagged(library, DsnKey::Padstack).len(),
            nets = self.board.nets().len(),
            "Exported board"
        );
        Ok(self.tree)
    }
    /// Add the parser settings and unit declarations
    fn export_header(&mut self, root: ElemKey) {
        let parser = ParserConfig {
            string_quote: '"',
            space_in_quoted_tokens: true,
            host_cad: self.options.host_cad.clone(),
            host_version: self.options.host_version.clone(),
            ..Default::default()
        };
        self.tree.add_child(root, DsnKey::Parser, parser);
        self.tree
            .add_child(root, DsnKey::Resolution, UnitRes::resolution(DsnUnits::Um, 10));
        self.tree.add_child(root, DsnKey::Unit, UnitRes::unit(DsnUnits::Um));
    }
    /// Add the copper layer stack, each layer carrying its index as a property
    fn export_layers(&mut self, structure: ElemKey) -> ConvResult<()> {
        for (index, name) in self.board.copper_layers().iter().enumerate() {
            let layer = LayerBuilder::default()
                .name(name.as_str())
                .properties(vec![Property {
                    name: "index".into(),
                    value: index.to_string(),
                }])
                .build()?;
            self.tree.add_child(structure, DsnKey::Layer, layer);
        }
        Ok(())
    }
    /// Add the board boundary.
    /// Boards without an outline are bounded by the extents of their contents.
    fn export_boundary(&mut self, structure: ElemKey) -> ConvResult<()> {
        let boundary = self.tree.add_child(structure, DsnKey::Boundary, Elem::Boundary);
        let layer_id = self.options.boundary_layer.clone();
        let board = self.board;
        let outline = board.outline();
        if !outline.is_empty() {
            let mut points: Vec<DsnPoint> = outline.iter().map(|p| self.cv.to_dsn_point(*p)).collect();
            if outline.first() != outline.last() {
                points.push(self.cv.to_dsn_point(outline[0]));
            }
            let path = Path {
                layer_id,
                aperture_width: 0.0,
                points,
                ..Default::default()
            };
            self.tree.add_child(boundary, DsnKey::Path, path);
            return Ok(());
        }
        warn!("Board has no outline, bounding its contents");
        let (lo, hi) = self.extents().unwrapper(self, "Board has no outline and no contents")?;
        let rect = Rect {
            layer_id,
            point0: self.cv.to_dsn_point(Point::new(lo.x, hi.y)),
            point1: self.cv.to_dsn_point(Point::new(hi.x, lo.y)),
        };
        self.tree.add_child(boundary, DsnKey::Rect, rect);
        Ok(())
    }
    /// Get the (min, max) corners of every footprint, track and via location
    fn extents(&self) -> Option<(Point, Point)> {
        let board = self.board;
        let points = board
            .footprints()
            .iter()
            .map(|f| f.position)
            .chain(board.tracks().iter().flat_map(|t| [t.start, t.end]))
            .chain(board.vias().iter().map(|v| v.position));
        points.fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )),
        })
    }
    /// Width and clearance rules.
    /// Structure-level rules also carry typed clearances for SMD pads.
    fn rules(&self, typed: bool) -> Vec<String> {
        let width = fmt_num(self.cv.to_dsn(self.options.track_width));
        let margin = self.options.safety_margin;
        let clearance = fmt_num(self.cv.to_dsn(self.options.clearance + margin));
        let mut rules = vec![
            format!("(width {})", width),
            format!("(clearance {})", clearance),
        ];
        if typed {
            let smd = fmt_num(self.cv.to_dsn(self.options.clearance / 4 + margin));
            rules.push(format!("(clearance {} (type default_smd))", clearance));
            rules.push(format!("(clearance {} (type smd_smd))", smd));
        }
        rules
    }
    /// Export footprint `fp`: its image, and a placement of it
    fn export_footprint(&mut self, fp: &Footprint, library: ElemKey, placement: ElemKey) -> ConvResult<()> {
        self.ctx.push(ErrorContext::Footprint(fp.reference.clone()));
        trace!(reference = %fp.reference, "Exporting footprint");

        let image = Image {
            image_id: fp.footprint_id.clone(),
            side: Side::Both,
        };
        let candidate = self.tree.insert_detached(DsnKey::Image, image);
        for pad in fp.pads.iter() {
            self.export_pin(pad, library, candidate)?;
        }
        let image = hash::lookup_image(&mut self.tree, library, candidate)?;
        let image_id = self
            .tree
            .elem(image)
            .and_then(Elem::as_image)
            .map(|i| i.image_id.clone())
            .unwrapper(self, "Image lookup failed")?;

        let component = hash::lookup_component(&mut self.tree, placement, &image_id);
        let (side, rotation) = match fp.side {
            BoardSide::Front => (Side::Front, normalize(fp.rotation)),
            BoardSide::Back => (Side::Back, normalize(fp.rotation + 180.0)),
        };
        let mut place = PlaceBuilder::default()
            .component_id(fp.reference.as_str())
            .vertex(self.cv.to_dsn_point(fp.position))
            .side(side)
            .rotation(rotation);
        if fp.locked {
            place = place.lock_type(LockType::Position);
        }
        self.tree.add_child(component, DsnKey::Place, place.build()?);
        self.ctx.pop();
        Ok(())
    }
    /// Export pad `pad` as a pin of `image`, adding its padstack to `library`
    fn export_pin(&mut self, pad: &Pad, library: ElemKey, image: ElemKey) -> ConvResult<()> {
        if pad.number.is_empty() {
            warn!(context = ?self.ctx, "Skipping unnamed pad");
            return Ok(());
        }
        self.ctx.push(ErrorContext::Pad(pad.number.clone()));
        if pad.layers.is_empty() {
            warn!(context = ?self.ctx, "Skipping pad without copper layers");
            self.ctx.pop();
            return Ok(());
        }
        let padstack_id = self.export_pad_padstack(pad, library)?;
        let pin = Pin {
            padstack_id,
            rotation: normalize(pad.rotation),
            pin_id: pad.number.clone(),
            vertex: self.cv.to_dsn_point(pad.offset),
        };
        self.tree.add_child(image, DsnKey::Pin, pin);
        self.ctx.pop();
        Ok(())
    }
    /// Get the index of copper layer `name`
    fn layer_index(&self, name: &str) -> ConvResult<usize> {
        self.board
            .layer_index(name)
            .unwrapper(self, format!("Unknown copper layer {}", name))
    }
    /// Create or find the padstack for `pad`, returning its name
    fn export_pad_padstack(&mut self, pad: &Pad, library: ElemKey) -> ConvResult<String> {
        let mut indices = Vec::with_capacity(pad.layers.len());
        for layer in pad.layers.iter() {
            indices.push(self.layer_index(layer)?);
        }
        indices.sort_unstable();
        indices.dedup();
        let code = self.layer_code(&indices);

        let (w, h) = (self.cv.to_dsn(pad.size.x), self.cv.to_dsn(pad.size.y));
        if w <= 0.0 || h <= 0.0 {
            return self.fail(format!("Invalid pad size {}x{}", pad.size.x, pad.size.y));
        }
        if pad.drill < 0 || pad.drill >= pad.size.x.min(pad.size.y) {
            return self.fail(format!(
                "Drill {} does not fit pad size {}x{}",
                pad.drill, pad.size.x, pad.size.y
            ));
        }
        let name = match pad.shape {
            PadShape::Circle => format!("Round[{}]Pad_{}_um", code, fmt_num(w)),
            PadShape::Rect => format!("Rect[{}]Pad_{}x{}_um", code, fmt_num(w), fmt_num(h)),
            PadShape::Oval => format!("Oval[{}]Pad_{}x{}_um", code, fmt_num(w), fmt_num(h)),
        };
        let padstack = PadstackBuilder::default().padstack_id(name).build()?;
        let candidate = self.tree.insert_detached(DsnKey::Padstack, padstack);
        for index in indices {
            let layer_id = self.board.copper_layers()[index].clone();
            let shape = self.tree.add_child(candidate, DsnKey::Shape, Shape::default());
            match pad.shape {
                PadShape::Circle => {
                    let circle = Circle {
                        layer_id,
                        diameter: w,
                        vertex: DsnPoint::default(),
                    };
                    self.tree.add_child(shape, DsnKey::Circle, circle);
                }
                PadShape::Rect => {
                    let rect = Rect {
                        layer_id,
                        point0: DsnPoint::new(-w / 2.0, -h / 2.0),
                        point1: DsnPoint::new(w / 2.0, h / 2.0),
                    };
                    self.tree.add_child(shape, DsnKey::Rect, rect);
                }
                PadShape::Oval => {
                    // A round-ended path along the longer axis
                    let (dx, dy, width) = if w >= h {
                        ((w - h) / 2.0, 0.0, h)
                    } else {
                        (0.0, (h - w) / 2.0, w)
                    };
                    let path = Path {
                        layer_id,
                        aperture_width: width,
                        points: vec![DsnPoint::new(-dx, -dy), DsnPoint::new(dx, dy)],
                        ..Default::default()
                    };
                    self.tree.add_child(shape, DsnKey::Path, path);
                }
            }
        }
        let key = hash::find_or_add_padstack(&mut self.tree, library, candidate)?;
        self.padstack_id(key)
    }
    /// Layer-span code of a padstack name.
    /// `A` for all copper layers, `T` for the front alone, `B` for the back alone,
    /// otherwise the first and last layer indices.
    fn layer_code(&self, indices: &[usize]) -> String {
        let count = self.board.copper_layers().len();
        match indices {
            [0] => "T".into(),
            [i] if *i == count - 1 => "B".into(),
            _ if indices.len() == count => "A".into(),
            [i] => i.to_string(),
            [first, .., last] => format!("{}-{}", first, last),
            [] => String::new(),
        }
    }
    /// Create or find the via padstack spanning layers `top` through `bottom`, returning its name.
    /// Must follow [hash::set_via_boundary].
    fn export_via_padstack(
        &mut self,
        library: ElemKey,
        top: usize,
        bottom: usize,
        diameter: i64,
        drill: i64,
    ) -> ConvResult<String> {
        self.assert(drill < diameter, "Via drill must be smaller than its diameter")?;
        let (dia, drl) = (self.cv.to_dsn(diameter), self.cv.to_dsn(drill));
        let name = format!("Via[{}-{}]_{}:{}_um", top, bottom, fmt_num(dia), fmt_num(drl));
        let padstack = PadstackBuilder::default().padstack_id(name).build()?;
        let candidate = self.tree.insert_detached(DsnKey::Padstack, padstack);
        let board = self.board;
        for layer_id in board.copper_layers()[top..=bottom].iter() {
            let shape = self.tree.add_child(candidate, DsnKey::Shape, Shape::default());
            let circle = Circle {
                layer_id: layer_id.clone(),
                diameter: dia,
                vertex: DsnPoint::default(),
            };
            self.tree.add_child(shape, DsnKey::Circle, circle);
        }
        let key = hash::lookup_via(&mut self.tree, library, candidate)?;
        self.padstack_id(key)
    }
    /// Get the name of padstack `key`
    fn padstack_id(&self, key: ElemKey) -> ConvResult<String> {
        self.tree
            .elem(key)
            .and_then(Elem::as_padstack)
            .map(|p| p.padstack_id.clone())
            .unwrapper(self, "Padstack lookup failed")
    }
    /// Export existing tracks and vias as wiring
    fn export_wiring(&mut self, root: ElemKey, library: ElemKey, via_names: &mut Vec<String>) -> ConvResult<()> {
        let board = self.board;
        if board.tracks().is_empty() && board.vias().is_empty() {
            return Ok(());
        }
        let wiring = self.tree.add_child(root, DsnKey::Wiring, Elem::Wiring);
        for track in board.tracks() {
            self.export_track(track, wiring)?;
        }
        for via in board.vias() {
            let name = self.export_via(via, library, wiring)?;
            if !via_names.contains(&name) {
                via_names.push(name);
            }
        }
        Ok(())
    }
    fn export_track(&mut self, track: &Track, wiring: ElemKey) -> ConvResult<()> {
        self.ctx.push(ErrorContext::Track);
        self.layer_index(&track.layer)?;
        let wire = WireBuilder::default()
            .net_id(track.net.as_str())
            .wire_type(wire_type(track.locked))
            .build()?;
        let wire = self.tree.add_child(wiring, DsnKey::Wire, wire);
        let path = Path {
            layer_id: track.layer.clone(),
            aperture_width: self.cv.to_dsn(track.width),
            points: vec![self.cv.to_dsn_point(track.start), self.cv.to_dsn_point(track.end)],
            ..Default::default()
        };
        self.tree.add_child(wire, DsnKey::Path, path);
        self.ctx.pop();
        Ok(())
    }
    /// Export via `via` to `wiring`, returning its padstack name
    fn export_via(&mut self, via: &BoardVia, library: ElemKey, wiring: ElemKey) -> ConvResult<String> {
        self.ctx.push(ErrorContext::Via);
        let a = self.layer_index(&via.top)?;
        let b = self.layer_index(&via.bottom)?;
        let (top, bottom) = (a.min(b), a.max(b));
        let padstack_id = self.export_via_padstack(library, top, bottom, via.diameter, via.drill)?;
        let wire_via = WireViaBuilder::default()
            .padstack_id(padstack_id.as_str())
            .vertexes(vec![self.cv.to_dsn_point(via.position)])
            .net_id(via.net.as_str())
            .via_type(wire_type(via.locked))
            .build()?;
        self.tree.add_child(wiring, DsnKey::Via, wire_via);
        self.ctx.pop();
        Ok(padstack_id)
    }
    /// Export nets, and the default class holding all of them
    fn export_network(&mut self, root: ElemKey, default_via: &str) -> ConvResult<()> {
        let board = self.board;
        if board.nets().is_empty() {
            return Ok(());
        }
        let network = self.tree.add_child(root, DsnKey::Network, Elem::Network);
        for name in board.nets() {
            self.ctx.push(ErrorContext::Net(name.clone()));
            let pins: Vec<PinRef> = board
                .footprints()
                .iter()
                .flat_map(|fp| {
                    fp.pads
                        .iter()
                        .filter(|pad| pad.is_connectable() && pad.net.as_deref() == Some(name.as_str()))
                        .map(move |pad| PinRef::new(fp.reference.as_str(), pad.number.as_str()))
                })
                .collect();
            let net = NetBuilder::default().net_id(name.as_str()).pins(pins).build()?;
            self.tree.add_child(network, DsnKey::Net, net);
            self.ctx.pop();
        }
        let via = if needs_quotes(default_via, '"') {
            format!("\"{}\"", default_via)
        } else {
            default_via.to_string()
        };
        let class = Class {
            class_id: DEFAULT_CLASS.into(),
            net_ids: board.nets().to_vec(),
            circuit: vec![format!("(use_via {})", via)],
        };
        let class = self.tree.add_child(network, DsnKey::Class, class);
        let rule = Rule::new(self.rules(false));
        self.tree.add_child(class, DsnKey::Rule, rule);
        Ok(())
    }
}
impl ErrorHelper for DsnExporter<'_> {
    type Error = ConvError;
    fn err(&self, msg: impl Into<String>) -> ConvError {
        ConvError::Export {
            message: msg.into(),
            stack: self.ctx.clone(),
        }
    }
}

/// Route type of exported copper. Locked copper is protected from rerouting.
fn wire_type(locked: bool) -> WireType {
    if locked {
        WireType::Protect
    } else {
        WireType::Route
    }
}

/// Normalize angle `deg` to [0, 360)
pub(crate) fn normalize(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
