//!
//! # DSN Session Import
//!
//! Reads a routed session into a [SessionUpdate]: moved footprints, per-net copper, and pin swaps.
//! Importing never touches the board. Applying the update is left to the host, e.g. [crate::Board::apply].
//! Any failure discards the whole update.
//!

// Crates.io Imports
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

// Local imports
use crate::board::{BoardSide, BoardVia, NativeBoard, Point, Track};
use crate::config::ImportOptions;
use crate::export::normalize;
use crate::units::UnitConverter;
use crate::{ConvError, ConvResult};
use dsn21::*;
use dsn21utils::{ErrorContext, ErrorHelper, SerdeFile, Unwrapper};

/// # Footprint Placement Update
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PlacementUpdate {
    pub reference: String,
    pub position: Point,
    /// Rotation in degrees, counter-clockwise
    pub rotation: f64,
    pub side: BoardSide,
}

/// # Routed Copper of a Single Net
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct NetRoutes {
    pub net: String,
    pub tracks: Vec<Track>,
    pub vias: Vec<BoardVia>,
}

/// # Session Update Set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SessionUpdate {
    pub placements: Vec<PlacementUpdate>,
    pub routes: Vec<NetRoutes>,
    /// Pin swaps made by the router, as (was, is) pairs
    pub pin_swaps: Vec<PinPair>,
}
impl SerdeFile for SessionUpdate {}

/// Parse session text `bytes` and import it against `board`
pub fn import_session(bytes: &[u8], board: &dyn NativeBoard, options: &ImportOptions) -> ConvResult<SessionUpdate> {
    let session = dsn21::parse_session_bytes(bytes)?;
    SessionImporter::import(&session, board, options)
}

/// # Session Importer
pub struct SessionImporter<'imp> {
    session: &'imp DsnTree,
    board: &'imp dyn NativeBoard,
    options: &'imp ImportOptions,
    ctx: Vec<ErrorContext>,
}
impl<'imp> SessionImporter<'imp> {
    /// Import parsed `session` against `board`
    pub fn import(
        session: &'imp DsnTree,
        board: &'imp dyn NativeBoard,
        options: &'imp ImportOptions,
    ) -> ConvResult<SessionUpdate> {
        Self {
            session,
            board,
            options,
            ctx: Vec::new(),
        }
        .import_session()
    }
    /// Primary import method
    fn import_session(mut self) -> ConvResult<SessionUpdate> {
        let tree = self.session;
        let root = tree.root;
        let session = tree
            .elem(root)
            .and_then(Elem::as_session)
            .unwrapper(&self, "Tree is not a session")?;
        debug!(session = %session.id, "Importing session");
        self.ctx.push(ErrorContext::Session(session.id.clone()));

        let mut update = SessionUpdate::default();
        if let Some(placement) = tree.child_tagged(root, DsnKey::Placement) {
            update.placements = self.import_placement(placement)?;
        }
        for was_is in tree.children_tagged(root, DsnKey::WasIs) {
            if let Some(w) = tree.elem(was_is).and_then(Elem::as_was_is) {
                update.pin_swaps.extend(w.pin_pairs.iter().cloned());
            }
        }
        if let Some(routes) = tree.child_tagged(root, DsnKey::Routes) {
            let library = tree.child_tagged(routes, DsnKey::LibraryOut);
            for net in tree.children_tagged(routes, DsnKey::Net) {
                update.routes.push(self.import_net(net, library)?);
            }
        }
        self.ctx.pop();

        info!(
            placements = update.placements.len(),
            nets = update.routes.len(),
            pin_swaps = update.pin_swaps.len(),
            "Imported session"
        );
        Ok(update)
    }
    fn import_placement(&mut self, placement: ElemKey) -> ConvResult<Vec<PlacementUpdate>> {
        self.ctx.push(ErrorContext::Placement);
        let tree = self.session;
        let mut updates = Vec::new();
        for component in tree.children_tagged(placement, DsnKey::Component) {
            for key in tree.children_tagged(component, DsnKey::Place) {
                let place = tree
                    .elem(key)
                    .and_then(Elem::as_place)
                    .unwrapper(self, "Invalid place")?;
                if self.board.footprint(&place.component_id).is_none() {
                    return self.fail(format!("Footprint {} not found on board", place.component_id));
                }
                let vertex = place
                    .vertex
                    .unwrapper(self, format!("Place of {} has no position", place.component_id))?;
                let cv = UnitConverter::from(&tree.units(key));
                let (side, rotation) = match place.side {
                    Side::Back => (BoardSide::Back, normalize(place.rotation + 180.0)),
                    _ => (BoardSide::Front, normalize(place.rotation)),
                };
                trace!(reference = %place.component_id, "Imported placement");
                updates.push(PlacementUpdate {
                    reference: place.component_id.clone(),
                    position: cv.from_dsn_point(vertex),
                    rotation,
                    side,
                });
            }
        }
        self.ctx.pop();
        Ok(updates)
    }
    /// Import the wires and vias of routed net `key`
    fn import_net(&mut self, key: ElemKey, library: Option<ElemKey>) -> ConvResult<NetRoutes> {
        let tree = self.session;
        let net = tree
            .elem(key)
            .and_then(Elem::as_net_out)
            .unwrapper(self, "Invalid routed net")?;
        self.ctx.push(ErrorContext::Net(net.net_id.clone()));
        if !self.board.has_net(&net.net_id) {
            return self.fail(format!("Net {} not found on board", net.net_id));
        }
        let mut routes = NetRoutes {
            net: net.net_id.clone(),
            ..Default::default()
        };
        for wire in tree.children_tagged(key, DsnKey::Wire) {
            self.import_wire(wire, &mut routes)?;
        }
        for via in tree.children_tagged(key, DsnKey::Via) {
            self.import_via(via, library, &mut routes)?;
        }
        self.ctx.pop();
        Ok(routes)
    }
    /// Import wire `key`, splitting its path into track segments
    fn import_wire(&mut self, key: ElemKey, routes: &mut NetRoutes) -> ConvResult<()> {
        self.ctx.push(ErrorContext::Track);
        let tree = self.session;
        let wire = tree.elem(key).and_then(Elem::as_wire).unwrapper(self, "Invalid wire")?;
        let locked = wire.wire_type == Some(WireType::Protect);
        let shape = tree
            .children_tagged_any(key, &DsnKey::SHAPES)
            .first()
            .copied()
            .unwrapper(self, "Wire has no shape")?;
        match tree.tag(shape) {
            Some(DsnKey::Path) => {
                let path = tree.elem(shape).and_then(Elem::as_path).unwrapper(self, "Invalid path")?;
                if self.board.layer_index(&path.layer_id).is_none() {
                    return self.fail(format!("Unknown copper layer {}", path.layer_id));
                }
                let cv = UnitConverter::from(&tree.units(shape));
                let width = cv.from_dsn(path.aperture_width);
                for seg in path.points.windows(2) {
                    routes.tracks.push(Track {
                        net: routes.net.clone(),
                        layer: path.layer_id.clone(),
                        width,
                        start: cv.from_dsn_point(seg[0]),
                        end: cv.from_dsn_point(seg[1]),
                        locked,
                    });
                }
            }
            Some(DsnKey::Polygon) => warn!(context = ?self.ctx, "Skipping polygon wire"),
            Some(tag) => return self.fail(format!("Unsupported wire shape {}", tag)),
            None => return self.fail("Invalid wire shape"),
        }
        self.ctx.pop();
        Ok(())
    }
    /// Import routed via `key`, resolving its padstack in `library`
    fn import_via(&mut self, key: ElemKey, library: Option<ElemKey>, routes: &mut NetRoutes) -> ConvResult<()> {
        self.ctx.push(ErrorContext::Via);
        let tree = self.session;
        let via = tree.elem(key).and_then(Elem::as_wire_via).unwrapper(self, "Invalid via")?;
        let library = library.unwrapper(self, "Session has no library_out for its vias")?;
        let padstack = tree
            .children_tagged(library, DsnKey::Padstack)
            .into_iter()
            .find(|k| {
                tree.elem(*k)
                    .and_then(Elem::as_padstack)
                    .map_or(false, |p| p.padstack_id == via.padstack_id)
            })
            .unwrapper(self, format!("Unknown via padstack {}", via.padstack_id))?;
        let (top, bottom, diameter) = self.via_geometry(padstack, &via.padstack_id)?;

        let cv = UnitConverter::from(&tree.units(key));
        let locked = via.via_type == Some(WireType::Protect);
        for vertex in via.vertexes.iter() {
            routes.vias.push(BoardVia {
                net: routes.net.clone(),
                position: cv.from_dsn_point(*vertex),
                diameter,
                drill: self.options.default_via_drill,
                top: top.clone(),
                bottom: bottom.clone(),
                locked,
            });
        }
        self.ctx.pop();
        Ok(())
    }
    /// Get the (top layer, bottom layer, diameter) of via padstack `key`, from its copper shapes
    fn via_geometry(&mut self, key: ElemKey, name: &str) -> ConvResult<(String, String, i64)> {
        self.ctx.push(ErrorContext::Padstack(name.to_string()));
        let tree = self.session;
        let cv = UnitConverter::from(&tree.units(key));
        let mut span: Option<(usize, usize)> = None;
        let mut diameter = 0;
        for shape in tree.children_tagged(key, DsnKey::Shape) {
            for s in tree.children(shape) {
                let (layer_id, size) = match tree.elem(*s) {
                    Some(Elem::Circle(c)) => (&c.layer_id, c.diameter),
                    Some(Elem::Rect(r)) => {
                        let w = (r.point1.x - r.point0.x).abs();
                        let h = (r.point1.y - r.point0.y).abs();
                        (&r.layer_id, w.min(h))
                    }
                    _ => continue,
                };
                let index = self
                    .board
                    .layer_index(layer_id)
                    .unwrapper(self, format!("Unknown copper layer {}", layer_id))?;
                span = Some(match span {
                    None => (index, index),
                    Some((a, b)) => (a.min(index), b.max(index)),
                });
                diameter = diameter.max(cv.from_dsn(size));
            }
        }
        let (a, b) = span.unwrapper(self, "Via padstack has no copper shapes")?;
        let layers = self.board.copper_layers();
        self.ctx.pop();
        Ok((layers[a].clone(), layers[b].clone(), diameter))
    }
}
impl ErrorHelper for SessionImporter<'_> {
    type Error = ConvError;
    fn err(&self, msg: impl Into<String>) -> ConvError {
        ConvError::Import {
            message: msg.into(),
            stack: self.ctx.clone(),
        }
    }
}
