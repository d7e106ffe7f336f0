//!
//! # DSN Writer Module
//!
//! Writes [DsnTree]s as Specctra DSN text.
//! Output is byte-exact with what the routers which consume it expect:
//! two-space indentation, `%.6g`-style numbers, conditional quoting,
//! and per-construct line wrapping and trailing newlines.
//!

// Standard Lib Imports
use std::io::Write;

// Crates.io Imports
use tracing::debug;

// Local imports
use crate::data::*;
use crate::tree::{DsnTree, ElemKey, Node};
use crate::{DsnError, DsnResult};

/// Right margin of path and polygon point lists
const PATH_MARGIN: usize = 70;
/// Right margin of id, pin-reference and vertex lists
const LIST_MARGIN: usize = 80;

/// Write a [DsnTree] to file `fname`
pub fn save(tree: &DsnTree, fname: impl AsRef<std::path::Path>) -> DsnResult<()> {
    let fname = fname.as_ref();
    debug!(?fname, "Writing DSN");
    let file = std::fs::File::create(fname)?;
    let mut writer = DsnWriter::new(std::io::BufWriter::new(file))
        .with_quote(active_quote(tree))
        .with_encoding(tree.encoding);
    writer.format(tree, tree.root, 0)?;
    writer.flush()
}
/// Write a [DsnTree] to bytes, in the tree's [Encoding]
pub fn to_bytes(tree: &DsnTree) -> DsnResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = DsnWriter::new(&mut buf)
        .with_quote(active_quote(tree))
        .with_encoding(tree.encoding);
    writer.format(tree, tree.root, 0)?;
    writer.flush()?;
    drop(writer);
    Ok(buf)
}
/// Write a [DsnTree] to a DSN-format [String]
pub fn to_string(tree: &DsnTree) -> DsnResult<String> {
    format_node(tree, tree.root, 0)
}
/// Write node `key` of `tree`, at nest-level `nest`, to a [String]
pub fn format_node(tree: &DsnTree, key: ElemKey, nest: usize) -> DsnResult<String> {
    let mut buf = Vec::new();
    let mut writer = DsnWriter::new(&mut buf).with_quote(active_quote(tree));
    let count = writer.format(tree, key, nest)?;
    writer.flush()?;
    drop(writer);
    debug!(count, "Formatted DSN");
    Ok(String::from_utf8(buf)?)
}
/// Get the quote character declared by the `parser` descriptor of `tree`, or `"` if none is declared
pub fn active_quote(tree: &DsnTree) -> char {
    let root = tree.root;
    let parser = tree.child_tagged(root, DsnKey::Parser).or_else(|| {
        tree.child_tagged(root, DsnKey::Routes)
            .and_then(|r| tree.child_tagged(r, DsnKey::Parser))
    });
    parser
        .and_then(|p| tree.elem(p))
        .and_then(Elem::as_parser)
        .map_or('"', |p| p.string_quote)
}

/// Format a number in the manner of C's `%.6g`:
/// six significant digits, trailing zeros removed,
/// and exponent notation outside of `[1e-4, 1e6)`.
/// Negative zero is written as `0`.
pub fn fmt_num(v: f64) -> String {
    if v == 0.0 {
        return "0".into();
    }
    if !v.is_finite() {
        return v.to_string();
    }
    const PRECISION: i32 = 6;
    // Rounding to six digits may carry into the next decade, so take the exponent after rounding
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..PRECISION).contains(&exp) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, v);
        trim_zeros(&fixed).to_string()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    }
}
/// Encode `txt` as Latin-1. Fails on characters beyond U+00FF.
fn latin1(txt: &str) -> DsnResult<Vec<u8>> {
    txt.chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(b) => Ok(b),
            Err(_) => Err(DsnError::Str(format!("Cannot write {:?} as Latin-1", c))),
        })
        .collect()
}
/// Remove trailing fractional zeros, and a trailing decimal point
fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Trailing-newline policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Newline {
    /// Always end with a newline
    Always,
    /// End with a newline only when nested, i.e. written on a line of its own
    WhenNested,
    /// End with a newline when nested, or when written across multiple lines
    WhenNestedOrMultiLine,
}
impl Newline {
    fn of(kind: ElemKind) -> Self {
        match kind {
            ElemKind::Rect
            | ElemKind::Circle
            | ElemKind::Path
            | ElemKind::Qarc
            | ElemKind::CompOrder
            | ElemKind::Connect => Self::WhenNested,
            ElemKind::Rule | ElemKind::Fromto => Self::WhenNestedOrMultiLine,
            _ => Self::Always,
        }
    }
}

/// # Dsn Writing Helper
pub struct DsnWriter<'wr> {
    /// Write Destination
    dest: Box<dyn Write + 'wr>,
    /// Active quote character
    quote: char,
    /// Output text encoding
    encoding: Encoding,
    /// Total characters written
    written: usize,
}
impl<'wr> DsnWriter<'wr> {
    /// Create a new [DsnWriter] to destination `dest`.
    /// Destination is boxed internally.
    pub fn new(dest: impl Write + 'wr) -> Self {
        Self {
            dest: Box::new(dest),
            quote: '"',
            encoding: Encoding::Utf8,
            written: 0,
        }
    }
    /// Set the quote character
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }
    /// Set the output encoding
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
    pub fn flush(&mut self) -> DsnResult<()> {
        self.dest.flush()?;
        Ok(())
    }
    /// Write node `key` at nest-level `nest`, returning the number of characters written
    pub fn format(&mut self, tree: &DsnTree, key: ElemKey, nest: usize) -> DsnResult<usize> {
        let start = self.written;
        let node = node(tree, key)?;
        let multi_line = self.format_elem(tree, key, node, nest)?;
        let newline = match Newline::of(node.elem.kind()) {
            Newline::Always => true,
            Newline::WhenNested => nest > 0,
            Newline::WhenNestedOrMultiLine => nest > 0 || multi_line,
        };
        if newline {
            self.put("\n")?;
        }
        Ok(self.written - start)
    }
    /// Write the contents of node `key`, excluding its name and outer wrapper.
    /// For padstacks and images this is the text their deduplication hashes are computed over.
    pub fn format_contents(&mut self, tree: &DsnTree, key: ElemKey, nest: usize) -> DsnResult<usize> {
        let start = self.written;
        let node = node(tree, key)?;
        match &node.elem {
            Elem::Parser(p) => self.parser_contents(p, nest)?,
            Elem::Padstack(p) => self.padstack_contents(tree, key, p, nest)?,
            Elem::Image(i) => self.image_contents(tree, key, i, nest)?,
            Elem::Placement(p) => self.placement_contents(tree, key, p, nest)?,
            Elem::Region(r) => self.region_contents(tree, key, r, nest)?,
            Elem::History(h) => self.history_contents(tree, key, h, nest)?,
            Elem::WasIs(w) => self.was_is_contents(w, nest)?,
            Elem::Route => self.routes_contents(tree, key, nest)?,
            _ => self.children(tree, key, nest)?,
        }
        Ok(self.written - start)
    }
    /// Write text `txt`, indented to nest-level `nest`. Returns the number of characters written, indentation included.
    fn print(&mut self, nest: usize, txt: impl AsRef<str>) -> DsnResult<usize> {
        let txt = txt.as_ref();
        for _ in 0..nest {
            self.dest.write_all(b"  ")?;
        }
        match self.encoding {
            Encoding::Utf8 => self.dest.write_all(txt.as_bytes())?,
            Encoding::Latin1 => self.dest.write_all(&latin1(txt)?)?,
        }
        let count = 2 * nest + txt.chars().count();
        self.written += count;
        Ok(count)
    }
    /// Write text `txt` without indentation
    fn put(&mut self, txt: impl AsRef<str>) -> DsnResult<usize> {
        self.print(0, txt)
    }
    /// Quote string `s` if it would otherwise be ambiguous
    fn q(&self, s: &str) -> String {
        if needs_quotes(s, self.quote) {
            format!("{q}{s}{q}", q = self.quote)
        } else {
            s.to_string()
        }
    }
    /// Write a `comp-pin` reference, quoting each side independently
    fn pin_ref(&mut self, pin: &PinRef) -> DsnResult<usize> {
        let txt = format!("{}-{}", self.q(&pin.component_id), self.q(&pin.pin_id));
        self.put(txt)
    }
    /// Write the children of `key` in canonical order
    fn children(&mut self, tree: &DsnTree, key: ElemKey, nest: usize) -> DsnResult<()> {
        for child in tree.ordered_children(key) {
            self.format(tree, child, nest)?;
        }
        Ok(())
    }
    /// Write the children of `key` tagged with any of `tags`, in insertion order
    fn kids(&mut self, tree: &DsnTree, key: ElemKey, tags: &[DsnKey], nest: usize) -> DsnResult<()> {
        for child in tree.children_tagged_any(key, tags) {
            self.format(tree, child, nest)?;
        }
        Ok(())
    }
    /// Write the common `(tag` contents `)` wrapper
    fn wrapped(&mut self, tree: &DsnTree, key: ElemKey, tag: DsnKey, nest: usize) -> DsnResult<()> {
        self.print(nest, format!("({}\n", tag))?;
        self.format_contents(tree, key, nest + 1)?;
        self.print(nest, ")")?;
        Ok(())
    }
    /// Write a property list, `(property (name value)*)`
    fn properties(&mut self, props: &[Property], nest: usize) -> DsnResult<()> {
        if props.is_empty() {
            return Ok(());
        }
        // Routers and KiCad write `(property ` with its trailing space
        self.print(nest, "(property \n")?;
        for p in props {
            let txt = format!("({} {})\n", self.q(&p.name), self.q(&p.value));
            self.print(nest + 1, txt)?;
        }
        self.print(nest, ")\n")?;
        Ok(())
    }
    /// Write the construct of `node`, without its trailing newline.
    /// Returns whether it was written across multiple lines.
    fn format_elem(&mut self, tree: &DsnTree, key: ElemKey, node: &Node, nest: usize) -> DsnResult<bool> {
        let tag = node.tag;
        match &node.elem {
            Elem::Pcb(pcb) => {
                self.print(nest, format!("({} {}\n", DsnKey::Pcb, self.q(&pcb.name)))?;
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Session(session) => {
                // Sessions are written with the `pcb` keyword
                self.print(nest, format!("({} {}\n", DsnKey::Pcb, self.q(&session.id)))?;
                self.print(nest + 1, format!("(base_design \"{}\")\n", session.base_design))?;
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::UnitRes(u) => match tag {
                DsnKey::Resolution => {
                    self.print(nest, format!("({} {} {})", tag, u.units, u.value))?;
                }
                _ => {
                    self.print(nest, format!("({} {})", tag, u.units))?;
                }
            },
            Elem::Layer(layer) => self.layer(tree, key, layer, nest)?,
            Elem::LayerPair(p) => {
                let txt = format!(
                    "({} {} {} {})",
                    tag,
                    self.q(&p.layer_id0),
                    self.q(&p.layer_id1),
                    fmt_num(p.layer_weight)
                );
                self.print(nest, txt)?;
            }
            Elem::Rect(r) => {
                let txt = format!(
                    "({} {} {} {} {} {})",
                    tag,
                    self.q(&r.layer_id),
                    fmt_num(r.point0.x),
                    fmt_num(r.point0.y),
                    fmt_num(r.point1.x),
                    fmt_num(r.point1.y)
                );
                self.print(nest, txt)?;
            }
            Elem::Circle(c) => {
                let head = format!("({} {} {}", tag, self.q(&c.layer_id), fmt_num(c.diameter));
                self.print(nest, head)?;
                if c.vertex.x != 0.0 || c.vertex.y != 0.0 {
                    self.put(format!(" {} {}", fmt_num(c.vertex.x), fmt_num(c.vertex.y)))?;
                }
                self.put(")")?;
            }
            Elem::Path(p) => self.path(tag, p, nest)?,
            Elem::Qarc(a) => {
                let head = format!(
                    "({} {} {}",
                    tag,
                    self.q(&a.layer_id),
                    fmt_num(a.aperture_width)
                );
                self.print(nest, head)?;
                for v in a.vertex.iter() {
                    self.put(format!("  {} {}", fmt_num(v.x), fmt_num(v.y)))?;
                }
                self.put(")")?;
            }
            Elem::Window => {
                self.print(nest, format!("({} ", tag))?;
                self.kids(tree, key, &DsnKey::SHAPES, 0)?;
                self.put(")")?;
            }
            Elem::Keepout(k) => {
                self.print(nest, format!("({}\n", tag))?;
                if !k.name.is_empty() {
                    self.print(nest + 1, format!("{}\n", self.q(&k.name)))?;
                }
                if let Some(n) = k.sequence_number {
                    self.print(nest + 1, format!("(sequence_number {})\n", n))?;
                }
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Via(via) => self.via(tag, via, nest)?,
            Elem::Control(c) => {
                self.print(nest, format!("({}\n", tag))?;
                let mut line = format!("(via_at_smd {}", OnOff::from_bool(c.via_at_smd));
                if c.via_at_smd_grid_on {
                    line.push_str(" grid on");
                }
                line.push_str(")\n");
                self.print(nest + 1, line)?;
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::TokProp(p) => {
                self.print(nest, format!("({} {})", tag, p.value))?;
            }
            Elem::StringProp(p) => {
                self.print(nest, format!("({} {})", tag, self.q(&p.value)))?;
            }
            Elem::Classes(c) => {
                self.print(nest, format!("({}\n", tag))?;
                for id in c.class_ids.iter() {
                    self.print(nest + 1, format!("{}\n", self.q(id)))?;
                }
                self.print(nest, ")")?;
            }
            Elem::Grid(g) => {
                let mut txt = format!("({} {} {}", tag, g.grid_type, fmt_num(g.dimension));
                if g.grid_type == GridType::Place {
                    if let Some(t) = g.image_type {
                        txt.push_str(&format!(" (image_type {})", t));
                    }
                } else if let Some(d) = g.direction {
                    txt.push_str(&format!(" (direction {})", d));
                }
                if g.offset != 0.0 {
                    txt.push_str(&format!(" (offset {})", fmt_num(g.offset)));
                }
                txt.push(')');
                self.print(nest, txt)?;
            }
            Elem::Rule(rule) => {
                self.print(nest, format!("({}", tag))?;
                if rule.rules.len() == 1 {
                    self.put(format!(" {})", rule.rules[0]))?;
                } else {
                    self.put("\n")?;
                    for r in rule.rules.iter() {
                        self.print(nest + 1, format!("{}\n", r))?;
                    }
                    self.print(nest, ")")?;
                    return Ok(true);
                }
            }
            Elem::LayerRule(lr) => {
                let mut txt = format!("({}", tag);
                for id in lr.layer_ids.iter() {
                    txt.push(' ');
                    txt.push_str(&self.q(id));
                }
                txt.push('\n');
                self.print(nest, txt)?;
                self.kids(tree, key, &[DsnKey::Rule], nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Component(c) => {
                self.print(nest, format!("({} {}\n", tag, self.q(&c.image_id)))?;
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Place(place) => self.place(tree, key, place, nest)?,
            Elem::Image(image) => {
                self.print(nest, format!("({} {}", tag, self.q(&image.image_id)))?;
                self.format_contents(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Shape(shape) => {
                self.print(nest, format!("({} ", tag))?;
                self.kids(tree, key, &DsnKey::SHAPES, 0)?;
                if !shape.connect {
                    self.put("(connect off)")?;
                }
                let windows = tree.children_tagged(key, DsnKey::Window);
                if windows.is_empty() {
                    self.put(")")?;
                } else {
                    self.put("\n")?;
                    for w in windows {
                        self.format(tree, w, nest + 1)?;
                    }
                    self.print(nest, ")")?;
                }
            }
            Elem::Pin(pin) => {
                let mut txt = format!("({} {}", tag, self.q(&pin.padstack_id));
                if pin.rotation != 0.0 {
                    txt.push_str(&format!(" (rotate {})", fmt_num(pin.rotation)));
                }
                txt.push_str(&format!(
                    " {} {} {})",
                    self.q(&pin.pin_id),
                    fmt_num(pin.vertex.x),
                    fmt_num(pin.vertex.y)
                ));
                self.print(nest, txt)?;
            }
            Elem::Padstack(p) => {
                self.print(nest, format!("({} {}\n", tag, self.q(&p.padstack_id)))?;
                self.format_contents(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::Net(net) => self.net(tree, key, net, nest)?,
            Elem::Class(class) => self.class(tree, key, class, nest)?,
            Elem::CompOrder(c) => {
                let mut txt = format!("({}", tag);
                for id in c.placement_ids.iter() {
                    txt.push(' ');
                    txt.push_str(&self.q(id));
                }
                txt.push(')');
                self.print(nest, txt)?;
            }
            Elem::Fromto(f) => return self.fromto(tree, key, f, nest),
            Elem::Wire(wire) => self.wire(tree, key, wire, nest)?,
            Elem::Connect(c) => {
                let mut txt = format!("({}", tag);
                for t in c.terms.iter() {
                    txt.push(' ');
                    txt.push_str(t);
                }
                txt.push(')');
                self.print(nest, txt)?;
            }
            Elem::WireVia(via) => self.wire_via(via, nest)?,
            Elem::Ancestor(a) => {
                let head = format!(
                    "({} \"{}\" ({} {})\n",
                    tag,
                    a.filename,
                    DsnKey::CreatedTime,
                    fmt_time(&a.time_stamp)
                );
                self.print(nest, head)?;
                if !a.comment.is_empty() {
                    self.print(nest + 1, format!("(comment {})\n", self.q(&a.comment)))?;
                }
                self.print(nest, ")")?;
            }
            Elem::NetOut(n) => {
                self.print(nest, format!("({} {}\n", DsnKey::Net, self.q(&n.net_id)))?;
                if let Some(num) = n.net_number {
                    self.print(nest + 1, format!("(net_number {})\n", num))?;
                }
                self.children(tree, key, nest + 1)?;
                self.print(nest, ")")?;
            }
            Elem::SupplyPin(s) => self.supply_pin(tag, s, nest)?,
            // Everything else is a `(tag` contents `)` wrapper
            _ => self.wrapped(tree, key, tag, nest)?,
        }
        Ok(false)
    }
    fn parser_contents(&mut self, p: &ParserConfig, nest: usize) -> DsnResult<()> {
        self.print(nest, format!("(string_quote {})\n", p.string_quote))?;
        let space = OnOff::from_bool(p.space_in_quoted_tokens);
        self.print(nest, format!("(space_in_quoted_tokens {})\n", space))?;
        if !p.host_cad.is_empty() {
            self.print(nest, format!("(host_cad {})\n", self.q(&p.host_cad)))?;
        }
        if !p.host_version.is_empty() {
            self.print(nest, format!("(host_version {})\n", self.q(&p.host_version)))?;
        }
        if !p.const_id1.is_empty() || !p.const_id2.is_empty() {
            let txt = format!("(constant {} {})\n", self.q(&p.const_id1), self.q(&p.const_id2));
            self.print(nest, txt)?;
        }
        if p.routes_include_testpoint || p.routes_include_guides || p.routes_include_image_conductor {
            let mut txt = String::from("(routes_include");
            if p.routes_include_testpoint {
                txt.push_str(" testpoint");
            }
            if p.routes_include_guides {
                txt.push_str(" guides");
            }
            if p.routes_include_image_conductor {
                txt.push_str(" image_conductor");
            }
            txt.push_str(")\n");
            self.print(nest, txt)?;
        }
        if p.wires_include_testpoint {
            self.print(nest, "(wires_include testpoint)\n")?;
        }
        if !p.via_rotate_first {
            self.print(nest, "(via_rotate_first off)\n")?;
        }
        if p.case_sensitive {
            self.print(nest, "(case_sensitive on)\n")?;
        }
        if p.generated_by_freeroute {
            self.print(nest, "(generated_by_freeroute)\n")?;
        }
        Ok(())
    }
    fn layer(&mut self, tree: &DsnTree, key: ElemKey, layer: &Layer, nest: usize) -> DsnResult<()> {
        self.print(nest, format!("({} {}\n", DsnKey::Layer, self.q(&layer.name)))?;
        self.print(nest + 1, format!("(type {})\n", layer.layer_type))?;
        self.properties(&layer.properties, nest + 1)?;
        if let Some(d) = layer.direction {
            self.print(nest + 1, format!("(direction {})\n", d))?;
        }
        self.kids(tree, key, &[DsnKey::Rule], nest + 1)?;
        if let Some(cost) = layer.cost {
            let mut txt = match cost {
                LayerCost::Level(level) => format!("(cost {}", level),
                LayerCost::Value(v) => format!("(cost {}", v),
            };
            if let Some(t) = layer.cost_type {
                txt.push_str(&format!(" (type {})", t));
            }
            txt.push_str(")\n");
            self.print(nest + 1, txt)?;
        }
        if !layer.use_net.is_empty() {
            let mut txt = String::from("(use_net");
            for n in layer.use_net.iter() {
                txt.push(' ');
                txt.push_str(&self.q(n));
            }
            txt.push_str(")\n");
            self.print(nest + 1, txt)?;
        }
        self.print(nest, ")")?;
        Ok(())
    }
    /// Write a path or polygon, wrapping its points past the right margin
    fn path(&mut self, tag: DsnKey, p: &Path, nest: usize) -> DsnResult<()> {
        let head = format!(
            "({} {} {}",
            tag,
            self.q(&p.layer_id),
            fmt_num(p.aperture_width)
        );
        let mut per_line = self.print(nest, head)?;
        let wrap_nest = (nest + 1).max(6);
        for pt in p.points.iter() {
            if per_line > PATH_MARGIN {
                self.put("\n")?;
                per_line = self.print(wrap_nest, "")?;
            } else {
                per_line += self.put("  ")?;
            }
            per_line += self.put(format!("{} {}", fmt_num(pt.x), fmt_num(pt.y)))?;
        }
        if p.aperture_type == Aperture::Square {
            self.put("(aperture_type square)")?;
        }
        self.put(")")?;
        Ok(())
    }
    /// Write the structure-level via list and its spares
    fn via(&mut self, tag: DsnKey, via: &Via, nest: usize) -> DsnResult<()> {
        let mut per_line = self.print(nest, format!("({}", tag))?;
        for ps in via.padstacks.iter() {
            if per_line > LIST_MARGIN {
                self.put("\n")?;
                per_line = self.print(nest + 1, "")?;
            }
            per_line += self.put(format!(" {}", self.q(ps)))?;
        }
        if !via.spares.is_empty() {
            self.put("\n")?;
            per_line = self.print(nest + 1, "(spare")?;
            for ps in via.spares.iter() {
                if per_line > LIST_MARGIN {
                    self.put("\n")?;
                    per_line = self.print(nest + 2, "")?;
                }
                per_line += self.put(format!(" {}", self.q(ps)))?;
            }
            self.put(")")?;
        }
        self.put(")")?;
        Ok(())
    }
    fn region_contents(&mut self, tree: &DsnTree, key: ElemKey, region: &Region, nest: usize) -> DsnResult<()> {
        if !region.region_id.is_empty() {
            self.print(nest, format!("{}\n", self.q(&region.region_id)))?;
        }
        self.children(tree, key, nest)
    }
    fn placement_contents(&mut self, tree: &DsnTree, key: ElemKey, p: &Placement, nest: usize) -> DsnResult<()> {
        self.kids(tree, key, &[DsnKey::Unit, DsnKey::Resolution], nest)?;
        if let Some(style) = p.flip_style {
            self.print(nest, format!("(place_control (flip_style {}))\n", style))?;
        }
        self.kids(tree, key, &[DsnKey::Component], nest)
    }
    /// Write a component placement.
    /// Placements with nested rules, properties or regions are written across lines.
    fn place(&mut self, tree: &DsnTree, key: ElemKey, place: &Place, nest: usize) -> DsnResult<()> {
        let place_rules = tree.children_tagged(key, DsnKey::PlaceRule);
        let rules = tree.children_tagged(key, DsnKey::Rule);
        let regions = tree.children_tagged(key, DsnKey::Region);
        let multi_line = !place_rules.is_empty()
            || !place.properties.is_empty()
            || !rules.is_empty()
            || !regions.is_empty();

        let head = format!("({} {}", DsnKey::Place, self.q(&place.component_id));
        if multi_line {
            self.print(nest, head + "\n")?;
            self.print(nest + 1, "")?;
        } else {
            self.print(nest, head)?;
        }
        if let Some(v) = place.vertex {
            let txt = format!(
                " {} {} {} {}",
                fmt_num(v.x),
                fmt_num(v.y),
                place.side,
                fmt_num(place.rotation)
            );
            self.put(txt)?;
        }
        let mut space = " ";
        if let Some(m) = place.mirror {
            self.put(format!("{}(mirror {})", space, m))?;
            space = "";
        }
        if let Some(s) = place.status {
            self.put(format!("{}(status {})", space, s))?;
            space = "";
        }
        if !place.logical_part.is_empty() {
            self.put(format!("{}(logical_part {})", space, self.q(&place.logical_part)))?;
            space = "";
        }
        if multi_line {
            self.put("\n")?;
            for k in place_rules {
                self.format(tree, k, nest + 1)?;
            }
            self.properties(&place.properties, nest + 1)?;
            if let Some(lock) = place.lock_type {
                self.print(nest + 1, format!("(lock_type {})\n", lock))?;
            }
            for k in rules.into_iter().chain(regions) {
                self.format(tree, k, nest + 1)?;
            }
            if !place.part_number.is_empty() {
                self.print(nest + 1, format!("(PN {})\n", self.q(&place.part_number)))?;
            }
            self.print(nest, ")")?;
        } else {
            if let Some(lock) = place.lock_type {
                self.put(format!("{}(lock_type {})", space, lock))?;
                space = "";
            }
            if !place.part_number.is_empty() {
                self.put(format!("{}(PN {})", space, self.q(&place.part_number)))?;
            }
            self.put(")")?;
        }
        Ok(())
    }
    fn image_contents(&mut self, tree: &DsnTree, key: ElemKey, image: &Image, nest: usize) -> DsnResult<()> {
        if image.side != Side::Both {
            self.put(format!(" (side {})", image.side))?;
        }
        self.put("\n")?;
        self.children(tree, key, nest)
    }
    fn padstack_contents(&mut self, tree: &DsnTree, key: ElemKey, p: &Padstack, nest: usize) -> DsnResult<()> {
        self.kids(tree, key, &[DsnKey::Unit, DsnKey::Resolution], nest)?;
        self.kids(tree, key, &[DsnKey::Shape], nest)?;
        self.print(nest, "")?;
        if !p.attach {
            self.put("(attach off)")?;
        } else if p.via_id.is_empty() {
            self.put("(attach on)")?;
        } else {
            self.put(format!("(attach on (use_via {}))", self.q(&p.via_id)))?;
        }
        if !p.rotate {
            self.put("(rotate off)")?;
        }
        if p.absolute {
            self.put("(absolute on)")?;
        }
        self.put("\n")?;
        self.kids(tree, key, &[DsnKey::Rule], nest)
    }
    fn net(&mut self, tree: &DsnTree, key: ElemKey, net: &Net, nest: usize) -> DsnResult<()> {
        self.print(nest, format!("({} {} ", DsnKey::Net, self.q(&net.net_id)))?;
        if net.unassigned {
            self.put("(unassigned)")?;
        }
        if let Some(n) = net.net_number {
            self.put(format!("(net_number {})", n))?;
        }
        self.put("\n")?;

        let mut per_line = self.print(nest + 1, format!("({}", net.pins_type))?;
        for pin in net.pins.iter() {
            if per_line > LIST_MARGIN {
                self.put("\n")?;
                per_line = self.print(nest + 2, "")?;
            } else {
                per_line += self.put(" ")?;
            }
            per_line += self.pin_ref(pin)?;
        }
        self.put(")\n")?;

        self.kids(tree, key, &[DsnKey::CompOrder], nest + 1)?;
        if let Some(t) = net.net_type {
            self.print(nest + 1, format!("(type {})\n", t))?;
        }
        self.kids(tree, key, &[DsnKey::Rule], nest + 1)?;
        self.kids(tree, key, &[DsnKey::LayerRule], nest + 1)?;
        self.kids(tree, key, &[DsnKey::Fromto], nest + 1)?;
        self.print(nest, ")")?;
        Ok(())
    }
    fn class(&mut self, tree: &DsnTree, key: ElemKey, class: &Class, nest: usize) -> DsnResult<()> {
        let mut per_line = self.print(nest, format!("({} {}", DsnKey::Class, self.q(&class.class_id)))?;
        for id in class.net_ids.iter() {
            if per_line > LIST_MARGIN {
                self.put("\n")?;
                per_line = self.print(nest + 1, "")?;
            }
            per_line += self.put(format!(" {}", self.q(id)))?;
        }
        let multi_line = !class.circuit.is_empty() || !tree.children(key).is_empty();
        if multi_line {
            self.put("\n")?;
        }
        if !class.circuit.is_empty() {
            self.print(nest + 1, "(circuit\n")?;
            for c in class.circuit.iter() {
                self.print(nest + 2, format!("{}\n", c))?;
            }
            self.print(nest + 1, ")\n")?;
        }
        self.children(tree, key, nest + 1)?;
        self.print(if multi_line { nest } else { 0 }, ")")?;
        Ok(())
    }
    /// Write a from-to. Its endpoints are written as the raw text they were read as.
    fn fromto(&mut self, tree: &DsnTree, key: ElemKey, f: &Fromto, nest: usize) -> DsnResult<bool> {
        self.print(nest, format!("({} {} {} ", DsnKey::Fromto, f.from_text, f.to_text))?;
        if let Some(t) = f.fromto_type {
            self.put(format!("(type {})", t))?;
        }
        if !f.net_id.is_empty() {
            self.put(format!("(net {})", self.q(&f.net_id)))?;
        }
        let multi_line = !tree.children(key).is_empty();
        if multi_line {
            self.put("\n")?;
            self.children(tree, key, nest + 1)?;
        }
        self.print(if multi_line { nest } else { 0 }, ")")?;
        Ok(multi_line)
    }
    fn wire(&mut self, tree: &DsnTree, key: ElemKey, wire: &Wire, nest: usize) -> DsnResult<()> {
        self.print(nest, format!("({} ", DsnKey::Wire))?;
        self.kids(tree, key, &DsnKey::SHAPES, 0)?;
        if !wire.net_id.is_empty() {
            self.put(format!("(net {})", self.q(&wire.net_id)))?;
        }
        if let Some(t) = wire.turret {
            self.put(format!("(turret {})", t))?;
        }
        if let Some(t) = wire.wire_type {
            self.put(format!("(type {})", t))?;
        }
        if let Some(a) = wire.attr {
            self.put(format!("(attr {})", a))?;
        }
        if !wire.shield.is_empty() {
            self.put(format!("(shield {})", self.q(&wire.shield)))?;
        }
        let windows = tree.children_tagged(key, DsnKey::Window);
        if !windows.is_empty() {
            self.put("\n")?;
            for w in windows {
                self.format(tree, w, nest + 1)?;
            }
        }
        self.kids(tree, key, &[DsnKey::Connect], 0)?;
        if wire.supply {
            self.put("(supply)")?;
        }
        self.put(")")?;
        Ok(())
    }
    /// Write a routed via. Vertices and trailing attributes wrap past the right margin.
    fn wire_via(&mut self, via: &WireVia, nest: usize) -> DsnResult<()> {
        let head = format!("({} {}", DsnKey::Via, self.q(&via.padstack_id));
        let mut per_line = self.print(nest, head)?;
        for v in via.vertexes.iter() {
            if per_line > LIST_MARGIN {
                self.put("\n")?;
                per_line = self.print(nest + 1, "")?;
            } else {
                per_line += self.put("  ")?;
            }
            per_line += self.put(format!("{} {}", fmt_num(v.x), fmt_num(v.y)))?;
        }

        let mut items = Vec::new();
        if !via.net_id.is_empty() {
            items.push(format!("(net {})", self.q(&via.net_id)));
        }
        if let Some(n) = via.via_number {
            items.push(format!("(via_number {})", n));
        }
        if let Some(t) = via.via_type {
            items.push(format!("(type {})", t));
        }
        match via.attr {
            Some(ViaAttr::VirtualPin) => {
                items.push(format!("(attr virtual_pin {})", self.q(&via.virtual_pin_name)));
            }
            Some(a) => items.push(format!("(attr {})", a)),
            None => (),
        }
        if via.supply {
            items.push("(supply)".into());
        }
        if !items.is_empty() {
            self.put(" ")?;
        }
        for item in items {
            if per_line > LIST_MARGIN {
                self.put("\n")?;
                per_line = self.print(nest + 1, "")?;
            }
            per_line += self.put(item)?;
        }

        if via.contact_layers.is_empty() {
            self.put(")")?;
        } else {
            self.put("\n")?;
            self.print(nest + 1, "(contact\n")?;
            for layer in via.contact_layers.iter() {
                self.print(nest + 2, format!("{}\n", self.q(layer)))?;
            }
            self.print(nest + 1, "))")?;
        }
        Ok(())
    }
    fn history_contents(&mut self, tree: &DsnTree, key: ElemKey, h: &History, nest: usize) -> DsnResult<()> {
        self.children(tree, key, nest)?;
        let txt = format!("(self ({} {})\n", DsnKey::CreatedTime, fmt_time(&h.time_stamp));
        self.print(nest, txt)?;
        for c in h.comments.iter() {
            self.print(nest + 1, format!("(comment {})\n", self.q(c)))?;
        }
        self.print(nest, ")\n")?;
        Ok(())
    }
    fn was_is_contents(&mut self, w: &WasIs, nest: usize) -> DsnResult<()> {
        for pair in w.pin_pairs.iter() {
            self.print(nest, "(pins ")?;
            self.pin_ref(&pair.was)?;
            self.put(" ")?;
            self.pin_ref(&pair.is)?;
            self.put(")\n")?;
        }
        Ok(())
    }
    fn routes_contents(&mut self, tree: &DsnTree, key: ElemKey, nest: usize) -> DsnResult<()> {
        self.kids(tree, key, &[DsnKey::Resolution], nest)?;
        self.kids(tree, key, &[DsnKey::Parser], nest)?;
        self.kids(tree, key, &[DsnKey::StructureOut], nest)?;
        self.kids(tree, key, &[DsnKey::LibraryOut], nest)?;
        let nets = tree.children_tagged(key, DsnKey::Net);
        if !nets.is_empty() {
            self.print(nest, format!("({}\n", DsnKey::NetworkOut))?;
            for n in nets {
                self.format(tree, n, nest + 1)?;
            }
            self.print(nest, ")\n")?;
        }
        Ok(())
    }
    /// Write a supply pin. A single pin reference is written on one line, several across lines.
    fn supply_pin(&mut self, tag: DsnKey, s: &SupplyPin, nest: usize) -> DsnResult<()> {
        let single_line = s.pin_refs.len() <= 1;
        self.print(nest, format!("({}", tag))?;
        if single_line {
            if let Some(pin) = s.pin_refs.first() {
                self.put(" ")?;
                self.pin_ref(pin)?;
            }
            if !s.net_id.is_empty() {
                self.put(format!(" (net {})", self.q(&s.net_id)))?;
            }
            self.put(")")?;
        } else {
            self.put("\n")?;
            for pin in s.pin_refs.iter() {
                self.print(nest + 1, "")?;
                self.pin_ref(pin)?;
                self.put("\n")?;
            }
            if !s.net_id.is_empty() {
                self.print(nest + 1, format!(" (net {})\n", self.q(&s.net_id)))?;
            }
            self.print(nest, ")")?;
        }
        Ok(())
    }
}

/// Boolean indication of whether `s` must be quoted with quote-character `quote`.
/// Empty strings, strings which could be read as comments,
/// and strings holding whitespace, delimiters, the quote character,
/// or a dash past their first character are quoted.
pub fn needs_quotes(s: &str, quote: char) -> bool {
    if s.is_empty() || s.starts_with('#') {
        return true;
    }
    s.chars().enumerate().any(|(i, c)| {
        c.is_whitespace() || "(){}%".contains(c) || c == quote || (i > 0 && c == '-')
    })
}
/// Format a time stamp as `Mon DD HH : MM : SS YYYY`
fn fmt_time(t: &chrono::NaiveDateTime) -> String {
    t.format("%b %d %H : %M : %S %Y").to_string()
}
/// Get node `key`, or fail
fn node(tree: &DsnTree, key: ElemKey) -> DsnResult<&Node> {
    tree.get(key)
        .ok_or_else(|| DsnError::Str(format!("Invalid element key {:?}", key)))
}
