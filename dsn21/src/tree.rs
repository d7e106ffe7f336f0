//!
//! # DSN Element Tree
//!
//! Arena-allocated tree of DSN constructs.
//! Nodes live in a [SlotMap], addressed by [ElemKey].
//! Each node holds its grammar tag, a payload [Elem], its ordered children, and a non-owning parent key.
//!

// Crates.io Imports
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

// Local imports
use crate::data::*;

new_key_type! {
    /// Keys into a [DsnTree]
    pub struct ElemKey;
}

/// # Tree Node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Grammar keyword the node is written with
    pub tag: DsnKey,
    /// Containing node. `None` for the root and for detached nodes.
    pub parent: Option<ElemKey>,
    /// Ordered children
    pub children: Vec<ElemKey>,
    /// Payload
    pub elem: Elem,
}

/// # DSN Element Tree
///
/// Owns every node of a single board-design or session document.
///
/// Nodes may be created detached from the tree (see [DsnTree::insert_detached]),
/// e.g. as candidates for deduplication, and later attached with [DsnTree::append].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsnTree {
    pub nodes: SlotMap<ElemKey, Node>,
    pub root: ElemKey,
    /// Encoding the source text was read in, and that [crate::save] writes
    #[serde(default)]
    pub encoding: Encoding,
}
impl DsnTree {
    /// Create a new tree, with a root node of `tag` and `elem`
    pub fn new(tag: DsnKey, elem: impl Into<Elem>) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            tag,
            parent: None,
            children: Vec::new(),
            elem: elem.into(),
        });
        Self {
            nodes,
            root,
            encoding: Encoding::default(),
        }
    }
    /// Create a new board-design tree, rooted at a `pcb` node named `name`
    pub fn design(name: impl Into<String>) -> Self {
        Self::new(DsnKey::Pcb, Pcb { name: name.into() })
    }
    /// Create a new session tree
    pub fn session(id: impl Into<String>, base_design: impl Into<String>) -> Self {
        let session = Session {
            id: id.into(),
            base_design: base_design.into(),
        };
        Self::new(DsnKey::Session, session)
    }
    /// Get a reference to node `key`, if it exists
    pub fn get(&self, key: ElemKey) -> Option<&Node> {
        self.nodes.get(key)
    }
    /// Get a mutable reference to node `key`, if it exists
    pub fn get_mut(&mut self, key: ElemKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }
    /// Boolean indication of whether `key` is a live node
    pub fn contains(&self, key: ElemKey) -> bool {
        self.nodes.contains_key(key)
    }
    /// Number of live nodes, attached or detached
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    /// Grammar tag of node `key`
    pub fn tag(&self, key: ElemKey) -> Option<DsnKey> {
        self.get(key).map(|n| n.tag)
    }
    /// Payload of node `key`
    pub fn elem(&self, key: ElemKey) -> Option<&Elem> {
        self.get(key).map(|n| &n.elem)
    }
    /// Mutable payload of node `key`
    pub fn elem_mut(&mut self, key: ElemKey) -> Option<&mut Elem> {
        self.get_mut(key).map(|n| &mut n.elem)
    }
    /// Parent of node `key`
    pub fn parent(&self, key: ElemKey) -> Option<ElemKey> {
        self.get(key).and_then(|n| n.parent)
    }
    /// Children of node `key`, in insertion order
    pub fn children(&self, key: ElemKey) -> &[ElemKey] {
        match self.get(key) {
            Some(n) => &n.children,
            None => &[],
        }
    }
    /// Create a new node and append it as the last child of `parent`
    pub fn add_child(&mut self, parent: ElemKey, tag: DsnKey, elem: impl Into<Elem>) -> ElemKey {
        let key = self.insert_detached(tag, elem);
        self.append(parent, key);
        key
    }
    /// Create a new node with no parent
    pub fn insert_detached(&mut self, tag: DsnKey, elem: impl Into<Elem>) -> ElemKey {
        self.nodes.insert(Node {
            tag,
            parent: None,
            children: Vec::new(),
            elem: elem.into(),
        })
    }
    /// Append node `child` to the children of `parent`.
    /// If `child` has a parent, it is first removed from that parent's children.
    pub fn append(&mut self, parent: ElemKey, child: ElemKey) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return;
        }
        self.detach(child);
        if let Some(n) = self.nodes.get_mut(child) {
            n.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
    }
    /// Move `child` into `new_parent`. Alias for [DsnTree::append].
    pub fn reparent(&mut self, child: ElemKey, new_parent: ElemKey) {
        self.append(new_parent, child)
    }
    /// Remove `key` from its parent's children, leaving it in the arena with no parent
    pub fn detach(&mut self, key: ElemKey) {
        let parent = match self.nodes.get_mut(key) {
            Some(n) => n.parent.take(),
            None => return,
        };
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != key);
        }
    }
    /// Remove node `key` and its entire subtree from the arena
    pub fn remove(&mut self, key: ElemKey) {
        self.detach(key);
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(n) = self.nodes.remove(k) {
                stack.extend(n.children);
            }
        }
    }
    /// Replace node `old` with `new` in its parent's children, at the same position.
    /// The subtree of `old` is removed.
    pub fn replace(&mut self, old: ElemKey, new: ElemKey) {
        if old == new || !self.contains(new) {
            return;
        }
        self.detach(new);
        let parent = self.parent(old);
        if let Some(p) = parent {
            if let Some(pnode) = self.nodes.get_mut(p) {
                for c in pnode.children.iter_mut() {
                    if *c == old {
                        *c = new;
                    }
                }
            }
            if let Some(n) = self.nodes.get_mut(old) {
                n.parent = None;
            }
            if let Some(n) = self.nodes.get_mut(new) {
                n.parent = Some(p);
            }
        }
        if old == self.root {
            self.root = new;
        }
        self.remove(old);
    }
    /// First child of `key` with tag `tag`
    pub fn child_tagged(&self, key: ElemKey, tag: DsnKey) -> Option<ElemKey> {
        self.children(key)
            .iter()
            .copied()
            .find(|c| self.tag(*c) == Some(tag))
    }
    /// All children of `key` with tag `tag`, in insertion order
    pub fn children_tagged(&self, key: ElemKey, tag: DsnKey) -> Vec<ElemKey> {
        self.children_tagged_any(key, &[tag])
    }
    /// All children of `key` with any of `tags`, in insertion order
    pub fn children_tagged_any(&self, key: ElemKey, tags: &[DsnKey]) -> Vec<ElemKey> {
        self.children(key)
            .iter()
            .copied()
            .filter(|c| self.tag(*c).map_or(false, |t| tags.contains(&t)))
            .collect()
    }
    /// Children of `key` in canonical order.
    /// Sorted by their tag's group in [child_order], stably, so that same-group children keep their insertion order.
    /// Tags outside the table sort last.
    pub fn ordered_children(&self, key: ElemKey) -> Vec<ElemKey> {
        let kind = match self.get(key) {
            Some(n) => n.elem.kind(),
            None => return Vec::new(),
        };
        let order = child_order(kind);
        let rank = |c: &ElemKey| -> usize {
            let tag = match self.tag(*c) {
                Some(t) => t,
                None => return order.len(),
            };
            order
                .iter()
                .position(|group| group.contains(&tag))
                .unwrap_or(order.len())
        };
        let mut children = self.children(key).to_vec();
        children.sort_by_key(rank);
        children
    }
    /// Resolve the unit scope of node `key`.
    ///
    /// Walks from `key` through its ancestors.
    /// At each level a `unit`-tagged child takes precedence over a `resolution`-tagged one.
    /// If no declaration exists anywhere, returns the default of inch and 2,540,000.
    pub fn units(&self, key: ElemKey) -> UnitRes {
        let mut current = Some(key);
        while let Some(k) = current {
            for tag in [DsnKey::Unit, DsnKey::Resolution] {
                let found = self
                    .child_tagged(k, tag)
                    .and_then(|c| self.elem(c))
                    .and_then(Elem::as_unit_res);
                if let Some(u) = found {
                    return u.clone();
                }
            }
            current = self.parent(k);
        }
        UnitRes::default()
    }
    /// Structural equality of node `a` in `self` and node `b` in `other`.
    /// Compares tags, payloads, and children in canonical order, recursively.
    /// Independent of arena keys and insertion order.
    pub fn same_structure(&self, a: ElemKey, other: &DsnTree, b: ElemKey) -> bool {
        let (na, nb) = match (self.get(a), other.get(b)) {
            (Some(na), Some(nb)) => (na, nb),
            _ => return false,
        };
        if na.tag != nb.tag || na.elem != nb.elem || na.children.len() != nb.children.len() {
            return false;
        }
        let ca = self.ordered_children(a);
        let cb = other.ordered_children(b);
        ca.iter()
            .zip(cb.iter())
            .all(|(x, y)| self.same_structure(*x, other, *y))
    }
    /// Walk up from `key` to the nearest ancestor (or self) tagged `tag`
    pub fn ancestor_tagged(&self, key: ElemKey, tag: DsnKey) -> Option<ElemKey> {
        let mut current = Some(key);
        while let Some(k) = current {
            if self.tag(k) == Some(tag) {
                return Some(k);
            }
            current = self.parent(k);
        }
        None
    }
    /// Get the `tag`-tagged child of `parent`, creating it with `elem` if none exists
    pub fn child_or_insert(&mut self, parent: ElemKey, tag: DsnKey, elem: impl Into<Elem>) -> ElemKey {
        match self.child_tagged(parent, tag) {
            Some(k) => k,
            None => self.add_child(parent, tag, elem),
        }
    }
}
impl std::ops::Index<ElemKey> for DsnTree {
    type Output = Node;
    fn index(&self, key: ElemKey) -> &Node {
        &self.nodes[key]
    }
}
impl std::ops::IndexMut<ElemKey> for DsnTree {
    fn index_mut(&mut self, key: ElemKey) -> &mut Node {
        &mut self.nodes[key]
    }
}

/// Tags which may hold a node's unit scope
const UNITS: &[DsnKey] = &[DsnKey::Unit, DsnKey::Resolution];

/// # Canonical Child Order
///
/// For each [ElemKind], the ordered groups of child tags it may contain.
/// Children are written, and compared, group by group.
pub fn child_order(kind: ElemKind) -> &'static [&'static [DsnKey]] {
    use DsnKey::*;
    match kind {
        ElemKind::Pcb => &[
            &[Parser],
            &[Resolution],
            &[Unit],
            &[Structure],
            &[Placement],
            &[Library],
            &[Network],
            &[Wiring],
        ],
        ElemKind::Session => &[&[History], &[Structure], &[Placement], &[WasIs], &[Routes]],
        ElemKind::Route => &[
            &[Resolution],
            &[Parser],
            &[StructureOut],
            &[LibraryOut],
            &[Net],
        ],
        ElemKind::Structure => &[
            UNITS,
            &[Layer],
            &[LayerNoiseWeight],
            &[Boundary],
            &[PlaceBoundary],
            &[Plane],
            &[Region],
            &[
                Keepout,
                PlaceKeepout,
                ViaKeepout,
                WireKeepout,
                BendKeepout,
                ElongateKeepout,
            ],
            &[Via],
            &[Control],
            &[SnapAngle],
            &[Rule],
            &[PlaceRule],
            &[Grid],
        ],
        ElemKind::Layer => &[&[Rule]],
        ElemKind::LayerNoiseWeight => &[&[LayerPair]],
        ElemKind::Boundary => &[&[Rect, Path]],
        ElemKind::Window => &[&DsnKey::SHAPES],
        ElemKind::Keepout => &[&DsnKey::SHAPES, &[Rule], &[PlaceRule], &[Window]],
        ElemKind::Control => &[&DsnKey::CONTROL_PROPS],
        ElemKind::Region => &[
            &[Rect, Polygon],
            &[RegionNet, RegionClass, RegionClassClass],
            &[Rule],
        ],
        ElemKind::ClassClass => &[&[Classes], &[Rule, LayerRule]],
        ElemKind::LayerRule => &[&[Rule]],
        ElemKind::Placement => &[UNITS, &[Component]],
        ElemKind::Component => &[&[Place]],
        ElemKind::Place => &[&[PlaceRule], &[Rule], &[Region]],
        ElemKind::Library => &[UNITS, &[Image], &[Padstack]],
        ElemKind::Image => &[
            UNITS,
            &[Outline],
            &[Pin],
            &[Rule],
            &[PlaceRule],
            &DsnKey::KEEPOUTS,
        ],
        ElemKind::Shape => &[&DsnKey::SHAPES, &[Window]],
        ElemKind::Padstack => &[UNITS, &[Shape], &[Rule]],
        ElemKind::Network => &[&[Net], &[Class]],
        ElemKind::Net => &[&[CompOrder], &[Rule], &[LayerRule], &[Fromto]],
        ElemKind::Class => &[&[Rule], &[LayerRule], &[Topology]],
        ElemKind::Topology => &[&[Fromto], &[CompOrder]],
        ElemKind::Fromto => &[&[Rule, LayerRule]],
        ElemKind::Wiring => &[UNITS, &[Wire], &[Via]],
        ElemKind::Wire => &[&DsnKey::SHAPES, &[Window], &[Connect]],
        ElemKind::History => &[&[Ancestor]],
        ElemKind::NetOut => &[&[Rule], &[Wire], &[Via], &[SupplyPin]],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_moves_children() {
        let mut tree = DsnTree::design("board");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let net = tree.add_child(root, DsnKey::Network, Elem::Network);
        let ps = tree.add_child(lib, DsnKey::Padstack, Padstack::default());
        assert_eq!(tree.parent(ps), Some(lib));

        tree.reparent(ps, net);
        assert_eq!(tree.parent(ps), Some(net));
        assert!(tree.children(lib).is_empty());
        assert_eq!(tree.children(net), &[ps]);
    }
    #[test]
    fn it_removes_subtrees() {
        let mut tree = DsnTree::design("board");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let ps = tree.add_child(lib, DsnKey::Padstack, Padstack::default());
        let shape = tree.add_child(ps, DsnKey::Shape, Shape::default());
        assert_eq!(tree.len(), 4);
        tree.remove(lib);
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(shape));
        assert!(tree.children(root).is_empty());
    }
    #[test]
    fn it_replaces_in_place() {
        let mut tree = DsnTree::design("board");
        let root = tree.root;
        let a = tree.add_child(root, DsnKey::Resolution, UnitRes::default());
        let b = tree.add_child(root, DsnKey::Unit, UnitRes::unit(DsnUnits::Mil));
        let c = tree.insert_detached(DsnKey::Resolution, UnitRes::resolution(DsnUnits::Um, 10));
        tree.replace(a, c);
        assert_eq!(tree.children(root), &[c, b]);
        assert_eq!(tree.parent(c), Some(root));
        assert!(!tree.contains(a));
    }
    #[test]
    fn it_inherits_units() {
        let mut tree = DsnTree::design("board");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let ps = tree.add_child(lib, DsnKey::Padstack, Padstack::default());

        // Nothing declared anywhere
        assert_eq!(tree.units(ps), UnitRes::default());
        assert_eq!(tree.units(ps).value, 2_540_000);

        // Resolution at the root
        tree.add_child(root, DsnKey::Resolution, UnitRes::resolution(DsnUnits::Mil, 10));
        assert_eq!(tree.units(ps), UnitRes::resolution(DsnUnits::Mil, 10));

        // Unit on the library wins over the root's resolution
        tree.add_child(lib, DsnKey::Unit, UnitRes::unit(DsnUnits::Um));
        assert_eq!(tree.units(ps), UnitRes::unit(DsnUnits::Um));

        // And the padstack's own declaration wins over its ancestors
        tree.add_child(ps, DsnKey::Unit, UnitRes::unit(DsnUnits::Mm));
        assert_eq!(tree.units(ps).units, DsnUnits::Mm);
    }
    #[test]
    fn it_compares_structure_in_canonical_order() {
        let build = |flip: bool| {
            let mut tree = DsnTree::design("board");
            let root = tree.root;
            let lib = tree.add_child(root, DsnKey::Library, Library::default());
            let add_ps = |tree: &mut DsnTree| {
                tree.add_child(lib, DsnKey::Padstack, Padstack::default());
            };
            let add_img = |tree: &mut DsnTree| {
                tree.add_child(lib, DsnKey::Image, Image::default());
            };
            if flip {
                add_ps(&mut tree);
                add_img(&mut tree);
            } else {
                add_img(&mut tree);
                add_ps(&mut tree);
            }
            tree
        };
        let (a, b) = (build(false), build(true));
        assert!(a.same_structure(a.root, &b, b.root));

        let mut c = build(false);
        let lib = c.children(c.root)[0];
        c.add_child(lib, DsnKey::Unit, UnitRes::unit(DsnUnits::Mm));
        assert!(!a.same_structure(a.root, &c, c.root));
    }
}
