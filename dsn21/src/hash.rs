//!
//! # Canonical Hashing & Library Catalogs
//!
//! Padstacks and images are deduplicated by a content hash:
//! their contents, as written, with whitespace and parentheses stripped.
//! Names and outer wrappers are excluded, so two padstacks with equal geometry under different names hash equal.
//!
//! The hash only sees what the writer emits.
//! Fields which are never written, e.g. a padstack's `via_id` while `attach` is off, do not participate.
//!

// Crates.io Imports
use tracing::debug;

// Local imports
use crate::data::*;
use crate::tree::{DsnTree, ElemKey};
use crate::write::{active_quote, DsnWriter};
use crate::DsnResult;

/// Get the canonical hash of node `key`
pub fn hash(tree: &DsnTree, key: ElemKey) -> DsnResult<String> {
    let mut buf = Vec::new();
    {
        let mut writer = DsnWriter::new(&mut buf).with_quote(active_quote(tree));
        writer.format_contents(tree, key, 0)?;
    }
    let txt = String::from_utf8(buf)?;
    Ok(txt
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect())
}

/// Find the first of `candidates` whose hash equals `target`
fn find_by_hash(tree: &DsnTree, candidates: &[ElemKey], target: &str) -> DsnResult<Option<ElemKey>> {
    for c in candidates.iter().copied() {
        if hash(tree, c)? == target {
            return Ok(Some(c));
        }
    }
    Ok(None)
}

/// Find a padstack of library `lib` equal in content to `candidate`
pub fn find_padstack(tree: &DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<Option<ElemKey>> {
    let target = hash(tree, candidate)?;
    let padstacks: Vec<ElemKey> = tree
        .children_tagged(lib, DsnKey::Padstack)
        .into_iter()
        .filter(|k| *k != candidate)
        .collect();
    find_by_hash(tree, &padstacks, &target)
}

/// Find a padstack equal to `candidate`, or add `candidate` to library `lib`.
/// A matched candidate is removed from the tree, and the existing padstack returned.
pub fn find_or_add_padstack(tree: &mut DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<ElemKey> {
    match find_padstack(tree, lib, candidate)? {
        Some(existing) => {
            debug!(?existing, "Reusing padstack");
            tree.remove(candidate);
            Ok(existing)
        }
        None => {
            tree.append(lib, candidate);
            Ok(candidate)
        }
    }
}

/// Mark the end of the pad padstacks of library `lib`.
/// Padstacks added afterward are vias.
pub fn set_via_boundary(tree: &mut DsnTree, lib: ElemKey) {
    let count = tree.children_tagged(lib, DsnKey::Padstack).len();
    if let Some(l) = tree.elem_mut(lib).and_then(Elem::as_library_mut) {
        l.via_start_index = Some(count);
    }
}

/// Find a via padstack of library `lib` equal in content to `candidate`.
/// Only padstacks past the via boundary are considered; none are before it is set.
pub fn find_via(tree: &DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<Option<ElemKey>> {
    let start = match tree
        .elem(lib)
        .and_then(Elem::as_library)
        .and_then(|l| l.via_start_index)
    {
        Some(s) => s,
        None => return Ok(None),
    };
    let target = hash(tree, candidate)?;
    let vias: Vec<ElemKey> = tree
        .children_tagged(lib, DsnKey::Padstack)
        .into_iter()
        .skip(start)
        .filter(|k| *k != candidate)
        .collect();
    find_by_hash(tree, &vias, &target)
}

/// Find a via equal to `candidate`, or append `candidate` to library `lib` as a new via
pub fn lookup_via(tree: &mut DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<ElemKey> {
    match find_via(tree, lib, candidate)? {
        Some(existing) => {
            tree.remove(candidate);
            Ok(existing)
        }
        None => {
            tree.append(lib, candidate);
            Ok(candidate)
        }
    }
}

/// Find an image of library `lib` equal in content to `candidate`
pub fn find_image(tree: &DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<Option<ElemKey>> {
    let target = hash(tree, candidate)?;
    let images: Vec<ElemKey> = tree
        .children_tagged(lib, DsnKey::Image)
        .into_iter()
        .filter(|k| *k != candidate)
        .collect();
    find_by_hash(tree, &images, &target)
}

/// Find an image equal to `candidate`, or append `candidate` to library `lib`.
///
/// Equal content under differing names still matches.
/// A new image whose name is already taken is renamed `name::N`,
/// where `N` counts the existing images of that name.
pub fn lookup_image(tree: &mut DsnTree, lib: ElemKey, candidate: ElemKey) -> DsnResult<ElemKey> {
    if let Some(existing) = find_image(tree, lib, candidate)? {
        tree.remove(candidate);
        return Ok(existing);
    }
    let base = tree
        .elem(candidate)
        .and_then(Elem::as_image)
        .map(|i| i.image_id.clone())
        .unwrap_or_default();
    let prefix = format!("{}::", base);
    let dups = tree
        .children_tagged(lib, DsnKey::Image)
        .into_iter()
        .filter_map(|k| tree.elem(k).and_then(Elem::as_image))
        .filter(|i| {
            i.image_id == base
                || i.image_id
                    .strip_prefix(&prefix)
                    .map_or(false, |n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .count();
    if dups > 0 {
        if let Some(image) = tree.elem_mut(candidate).and_then(Elem::as_image_mut) {
            image.image_id = format!("{}::{}", base, dups);
            debug!(image_id = %image.image_id, "Renamed duplicate image");
        }
    }
    tree.append(lib, candidate);
    Ok(candidate)
}

/// Find the component of `placement` placing image `image_id`, adding one if none exists
pub fn lookup_component(tree: &mut DsnTree, placement: ElemKey, image_id: &str) -> ElemKey {
    let found = tree
        .children_tagged(placement, DsnKey::Component)
        .into_iter()
        .find(|k| {
            tree.elem(*k)
                .and_then(Elem::as_component)
                .map_or(false, |c| c.image_id == image_id)
        });
    match found {
        Some(k) => k,
        None => tree.add_child(
            placement,
            DsnKey::Component,
            Component {
                image_id: image_id.to_string(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a detached round padstack named `name`
    fn round_pad(tree: &mut DsnTree, name: &str, diameter: f64) -> ElemKey {
        let ps = tree.insert_detached(
            DsnKey::Padstack,
            Padstack {
                padstack_id: name.into(),
                ..Default::default()
            },
        );
        let shape = tree.add_child(ps, DsnKey::Shape, Shape::default());
        let circle = Circle {
            layer_id: "F.Cu".into(),
            diameter,
            vertex: DsnPoint::default(),
        };
        tree.add_child(shape, DsnKey::Circle, circle);
        ps
    }

    #[test]
    fn it_hashes_contents_not_names() -> DsnResult<()> {
        let mut tree = DsnTree::design("b");
        let a = round_pad(&mut tree, "A", 600.0);
        let b = round_pad(&mut tree, "B", 600.0);
        let c = round_pad(&mut tree, "C", 800.0);
        assert_eq!(hash(&tree, a)?, hash(&tree, b)?);
        assert_ne!(hash(&tree, a)?, hash(&tree, c)?);
        assert_eq!(hash(&tree, a)?, "shapecircleF.Cu600attachoff");
        Ok(())
    }
    #[test]
    fn it_ignores_unwritten_fields() -> DsnResult<()> {
        let mut tree = DsnTree::design("b");
        let a = round_pad(&mut tree, "A", 600.0);
        let before = hash(&tree, a)?;
        if let Some(p) = tree.elem_mut(a).and_then(Elem::as_padstack_mut) {
            p.via_id = "V1".into();
        }
        assert_eq!(hash(&tree, a)?, before);
        if let Some(p) = tree.elem_mut(a).and_then(Elem::as_padstack_mut) {
            p.attach = true;
        }
        assert_ne!(hash(&tree, a)?, before);
        Ok(())
    }
    #[test]
    fn it_dedups_padstacks() -> DsnResult<()> {
        let mut tree = DsnTree::design("b");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let a = round_pad(&mut tree, "A", 600.0);
        assert_eq!(find_or_add_padstack(&mut tree, lib, a)?, a);
        let b = round_pad(&mut tree, "B", 600.0);
        assert_eq!(find_or_add_padstack(&mut tree, lib, b)?, a);
        assert!(!tree.contains(b));
        assert_eq!(tree.children_tagged(lib, DsnKey::Padstack).len(), 1);
        Ok(())
    }
    #[test]
    fn it_scopes_vias_past_the_boundary() -> DsnResult<()> {
        let mut tree = DsnTree::design("b");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let pad = round_pad(&mut tree, "Pad", 600.0);
        find_or_add_padstack(&mut tree, lib, pad)?;

        // Before the boundary is set, no vias exist
        let v = round_pad(&mut tree, "Via", 600.0);
        assert_eq!(find_via(&tree, lib, v)?, None);

        set_via_boundary(&mut tree, lib);
        // The equal pad padstack sits before the boundary, and is not a match
        assert_eq!(find_via(&tree, lib, v)?, None);
        assert_eq!(lookup_via(&mut tree, lib, v)?, v);
        let v2 = round_pad(&mut tree, "Via2", 600.0);
        assert_eq!(lookup_via(&mut tree, lib, v2)?, v);
        assert_eq!(tree.children_tagged(lib, DsnKey::Padstack), vec![pad, v]);
        Ok(())
    }
    #[test]
    fn it_renames_clashing_images() -> DsnResult<()> {
        let mut tree = DsnTree::design("b");
        let root = tree.root;
        let lib = tree.add_child(root, DsnKey::Library, Library::default());
        let image = |tree: &mut DsnTree, x: f64| {
            let img = tree.insert_detached(
                DsnKey::Image,
                Image {
                    image_id: "R0603".into(),
                    side: Side::Both,
                },
            );
            let pin = Pin {
                padstack_id: "P".into(),
                pin_id: "1".into(),
                vertex: DsnPoint::new(x, 0),
                ..Default::default()
            };
            tree.add_child(img, DsnKey::Pin, pin);
            img
        };
        let a = image(&mut tree, 0.0);
        let b = image(&mut tree, 10.0);
        let c = image(&mut tree, 20.0);
        let a2 = image(&mut tree, 0.0);
        assert_eq!(lookup_image(&mut tree, lib, a)?, a);
        assert_eq!(lookup_image(&mut tree, lib, b)?, b);
        assert_eq!(lookup_image(&mut tree, lib, c)?, c);
        assert_eq!(lookup_image(&mut tree, lib, a2)?, a);
        let ids: Vec<String> = tree
            .children_tagged(lib, DsnKey::Image)
            .into_iter()
            .filter_map(|k| tree.elem(k).and_then(Elem::as_image))
            .map(|i| i.image_id.clone())
            .collect();
        assert_eq!(ids, vec!["R0603", "R0603::1", "R0603::2"]);
        Ok(())
    }
    #[test]
    fn it_finds_or_adds_components() {
        let mut tree = DsnTree::design("b");
        let root = tree.root;
        let placement = tree.add_child(root, DsnKey::Placement, Placement::default());
        let a = lookup_component(&mut tree, placement, "R0603");
        let b = lookup_component(&mut tree, placement, "C0402");
        assert_ne!(a, b);
        assert_eq!(lookup_component(&mut tree, placement, "R0603"), a);
        assert_eq!(tree.children(placement).len(), 2);
    }
}
