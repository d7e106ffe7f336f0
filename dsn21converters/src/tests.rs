use super::*;
use dsn21::{DsnKey, DsnTree, Elem, ElemKey, PinRef};
use dsn21utils::{ErrorContext, SerdeFile, SerializationFormat::Yaml};

/// Grab the full path of resource-file `fname`
fn resource(fname: &str) -> String {
    format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), fname)
}
fn blinky() -> ConvResult<Board> {
    Ok(Board::load(resource("board.yaml"))?)
}
fn routed_session() -> ConvResult<String> {
    Ok(std::fs::read_to_string(resource("routed.ses"))?)
}
/// Get the names of the `tag`-tagged children of `key`
fn names(tree: &DsnTree, key: ElemKey, tag: DsnKey) -> Vec<String> {
    tree.children_tagged(key, tag)
        .into_iter()
        .filter_map(|k| match tree.elem(k) {
            Some(Elem::Image(i)) => Some(i.image_id.clone()),
            Some(Elem::Padstack(p)) => Some(p.padstack_id.clone()),
            Some(Elem::Component(c)) => Some(c.image_id.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn it_exports_the_board() -> ConvResult<()> {
    let board = blinky()?;
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let root = tree.root;
    let library = tree.child_tagged(root, DsnKey::Library).ok_or("No library")?;

    // The two resistors share a single image
    assert_eq!(
        names(&tree, library, DsnKey::Image),
        vec!["Resistor_SMD:R_0603_1608Metric", "Connector:PinHeader_1x02"]
    );
    assert_eq!(
        names(&tree, library, DsnKey::Padstack),
        vec![
            "Rect[T]Pad_800x950_um",
            "Rect[A]Pad_1700x1700_um",
            "Round[A]Pad_1700_um",
            "Via[0-1]_600:300_um",
        ]
    );
    // Pads precede the via boundary, and the board's via merged into the default via
    let lib = tree.elem(library).and_then(Elem::as_library).ok_or("No library")?;
    assert_eq!(lib.via_start_index, Some(3));

    let placement = tree.child_tagged(root, DsnKey::Placement).ok_or("No placement")?;
    let components = tree.children_tagged(placement, DsnKey::Component);
    assert_eq!(components.len(), 2);
    assert_eq!(tree.children_tagged(components[0], DsnKey::Place).len(), 2);

    let txt = dsn21::to_string(&tree)?;
    assert!(txt.starts_with("(pcb blinky\n  (parser\n"));
    assert!(txt.contains("(place R1 10000 -10000 front 0)"));
    assert!(txt.contains("(place R2 20000 -10000 back 270)"));
    assert!(txt.contains("(place J1 30000 -10000 front 0 (lock_type position))"));
    assert!(txt.contains("(via \"Via[0-1]_600:300_um\")"));
    assert!(txt.contains("(pins R1-1 J1-2)"));
    assert!(txt.contains("(use_via \"Via[0-1]_600:300_um\")"));
    assert!(txt.contains("(clearance 200.1)"));
    assert!(txt.contains("(clearance 50.1 (type smd_smd))"));
    assert!(txt.contains("(path F.Cu 250  9175 -10000  15000 -10000)"));
    assert!(txt.contains("(via \"Via[0-1]_600:300_um\"  15000 -10000 (net GND)(type protect))"));

    // And the written design reads back
    let readback = dsn21::parse_design_str(&txt)?;
    let library = readback.child_tagged(readback.root, DsnKey::Library).ok_or("No library")?;
    assert_eq!(readback.children_tagged(library, DsnKey::Padstack).len(), 4);
    Ok(())
}
#[test]
fn it_closes_the_boundary() -> ConvResult<()> {
    let board = blinky()?;
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let structure = tree.child_tagged(tree.root, DsnKey::Structure).ok_or("No structure")?;
    let boundary = tree.child_tagged(structure, DsnKey::Boundary).ok_or("No boundary")?;
    let path = tree.child_tagged(boundary, DsnKey::Path).ok_or("No path")?;
    let path = tree.elem(path).and_then(Elem::as_path).ok_or("No path")?;
    assert_eq!(path.layer_id, "pcb");
    assert_eq!(path.points.len(), 5);
    assert_eq!(path.points.first(), path.points.last());
    assert_eq!(path.points[2], dsn21::DsnPoint::new(40000, -20000));
    Ok(())
}
#[test]
fn it_bounds_boards_without_outline() -> ConvResult<()> {
    let mut board = blinky()?;
    board.outline.clear();
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let structure = tree.child_tagged(tree.root, DsnKey::Structure).ok_or("No structure")?;
    let boundary = tree.child_tagged(structure, DsnKey::Boundary).ok_or("No boundary")?;
    let rect = tree.child_tagged(boundary, DsnKey::Rect).ok_or("No rect")?;
    let rect = tree.elem(rect).and_then(Elem::as_rect).ok_or("No rect")?;
    assert_eq!(rect.point0, dsn21::DsnPoint::new(9175, -10000));
    assert_eq!(rect.point1, dsn21::DsnPoint::new(30000, -10000));
    Ok(())
}
#[test]
fn it_skips_unconnectable_pads() -> ConvResult<()> {
    let mut board = blinky()?;
    board.footprints[2].pads[1].number.clear();
    board.footprints[2].pads[0].layers.clear();
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let library = tree.child_tagged(tree.root, DsnKey::Library).ok_or("No library")?;
    let images = tree.children_tagged(library, DsnKey::Image);
    assert_eq!(tree.children_tagged(images[1], DsnKey::Pin).len(), 0);
    assert_eq!(
        names(&tree, library, DsnKey::Padstack),
        vec!["Rect[T]Pad_800x950_um", "Via[0-1]_600:300_um"]
    );

    // Neither pad is referenced by its net
    let txt = dsn21::to_string(&tree)?;
    assert!(!txt.contains("J1-1"));
    assert!(!txt.contains("J1-2"));
    assert!(txt.contains("(pins R2-2)"));
    Ok(())
}
#[test]
fn it_fails_on_oversized_drills() -> ConvResult<()> {
    let mut board = blinky()?;
    board.footprints[2].pads[0].drill = 1_700_000;
    let err = DsnExporter::export(&board, &ExportOptions::default()).unwrap_err();
    match err {
        ConvError::Export { message, .. } => {
            assert_eq!(message, "Drill 1700000 does not fit pad size 1700000x1700000");
        }
        e => panic!("Unexpected error {:?}", e),
    }
    Ok(())
}
#[test]
fn it_renames_differing_footprints() -> ConvResult<()> {
    let mut board = blinky()?;
    board.footprints[1].pads[0].size = Point::new(900_000, 950_000);
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let library = tree.child_tagged(tree.root, DsnKey::Library).ok_or("No library")?;
    assert_eq!(
        names(&tree, library, DsnKey::Image),
        vec![
            "Resistor_SMD:R_0603_1608Metric",
            "Resistor_SMD:R_0603_1608Metric::1",
            "Connector:PinHeader_1x02"
        ]
    );
    let placement = tree.child_tagged(tree.root, DsnKey::Placement).ok_or("No placement")?;
    assert_eq!(
        names(&tree, placement, DsnKey::Component),
        vec![
            "Resistor_SMD:R_0603_1608Metric",
            "Resistor_SMD:R_0603_1608Metric::1",
            "Connector:PinHeader_1x02"
        ]
    );
    Ok(())
}
#[test]
fn it_fails_export_with_context() -> ConvResult<()> {
    let mut board = blinky()?;
    board.footprints[0].pads[0].layers = vec!["In1.Cu".into()];
    match DsnExporter::export(&board, &ExportOptions::default()) {
        Err(ConvError::Export { message, stack }) => {
            assert_eq!(message, "Unknown copper layer In1.Cu");
            assert_eq!(
                stack,
                vec![
                    ErrorContext::Board("blinky".into()),
                    ErrorContext::Footprint("R1".into()),
                    ErrorContext::Pad("1".into()),
                ]
            );
        }
        _ => panic!("Expected an export error"),
    }
    Ok(())
}
#[test]
fn it_exports_bytes() -> ConvResult<()> {
    let board = Board {
        name: "bare".into(),
        layers: vec!["F.Cu".into(), "B.Cu".into()],
        outline: vec![Point::new(0, 0), Point::new(1_000_000, 0), Point::new(1_000_000, 1_000_000)],
        ..Default::default()
    };
    let bytes = export_design(&board, &ExportOptions::default())?;
    let txt = String::from_utf8(bytes).map_err(|e| ConvError::Boxed(Box::new(e)))?;
    assert!(txt.contains("(resolution um 10)"));
    assert!(txt.contains("(unit um)"));
    assert!(!txt.contains("(network"));
    assert!(!txt.contains("(wiring"));
    Ok(())
}
#[test]
fn it_imports_sessions() -> ConvResult<()> {
    let board = blinky()?;
    let src = routed_session()?;
    let update = import_session(src.as_bytes(), &board, &ImportOptions::default())?;

    assert_eq!(update.placements.len(), 3);
    assert_eq!(
        update.placements[1],
        PlacementUpdate {
            reference: "R2".into(),
            position: Point::new(25_000_000, 10_000_000),
            rotation: 90.0,
            side: BoardSide::Back,
        }
    );
    assert_eq!(
        update.pin_swaps,
        vec![dsn21::PinPair {
            was: PinRef::new("R1", "1"),
            is: PinRef::new("R1", "2"),
        }]
    );

    assert_eq!(update.routes.len(), 2);
    let gnd = &update.routes[0];
    assert_eq!(gnd.net, "GND");
    assert_eq!(gnd.tracks.len(), 2);
    assert_eq!(
        gnd.tracks[1],
        Track {
            net: "GND".into(),
            layer: "F.Cu".into(),
            width: 250_000,
            start: Point::new(12_000_000, 10_000_000),
            end: Point::new(15_000_000, 10_000_000),
            locked: false,
        }
    );
    assert_eq!(
        gnd.vias,
        vec![BoardVia {
            net: "GND".into(),
            position: Point::new(15_000_000, 10_000_000),
            diameter: 600_000,
            drill: 300_000,
            top: "F.Cu".into(),
            bottom: "B.Cu".into(),
            locked: true,
        }]
    );
    // The polygon wire is skipped
    let vcc = &update.routes[1];
    assert_eq!(vcc.tracks.len(), 1);
    assert!(vcc.tracks[0].locked);
    assert_eq!(vcc.tracks[0].layer, "B.Cu");
    Ok(())
}
#[test]
fn it_fails_import_on_unknown_nets() -> ConvResult<()> {
    let board = blinky()?;
    let src = routed_session()?.replace("(net /VCC", "(net /NOPE");
    match import_session(src.as_bytes(), &board, &ImportOptions::default()) {
        Err(ConvError::Import { message, stack }) => {
            assert_eq!(message, "Net /NOPE not found on board");
            assert_eq!(stack.last(), Some(&ErrorContext::Net("/NOPE".into())));
        }
        _ => panic!("Expected an import error"),
    }
    Ok(())
}
#[test]
fn it_fails_import_on_unknown_footprints() -> ConvResult<()> {
    let board = blinky()?;
    let src = routed_session()?.replace("(place J1", "(place J9");
    let result = import_session(src.as_bytes(), &board, &ImportOptions::default());
    assert!(matches!(result, Err(ConvError::Import { .. })));
    Ok(())
}
#[test]
fn it_fails_import_on_bad_syntax() -> ConvResult<()> {
    let board = blinky()?;
    let src = routed_session()?;
    let truncated = &src[..src.len() / 2];
    match import_session(truncated.as_bytes(), &board, &ImportOptions::default()) {
        Err(ConvError::Dsn(e)) => assert!(e.is_syntax()),
        _ => panic!("Expected a syntax error"),
    }
    Ok(())
}
#[test]
fn it_applies_updates() -> ConvResult<()> {
    let mut board = blinky()?;
    let src = routed_session()?;
    let update = import_session(src.as_bytes(), &board, &ImportOptions::default())?;
    board.apply(&update)?;

    let r2 = board.footprint("R2").ok_or("No R2")?;
    assert_eq!(r2.position, Point::new(25_000_000, 10_000_000));
    assert_eq!(r2.rotation, 90.0);
    assert_eq!(board.tracks.iter().filter(|t| t.net == "GND").count(), 2);
    assert_eq!(board.tracks.iter().filter(|t| t.net == "/VCC").count(), 1);
    assert_eq!(board.vias.len(), 1);

    // Re-exporting carries the session's placement
    let tree = DsnExporter::export(&board, &ExportOptions::default())?;
    let txt = dsn21::to_string(&tree)?;
    assert!(txt.contains("(place R2 25000 -10000 back 270)"));
    Ok(())
}
#[test]
fn it_rejects_updates_for_unknown_footprints() -> ConvResult<()> {
    let mut board = blinky()?;
    let update = SessionUpdate {
        placements: vec![PlacementUpdate {
            reference: "U1".into(),
            position: Point::default(),
            rotation: 0.0,
            side: BoardSide::Front,
        }],
        ..Default::default()
    };
    let before = board.clone();
    assert!(board.apply(&update).is_err());
    assert_eq!(board, before);
    Ok(())
}
#[test]
fn it_roundtrips_options_through_yaml() -> ConvResult<()> {
    let options = ExportOptions {
        track_width: 200_000,
        host_cad: "My CAD".into(),
        ..Default::default()
    };
    let txt = Yaml.to_string(&options)?;
    let readback: ExportOptions = Yaml.from_str(&txt)?;
    assert_eq!(readback, options);

    // Absent fields take their defaults
    let partial: ExportOptions = Yaml.from_str("---\nclearance: 150000\n")?;
    assert_eq!(partial.clearance, 150_000);
    assert_eq!(partial.via_diameter, ExportOptions::default().via_diameter);

    // Loading infers the format from the file extension
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("import.yaml");
    let import = ImportOptions {
        default_via_drill: 400_000,
    };
    import.save(Yaml, &path)?;
    assert_eq!(ImportOptions::load(&path)?, import);
    Ok(())
}
