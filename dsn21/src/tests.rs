use super::*;
use crate::utils::SerializationFormat::Json;

/// Helper function: Grab the full path of resource-file `fname`
fn resource(rname: &str) -> String {
    format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
}
/// Helper function: parse, write, and re-parse a design, checking the two trees are identical
fn check_design_roundtrip(tree: &DsnTree) -> DsnResult<String> {
    let txt = to_string(tree)?;
    let tree2 = parse_design_str(&txt)?;
    assert!(tree.same_structure(tree.root, &tree2, tree2.root));
    // And writing is a fixed point
    assert_eq!(to_string(&tree2)?, txt);
    Ok(txt)
}

#[test]
fn test_points() {
    assert_eq!(
        DsnPoint::new(1, 1) + DsnPoint::new(2, 2),
        DsnPoint::new(3, 3)
    );
    let mut p = DsnPoint::new(7, 8);
    p -= DsnPoint::new(5, 4);
    assert_eq!(p, DsnPoint::new(2, 4));
    assert_eq!(DsnPoint::new(-0.0, 5).x.to_bits(), 0.0f64.to_bits());
}
#[test]
fn it_parses_the_board() -> DsnResult<()> {
    let tree = parse_design_file(resource("board.dsn"))?;
    let root = tree.root;
    assert_eq!(tree[root].elem.as_pcb().map(|p| p.name.as_str()), Some("C:\\boards\\blinky.dsn"));

    let structure = tree.child_tagged(root, DsnKey::Structure).unwrap();
    assert_eq!(tree.children_tagged(structure, DsnKey::Layer).len(), 2);
    let b_cu = tree.children_tagged(structure, DsnKey::Layer)[1];
    let layer = tree[b_cu].elem.as_layer().unwrap();
    assert_eq!(layer.direction, Some(LayerDirection::Vertical));
    assert_eq!(layer.cost, Some(LayerCost::Level(CostLevel::High)));
    assert_eq!(layer.cost_type, Some(CostType::Length));

    let rule = tree.child_tagged(structure, DsnKey::Rule).unwrap();
    assert_eq!(
        tree[rule].elem.as_rule().unwrap().rules,
        vec![
            "(width 250)",
            "(clearance 200.1)",
            "(clearance 200.1 (type default_smd))",
            "(clearance 50 (type smd_smd))",
        ]
    );

    let library = tree.child_tagged(root, DsnKey::Library).unwrap();
    let padstacks = tree.children_tagged(library, DsnKey::Padstack);
    assert_eq!(padstacks.len(), 4);
    let via_800 = tree[padstacks[3]].elem.as_padstack().unwrap();
    assert!(via_800.attach);
    assert!(!via_800.rotate);
    assert_eq!(via_800.via_id, "Via[0-1]_600:300_um");

    let network = tree.child_tagged(root, DsnKey::Network).unwrap();
    let nets = tree.children_tagged(network, DsnKey::Net);
    let net = tree[nets[1]].elem.as_net().unwrap();
    assert_eq!(net.net_id, "Net-(D1-Pad1)");
    assert_eq!(net.pins, vec![PinRef::new("D1", "1"), PinRef::new("R2", "1")]);
    let class = tree.child_tagged(network, DsnKey::Class).unwrap();
    let class = tree[class].elem.as_class().unwrap();
    assert_eq!(class.net_ids, vec!["", "GND", "Net-(D1-Pad1)", "/VCC"]);
    assert_eq!(class.circuit, vec!["(use_via \"Via[0-1]_600:300_um\")"]);
    Ok(())
}
#[test]
fn it_roundtrips_the_board() -> DsnResult<()> {
    let tree = parse_design_file(resource("board.dsn"))?;
    let txt = check_design_roundtrip(&tree)?;
    assert!(txt.starts_with("(pcb C:\\boards\\blinky.dsn\n  (parser\n    (string_quote \")\n"));
    assert!(txt.contains("    (host_cad \"KiCad's Pcbnew\")\n"));
    assert!(txt.contains("    (layer B.Cu\n      (type signal)\n      (property \n        (index 1)\n      )\n      (direction vertical)\n      (cost high (type length))\n    )\n"));
    assert!(txt.contains("    (via \"Via[0-1]_600:300_um\" Via_800)\n"));
    assert!(txt.contains("      (place R1 30000 -40000 front 0 (PN 10k))\n"));
    assert!(txt.contains("    (image LED_SMD:LED_0603_1608Metric (side front)\n"));
    assert!(txt.contains("      (pin Rect[T]Pad_800x950_um (rotate 90) 1 -787.5 0)\n"));
    assert!(txt.contains("      (attach on (use_via \"Via[0-1]_600:300_um\"))(rotate off)\n"));
    assert!(txt.contains("    (net \"Net-(D1-Pad1)\" \n      (pins D1-1 R2-1)\n    )\n"));
    assert!(txt.contains("    (net /VCC (net_number 3)\n      (pins R1-1 R2-2)\n      (type fix)\n    )\n"));
    assert!(txt.contains("    (wire (path F.Cu 250  30825 -40000  50000 -40000)(net /VCC)(type protect))\n"));
    assert!(txt.contains("    (via \"Via[0-1]_600:300_um\"  40000 -40000 (net GND)(type route))\n"));
    Ok(())
}
#[test]
fn it_roundtrips_every_shape_kind() -> DsnResult<()> {
    let mut tree = DsnTree::design("shapes");
    let root = tree.root;
    let lib = tree.add_child(root, DsnKey::Library, Library::default());
    let ps = tree.add_child(lib, DsnKey::Padstack, PadstackBuilder::default().padstack_id("Mixed").build()?);
    let shapes: Vec<(DsnKey, Elem)> = vec![
        (
            DsnKey::Rect,
            Rect {
                layer_id: "F.Cu".into(),
                point0: DsnPoint::new(-400, -475),
                point1: DsnPoint::new(400, 475),
            }
            .into(),
        ),
        (
            DsnKey::Circle,
            Circle {
                layer_id: "B.Cu".into(),
                diameter: 600.0,
                vertex: DsnPoint::new(12.5, -3),
            }
            .into(),
        ),
        (
            DsnKey::Path,
            Path {
                layer_id: "F.Cu".into(),
                aperture_width: 800.0,
                points: vec![DsnPoint::new(-200, 0), DsnPoint::new(200, 0)],
                aperture_type: Aperture::Square,
            }
            .into(),
        ),
        (
            DsnKey::Qarc,
            Qarc {
                layer_id: "B.Cu".into(),
                aperture_width: 100.0,
                vertex: [DsnPoint::new(0, 500), DsnPoint::new(500, 0), DsnPoint::new(0, 0)],
            }
            .into(),
        ),
    ];
    for (tag, elem) in shapes {
        let shape = tree.add_child(ps, DsnKey::Shape, Shape::default());
        tree.add_child(shape, tag, elem);
    }
    let txt = check_design_roundtrip(&tree)?;
    assert!(txt.contains("(qarc B.Cu 100  0 500  500 0  0 0)"));
    assert!(txt.contains("(circle B.Cu 600 12.5 -3)"));
    Ok(())
}
#[test]
fn it_resolves_unit_scopes() -> DsnResult<()> {
    let tree = parse_design_file(resource("board.dsn"))?;
    let root = tree.root;
    let library = tree.child_tagged(root, DsnKey::Library).unwrap();
    let padstack = tree.children_tagged(library, DsnKey::Padstack)[0];
    // No unit in the library or padstack; the board-level `unit` wins over its `resolution`
    assert_eq!(tree.units(padstack), UnitRes::unit(DsnUnits::Um));
    // An empty tree falls back to the default resolution
    let empty = DsnTree::design("x");
    assert_eq!(empty.units(empty.root), UnitRes::resolution(DsnUnits::Inch, 2_540_000));
    Ok(())
}
#[test]
fn it_dedups_board_padstacks() -> DsnResult<()> {
    let mut tree = parse_design_file(resource("board.dsn"))?;
    let root = tree.root;
    let library = tree.child_tagged(root, DsnKey::Library).unwrap();
    let padstacks = tree.children_tagged(library, DsnKey::Padstack);

    // A copy of the first padstack, under a new name, matches it
    let candidate = tree.insert_detached(
        DsnKey::Padstack,
        PadstackBuilder::default().padstack_id("Copy").build()?,
    );
    let shape = tree.add_child(candidate, DsnKey::Shape, Shape::default());
    let points = vec![
        DsnPoint::new(-475, 500),
        DsnPoint::new(475, 500),
        DsnPoint::new(475, -500),
        DsnPoint::new(-475, -500),
        DsnPoint::new(-475, 500),
    ];
    let poly = Path {
        layer_id: "F.Cu".into(),
        aperture_width: 0.0,
        points,
        aperture_type: Aperture::Round,
    };
    tree.add_child(shape, DsnKey::Polygon, poly);
    assert_eq!(hash::find_or_add_padstack(&mut tree, library, candidate)?, padstacks[0]);
    assert!(!tree.contains(candidate));
    Ok(())
}
#[test]
fn it_wraps_long_paths() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let points: Vec<DsnPoint> = (0..40)
        .map(|i| DsnPoint::new(1000 * i, 2000.0 + (i % 2) as f64 * 125.5))
        .collect();
    let path = Path {
        layer_id: "F.Cu".into(),
        aperture_width: 250.0,
        points,
        aperture_type: Aperture::Round,
    };
    let k = tree.add_child(root, DsnKey::Path, path);
    let expected = concat!(
        "  (path F.Cu 250  0 2000  1000 2125.5  2000 2000  3000 2125.5  4000 2000\n",
        "            5000 2125.5  6000 2000  7000 2125.5  8000 2000  9000 2125.5\n",
        "            10000 2000  11000 2125.5  12000 2000  13000 2125.5  14000 2000\n",
        "            15000 2125.5  16000 2000  17000 2125.5  18000 2000  19000 2125.5\n",
        "            20000 2000  21000 2125.5  22000 2000  23000 2125.5  24000 2000\n",
        "            25000 2125.5  26000 2000  27000 2125.5  28000 2000  29000 2125.5\n",
        "            30000 2000  31000 2125.5  32000 2000  33000 2125.5  34000 2000\n",
        "            35000 2125.5  36000 2000  37000 2125.5  38000 2000  39000 2125.5)\n",
    );
    assert_eq!(format_node(&tree, k, 1)?, expected);
    Ok(())
}
#[test]
fn it_wraps_via_lists() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let via = Via {
        padstacks: (0..10).map(|i| format!("Via_{}_um", 600 + 100 * i)).collect(),
        spares: vec!["Via_spare".into()],
    };
    let k = tree.add_child(root, DsnKey::Via, via);
    let expected = concat!(
        "  (via Via_600_um Via_700_um Via_800_um Via_900_um Via_1000_um Via_1100_um Via_1200_um\n",
        "     Via_1300_um Via_1400_um Via_1500_um\n",
        "    (spare Via_spare))\n",
    );
    assert_eq!(format_node(&tree, k, 1)?, expected);
    Ok(())
}
#[test]
fn it_writes_places() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let single = PlaceBuilder::default()
        .component_id("R1")
        .vertex(DsnPoint::new(30000, -40000))
        .part_number("10k")
        .build()?;
    let k = tree.add_child(root, DsnKey::Place, single);
    assert_eq!(format_node(&tree, k, 2)?, "    (place R1 30000 -40000 front 0 (PN 10k))\n");

    let multi = PlaceBuilder::default()
        .component_id("R3")
        .vertex(DsnPoint::new(1, 2))
        .side(Side::Back)
        .rotation(90.0)
        .mirror(Mirror::X)
        .properties(vec![Property {
            name: "a".into(),
            value: "b".into(),
        }])
        .lock_type(LockType::Position)
        .build()?;
    let k = tree.add_child(root, DsnKey::Place, multi);
    let expected = concat!(
        "(place R3\n",
        "   1 2 back 90 (mirror x)\n",
        "  (property \n",
        "    (a b)\n",
        "  )\n",
        "  (lock_type position)\n",
        ")\n",
    );
    assert_eq!(format_node(&tree, k, 0)?, expected);
    Ok(())
}
#[test]
fn it_writes_padstacks() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let ps = tree.add_child(
        root,
        DsnKey::Padstack,
        PadstackBuilder::default()
            .padstack_id("Via[0-1]_600:300_um")
            .build()?,
    );
    for layer in ["F.Cu", "B.Cu"] {
        let shape = tree.add_child(ps, DsnKey::Shape, Shape::default());
        let circle = Circle {
            layer_id: layer.into(),
            diameter: 600.0,
            vertex: DsnPoint::default(),
        };
        tree.add_child(shape, DsnKey::Circle, circle);
    }
    let expected = concat!(
        "  (padstack \"Via[0-1]_600:300_um\"\n",
        "    (shape (circle F.Cu 600))\n",
        "    (shape (circle B.Cu 600))\n",
        "    (attach off)\n",
        "  )\n",
    );
    assert_eq!(format_node(&tree, ps, 1)?, expected);
    Ok(())
}
#[test]
fn it_writes_nets() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let net = NetBuilder::default()
        .net_id("GND")
        .pins(vec![PinRef::new("R1", "2"), PinRef::new("U 1", "3")])
        .build()?;
    let k = tree.add_child(root, DsnKey::Net, net);
    assert_eq!(
        format_node(&tree, k, 1)?,
        "  (net GND \n    (pins R1-2 \"U 1\"-3)\n  )\n"
    );
    Ok(())
}
#[test]
fn it_writes_routed_vias() -> DsnResult<()> {
    let mut tree = DsnTree::design("b");
    let root = tree.root;
    let via = WireViaBuilder::default()
        .padstack_id("V")
        .vertexes(vec![DsnPoint::new(10, 20)])
        .net_id("GND")
        .contact_layers(vec!["F.Cu".to_string(), "B.Cu".to_string()])
        .build()?;
    let k = tree.add_child(root, DsnKey::Via, via);
    assert_eq!(
        format_node(&tree, k, 1)?,
        "  (via V  10 20 (net GND)\n    (contact\n      F.Cu\n      B.Cu\n    ))\n"
    );
    Ok(())
}
#[test]
fn it_writes_with_the_declared_quote() -> DsnResult<()> {
    let src = r#"
    (pcb board
        (parser (string_quote '))
        (network (net 'a(b' (pins U1-1)))
    )
    "#;
    let tree = parse_design_str(src)?;
    let txt = check_design_roundtrip(&tree)?;
    assert!(txt.contains("    (string_quote ')\n"));
    assert!(txt.contains("    (net 'a(b' \n"));
    Ok(())
}
#[test]
fn it_reads_negatives_after_quoted_ids() -> DsnResult<()> {
    let src = r#"
    (pcb board
        (parser (string_quote ") (space_in_quoted_tokens on))
        (structure (keepout (rect "my layer" -10 -10 10 10)))
        (placement (component "0805 R" (place "R 1" -100 200 front 0)))
    )
    "#;
    let tree = parse_design_str(src)?;
    let placement = tree.child_tagged(tree.root, DsnKey::Placement).unwrap();
    let component = tree.child_tagged(placement, DsnKey::Component).unwrap();
    let place = tree.child_tagged(component, DsnKey::Place).unwrap();
    let place = tree[place].elem.as_place().unwrap();
    assert_eq!(place.component_id, "R 1");
    assert_eq!(place.vertex, Some(DsnPoint::new(-100, 200)));

    let txt = check_design_roundtrip(&tree)?;
    assert!(txt.contains("(place \"R 1\" -100 200 front 0)"));
    Ok(())
}
#[test]
fn it_parses_sessions() -> DsnResult<()> {
    let tree = parse_session_file(resource("session.ses"))?;
    let root = tree.root;
    let session = tree[root].elem.as_session().unwrap();
    assert_eq!(session.id, "blinky.ses");
    assert_eq!(session.base_design, "blinky.dsn");

    let history = tree.child_tagged(root, DsnKey::History).unwrap();
    let ancestor = tree.child_tagged(history, DsnKey::Ancestor).unwrap();
    let ancestor = tree[ancestor].elem.as_ancestor().unwrap();
    assert_eq!(ancestor.comment, "exported_from_pcbnew");
    assert_eq!(
        ancestor.time_stamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        "2026-10-19 09:30:05"
    );

    let was_is = tree.child_tagged(root, DsnKey::WasIs).unwrap();
    let was_is = tree[was_is].elem.as_was_is().unwrap();
    assert_eq!(
        was_is.pin_pairs,
        vec![PinPair {
            was: PinRef::new("R1", "1"),
            is: PinRef::new("R1", "2"),
        }]
    );

    let routes = tree.child_tagged(root, DsnKey::Routes).unwrap();
    let nets = tree.children_tagged(routes, DsnKey::Net);
    assert_eq!(nets.len(), 2);
    assert_eq!(tree.children_tagged(nets[0], DsnKey::Wire).len(), 1);
    assert_eq!(tree.children_tagged(nets[0], DsnKey::Via).len(), 1);
    let library_out = tree.child_tagged(routes, DsnKey::LibraryOut).unwrap();
    assert_eq!(tree.children_tagged(library_out, DsnKey::Padstack).len(), 1);
    Ok(())
}
#[test]
fn it_roundtrips_sessions() -> DsnResult<()> {
    let tree = parse_session_file(resource("session.ses"))?;
    let txt = to_string(&tree)?;
    let expected_head = concat!(
        "(pcb blinky.ses\n",
        "  (base_design \"blinky.dsn\")\n",
        "  (history\n",
        "    (ancestor \"blinky.dsn\" (created_time Oct 19 09 : 30 : 05 2026)\n",
        "      (comment exported_from_pcbnew)\n",
        "    )\n",
        "    (self (created_time Oct 19 10 : 02 : 41 2026)\n",
        "      (comment routed)\n",
        "    )\n",
        "  )\n",
    );
    assert!(txt.starts_with(expected_head));
    assert!(txt.contains("    (network_out\n      (net GND\n        (wire (path F.Cu 2500  308250 -400000  400000 -400000))\n"));

    // Sessions written with the `pcb` keyword read back
    let tree2 = parse_session_str(&txt)?;
    assert!(tree.same_structure(tree.root, &tree2, tree2.root));
    assert_eq!(to_string(&tree2)?, txt);
    Ok(())
}
#[test]
fn it_saves_and_loads() -> DsnResult<()> {
    let tree = parse_design_file(resource("board.dsn"))?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("board.dsn");
    save(&tree, &path)?;
    let tree2 = parse_design_file(&path)?;
    assert!(tree.same_structure(tree.root, &tree2, tree2.root));
    Ok(())
}
#[test]
fn it_reads_latin1() -> DsnResult<()> {
    // "Résistance" in Latin-1
    let mut bytes = b"(pcb R".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"sistance)");
    let tree = parse_design_bytes(&bytes)?;
    let pcb = tree[tree.root].elem.as_pcb().unwrap();
    assert_eq!(pcb.name, "R\u{e9}sistance");
    assert_eq!(tree.encoding, Encoding::Latin1);

    // Written back in Latin-1, one byte per character
    let written = to_bytes(&tree)?;
    assert_eq!(written, b"(pcb R\xe9sistance\n)\n".to_vec());
    let tmp = tempfile::NamedTempFile::new()?;
    save(&tree, tmp.path())?;
    assert_eq!(std::fs::read(tmp.path())?, written);
    assert_eq!(parse_design_file(tmp.path())?.encoding, Encoding::Latin1);

    // UTF-8 sources stay UTF-8
    let tree = parse_design_bytes("(pcb R\u{e9}sistance)".as_bytes())?;
    assert_eq!(tree.encoding, Encoding::Utf8);
    assert_eq!(to_bytes(&tree)?, "(pcb R\u{e9}sistance\n)\n".as_bytes().to_vec());
    Ok(())
}
#[test]
fn it_serializes_to_json() -> DsnResult<()> {
    let tree = parse_design_file(resource("board.dsn"))?;
    let json = Json.to_string(&tree)?;
    let tree2: DsnTree = Json.from_str(&json)?;
    assert!(tree.same_structure(tree.root, &tree2, tree2.root));
    Ok(())
}
#[test]
fn it_fails_on_truncated_input() {
    let err = parse_design_str("(pcb board\n  (structure\n").unwrap_err();
    assert!(err.is_syntax());
    assert_eq!(err.line(), Some(3));
}
