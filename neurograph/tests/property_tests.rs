//! Property tests for graph, association and geometry invariants.

use std::collections::HashSet;

use neurograph::export::{from_json, to_json};
use neurograph::geometry::{PixelScale, ReferenceSurface};
use neurograph::graph::{build_graph, BuildOptions};
use neurograph::prelude::*;
use proptest::prelude::*;

const NAMES: &[&str] = &["cf_1", "cf_2", "mli2_1", "mli2_2", "mli1_1", "mli1_2", "mli1_3", "pc_1", "pc_2"];

/// Edge rows over a small name pool; coordinates collide often.
fn edge_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(
        (0..NAMES.len(), 0..NAMES.len(), 0u8..12, any::<bool>()),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(a, b, c, confirmed)| {
                let mut row = vec![
                    NAMES[a].to_string(),
                    NAMES[b].to_string(),
                    format!("({},{},{})", c, c % 3, 7),
                ];
                if confirmed {
                    row.push("confirmed".to_string());
                }
                row
            })
            .collect()
    })
}

/// Confirmed rows with one coordinate per row, paired with a shuffled copy.
fn shuffled_edge_rows() -> impl Strategy<Value = (Vec<Vec<String>>, Vec<Vec<String>>)> {
    prop::collection::vec((0..NAMES.len(), 0..NAMES.len()), 0..30).prop_flat_map(|pairs| {
        let rows: Vec<Vec<String>> = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (a, b))| {
                vec![
                    NAMES[a].to_string(),
                    NAMES[b].to_string(),
                    format!("({i},0,0)"),
                    "confirmed".to_string(),
                ]
            })
            .collect();
        (Just(rows.clone()), Just(rows).prop_shuffle())
    })
}

fn sorted<T: ToString>(items: &[T]) -> Vec<String> {
    let mut out: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    out.sort();
    out
}

fn typed_nodes() -> Vec<Vec<String>> {
    NAMES
        .iter()
        .map(|n| vec![n.to_string(), format!("cell_type:{}", n.split('_').next().unwrap_or(""))])
        .collect()
}

fn associations() -> FiberAssociation {
    FiberAssociation::new([("pc_1", "cf_1"), ("pc_2", "cf_2")]).unwrap()
}

proptest! {
    #[test]
    fn built_graphs_have_unique_coordinates(rows in edge_rows()) {
        if let Ok(graph) = build_graph(&rows, &typed_nodes(), &BuildOptions::default()) {
            let mut seen = HashSet::new();
            for s in graph.synapses() {
                let c = s.coord().unwrap();
                prop_assert!(seen.insert(c.to_string()));
            }
        }
    }

    #[test]
    fn serialization_is_stable(rows in edge_rows()) {
        if let Ok(graph) = build_graph(&rows, &typed_nodes(), &BuildOptions::default()) {
            let first = to_json(&graph).unwrap();
            let second = to_json(&from_json(&first).unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn mono_and_disynaptic_sets_are_disjoint(rows in edge_rows()) {
        let Ok(graph) = build_graph(&rows, &typed_nodes(), &BuildOptions::default()) else {
            return Ok(());
        };
        let assoc = associations();
        let query = CircuitQuery::new(&graph, &assoc);
        for pc in ["pc_1", "pc_2"] {
            let (Ok(mono), Ok(di)) = (query.monosynaptic_mli1s(pc), query.disynaptic_mli1s(pc)) else {
                continue;
            };
            let fiber = assoc.fiber_of(pc).unwrap();
            for m in &mono {
                prop_assert!(!di.contains(m));
                prop_assert_eq!(graph.cell_type(m), Some(CellType::Mli1));
                prop_assert!(graph.successors(fiber).contains(m));
            }
        }
    }

    #[test]
    fn association_roundtrips(n in 1usize..30) {
        let pairs: Vec<(String, String)> = (0..n).map(|i| (format!("pc_{i}"), format!("cf_{i}"))).collect();
        let assoc = FiberAssociation::new(pairs.clone()).unwrap();
        for (pc, cf) in &pairs {
            prop_assert_eq!(assoc.cell_of(assoc.fiber_of(pc).unwrap()).unwrap(), pc.as_str());
            prop_assert_eq!(assoc.fiber_of(assoc.cell_of(cf).unwrap()).unwrap(), cf.as_str());
        }
    }

    #[test]
    fn points_on_a_segment_plane_are_at_zero_distance(
        x1 in -1e5f64..1e5, y1 in -1e5f64..1e5, z1 in 10f64..1e3,
        dx in 100f64..1e4, dy in -1e4f64..1e4,
        s in -3f64..3.0, h in -1e3f64..1e3,
    ) {
        let p1 = Coord::new(x1, y1, z1);
        let p2 = Coord::new(x1 + dx, y1 + dy, z1);
        let surface = ReferenceSurface::new(vec![p1, p2], PixelScale::default()).unwrap();

        // Any point along the segment direction at any height lies in the plane.
        let on_plane = Coord::new(x1 + s * dx, y1 + s * dy, h);
        prop_assert!(surface.distance_to(on_plane) < 1e-6);
    }

    #[test]
    fn distance_is_invariant_under_in_plane_translation(
        off in -500f64..500.0, s in -5f64..5.0, h in -1e3f64..1e3,
    ) {
        let surface = ReferenceSurface::purkinje_layer().unwrap();
        let a = Coord::new(36591.30859, 99053.46094 + off, 500.0);
        let dir = (58370.33594 - 36591.30859, 99943.27344 - 99053.46094);
        let b = Coord::new(a.x + s * dir.0, a.y + s * dir.1, h);
        let da = surface.segment_distances(a)[0];
        let db = surface.segment_distances(b)[0];
        prop_assert!((da - db).abs() < 1e-6);
    }

    #[test]
    fn circuit_queries_ignore_row_order((rows, shuffled) in shuffled_edge_rows()) {
        let nodes = typed_nodes();
        let a = build_graph(&rows, &nodes, &BuildOptions::default()).unwrap();
        let b = build_graph(&shuffled, &nodes, &BuildOptions::default()).unwrap();
        let assoc = associations();
        let (qa, qb) = (CircuitQuery::new(&a, &assoc), CircuitQuery::new(&b, &assoc));

        for pc in ["pc_1", "pc_2"] {
            match (qa.disynaptic_mli1s(pc), qb.disynaptic_mli1s(pc)) {
                (Ok(x), Ok(y)) => prop_assert_eq!(sorted(&x), sorted(&y)),
                (x, y) => prop_assert_eq!(x.is_ok(), y.is_ok()),
            }

            let options = CircuitOptions::default();
            match (qa.disinhibition_circuit(pc, &options), qb.disinhibition_circuit(pc, &options)) {
                (Ok(x), Ok(y)) => {
                    prop_assert_eq!(sorted(&x.mli2s), sorted(&y.mli2s));
                    prop_assert_eq!(sorted(&x.direct_mli1s), sorted(&y.direct_mli1s));
                    prop_assert_eq!(sorted(&x.indirect_mli1s), sorted(&y.indirect_mli1s));
                    prop_assert_eq!(sorted(&x.returns_to_target), sorted(&y.returns_to_target));
                    prop_assert_eq!(sorted(&x.paths), sorted(&y.paths));
                }
                (x, y) => prop_assert_eq!(x.is_ok(), y.is_ok()),
            }
        }
    }
}
