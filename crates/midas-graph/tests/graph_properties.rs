use midas_graph::{NodeGraph, template};
use proptest::prelude::*;

/// Node types with at least one port, so random wiring has something to hit.
const TYPES: &[&str] = &[
    "midi.input",
    "logic.mapper",
    "action.volume",
    "action.command",
];

/// Output/input port names across the types above.
const PORTS: &[&str] = &["message", "out", "in", "trigger"];

fn build(types: &[usize], edges: &[(usize, usize, usize, usize)]) -> NodeGraph {
    let mut g = NodeGraph::new();
    for (i, t) in types.iter().enumerate() {
        let node = template(TYPES[*t % TYPES.len()])
            .unwrap()
            .instantiate(format!("n{i}"));
        g.add_node(node);
    }
    for (s, sp, t, tp) in edges {
        let n = types.len();
        g.connect(
            &format!("n{}", s % n),
            PORTS[sp % PORTS.len()],
            &format!("n{}", t % n),
            PORTS[tp % PORTS.len()],
        );
    }
    g
}

proptest! {
    #[test]
    fn remove_node_drops_every_touching_edge(
        types in prop::collection::vec(0usize..4, 1..8),
        edges in prop::collection::vec((0usize..8, 0usize..4, 0usize..8, 0usize..4), 0..24),
        victim in 0usize..8,
    ) {
        let mut g = build(&types, &edges);
        let id = format!("n{}", victim % types.len());
        g.remove_node(&id);
        prop_assert!(g.node(&id).is_none());
        prop_assert!(g.connections().iter().all(|c| c.source_node != id && c.target_node != id));
    }

    #[test]
    fn inputs_never_have_two_edges(
        types in prop::collection::vec(0usize..4, 1..8),
        edges in prop::collection::vec((0usize..8, 0usize..4, 0usize..8, 0usize..4), 0..24),
    ) {
        let g = build(&types, &edges);
        for c in g.connections() {
            prop_assert_eq!(g.connections_to(&c.target_node, Some(&c.target_port)).count(), 1);
            prop_assert_ne!(&c.source_node, &c.target_node);
        }
    }
}
