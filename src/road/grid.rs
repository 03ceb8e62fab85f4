//! Rectangular street grid generator for the demo map, benchmarks and tests.

use bevy::prelude::*;
use petgraph::graph::NodeIndex;

use super::{RoadEdge, RoadGraph};

/// Layout parameters for a street grid.
#[derive(Clone, Debug)]
pub struct GridLayout {
    /// Intersections along X.
    pub columns: usize,
    /// Intersections along Z.
    pub rows: usize,
    /// Block size in world units.
    pub spacing: f32,
    /// World position of the first intersection.
    pub origin: Vec2,
    /// Every Nth street is a wide arterial.
    pub arterial_every: usize,
    /// Every Nth minor row is one-way, alternating direction.
    pub one_way_every: usize,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: 12,
            rows: 12,
            spacing: 40.0,
            origin: Vec2::new(-220.0, -220.0),
            arterial_every: 4,
            one_way_every: 3,
        }
    }
}

const ARTERIAL_WIDTH: f32 = 6.0;
const ARTERIAL_LIMIT: f32 = 50.0;
const STREET_WIDTH: f32 = 3.5;
const STREET_LIMIT: f32 = 30.0;

/// Append a street grid to `graph`. Returns the node indices row by row.
pub fn build_grid(graph: &mut RoadGraph, layout: &GridLayout) -> Vec<Vec<NodeIndex>> {
    let rows: Vec<Vec<NodeIndex>> = (0..layout.rows)
        .map(|z| {
            (0..layout.columns)
                .map(|x| {
                    let offset = Vec2::new(x as f32, z as f32) * layout.spacing;
                    graph.add_node(layout.origin + offset)
                })
                .collect()
        })
        .collect();

    let is_arterial = |i: usize| layout.arterial_every > 0 && i % layout.arterial_every == 0;

    // East-west streets
    for (z, row) in rows.iter().enumerate() {
        let one_way = !is_arterial(z) && layout.one_way_every > 0 && z % layout.one_way_every == 1;
        // Alternate the direction of successive one-way rows
        let eastbound = (z / layout.one_way_every.max(1)) % 2 == 0;

        for pair in row.windows(2) {
            let (a, b) = if eastbound { (pair[0], pair[1]) } else { (pair[1], pair[0]) };
            let edge = match (is_arterial(z), one_way) {
                (true, _) => RoadEdge::two_way(ARTERIAL_WIDTH, ARTERIAL_LIMIT),
                (false, true) => RoadEdge::one_way(STREET_WIDTH, STREET_LIMIT),
                (false, false) => RoadEdge::two_way(STREET_WIDTH, STREET_LIMIT),
            };
            graph.add_edge(a, b, edge);
        }
    }

    // North-south streets are always two-way
    for x in 0..layout.columns {
        for z in 1..layout.rows {
            let edge = if is_arterial(x) {
                RoadEdge::two_way(ARTERIAL_WIDTH, ARTERIAL_LIMIT)
            } else {
                RoadEdge::two_way(STREET_WIDTH, STREET_LIMIT)
            };
            graph.add_edge(rows[z - 1][x], rows[z][x], edge);
        }
    }

    info!(
        "Built street grid: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_has_expected_topology() {
        let mut graph = RoadGraph::default();
        let layout = GridLayout {
            columns: 4,
            rows: 3,
            ..default()
        };
        let rows = build_grid(&mut graph, &layout);

        assert_eq!(graph.node_count(), 12);
        // 3 rows * 3 horizontal + 4 columns * 2 vertical
        assert_eq!(graph.edge_count(), 17);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 4);
    }

    #[test]
    fn one_way_rows_exist_on_minor_streets() {
        let mut graph = RoadGraph::default();
        build_grid(&mut graph, &GridLayout::default());

        let one_way = graph.edges().filter(|(_, e)| e.one_way).count();
        assert!(one_way > 0);
        assert!(graph
            .edges()
            .filter(|(_, e)| e.one_way)
            .all(|(_, e)| e.width == STREET_WIDTH));
    }
}
