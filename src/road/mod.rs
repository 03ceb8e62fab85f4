//! Road network graph consumed by the traffic engine.
//!
//! Uses petgraph for the underlying graph structure. The traffic engine only
//! reads from it: connectivity, node positions and per-edge attributes.

use bevy::prelude::*;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

pub mod grid;

pub struct RoadPlugin;

impl Plugin for RoadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoadGraph>()
            .init_resource::<RoadDebugConfig>()
            .add_systems(Update, render_roads);
    }
}

/// A node in the road network (intersection or endpoint).
#[derive(Clone, Debug)]
pub struct RoadNode {
    pub position: Vec2,
}

/// An edge in the road network (road segment).
///
/// The first endpoint passed to [`RoadGraph::add_edge`] is the edge's start.
/// One-way edges may only be driven from start to end.
#[derive(Clone, Debug)]
pub struct RoadEdge {
    /// Paved width in world units.
    pub width: f32,
    /// Only drivable from start to end.
    pub one_way: bool,
    /// Posted limit in map units (roughly km/h).
    pub speed_limit: f32,
    /// Straight-line length between the endpoints, filled in on insertion.
    pub length: f32,
}

impl RoadEdge {
    pub fn two_way(width: f32, speed_limit: f32) -> Self {
        Self {
            width,
            one_way: false,
            speed_limit,
            length: 0.0,
        }
    }

    pub fn one_way(width: f32, speed_limit: f32) -> Self {
        Self {
            width,
            one_way: true,
            speed_limit,
            length: 0.0,
        }
    }
}

/// The road network graph resource.
#[derive(Resource, Default)]
pub struct RoadGraph {
    pub graph: UnGraph<RoadNode, RoadEdge>,
}

impl RoadGraph {
    /// Add a node to the graph.
    pub fn add_node(&mut self, position: Vec2) -> NodeIndex {
        self.graph.add_node(RoadNode { position })
    }

    /// Add an edge running from `start` to `end`. The length is derived from
    /// the node positions.
    pub fn add_edge(&mut self, start: NodeIndex, end: NodeIndex, mut edge: RoadEdge) -> EdgeIndex {
        edge.length = match (self.node_position(start), self.node_position(end)) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        };
        self.graph.add_edge(start, end, edge)
    }

    /// Find the nearest node within a radius.
    pub fn find_nearest(&self, position: Vec2, max_distance: f32) -> Option<NodeIndex> {
        let mut best: Option<(NodeIndex, f32)> = None;

        for (idx, node) in self.nodes() {
            let dist = position.distance(node.position);
            if dist > max_distance {
                continue;
            }
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((idx, dist));
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// Closest node to a point, regardless of distance.
    pub fn closest_node(&self, position: Vec2) -> Option<NodeIndex> {
        self.find_nearest(position, f32::INFINITY)
    }

    /// Whether there is anything for vehicles to drive on.
    pub fn is_drivable(&self) -> bool {
        self.graph.node_count() > 0 && self.graph.edge_count() > 0
    }

    /// Get all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &RoadNode)> {
        self.graph.node_indices().map(|i| (i, &self.graph[i]))
    }

    /// Get all edges with their indices.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &RoadEdge)> {
        self.graph
            .edge_indices()
            .map(|i| (i, &self.graph[i]))
    }

    /// Get node count.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Get the node at a position in index order, used for random sampling.
    pub fn node_at(&self, n: usize) -> Option<NodeIndex> {
        (n < self.graph.node_count()).then(|| NodeIndex::new(n))
    }

    /// Get an edge by its index.
    pub fn edge_by_index(&self, idx: EdgeIndex) -> Option<&RoadEdge> {
        self.graph.edge_weight(idx)
    }

    /// Get the (start, end) node indices for an edge.
    pub fn edge_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    /// Get a node by its index.
    pub fn node_by_index(&self, idx: NodeIndex) -> Option<&RoadNode> {
        self.graph.node_weight(idx)
    }

    pub fn node_position(&self, idx: NodeIndex) -> Option<Vec2> {
        self.node_by_index(idx).map(|n| n.position)
    }

    /// Edges touching a node, in adjacency order.
    pub fn edges_of_node(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    /// Whether travel may legally leave `node` along `edge`.
    pub fn departs_from(&self, edge: EdgeIndex, node: NodeIndex) -> bool {
        let (Some((start, end)), Some(weight)) = (self.edge_endpoints(edge), self.edge_by_index(edge))
        else {
            return false;
        };
        start == node || (end == node && !weight.one_way)
    }

    /// The endpoint of `edge` opposite `node`, if `node` is on it.
    pub fn other_endpoint(&self, edge: EdgeIndex, node: NodeIndex) -> Option<NodeIndex> {
        let (start, end) = self.edge_endpoints(edge)?;
        if start == node {
            Some(end)
        } else if end == node {
            Some(start)
        } else {
            None
        }
    }

    /// Unit direction of travel when leaving `node` along `edge`.
    pub fn direction_from(&self, edge: EdgeIndex, node: NodeIndex) -> Option<Vec2> {
        let other = self.other_endpoint(edge, node)?;
        let from = self.node_position(node)?;
        let to = self.node_position(other)?;
        (to - from).try_normalize()
    }
}

/// Toggles for drawing the road graph.
#[derive(Resource)]
pub struct RoadDebugConfig {
    pub show_road_graph: bool,
}

impl Default for RoadDebugConfig {
    fn default() -> Self {
        Self {
            show_road_graph: true,
        }
    }
}

/// Render roads as gizmo lines.
fn render_roads(road_graph: Res<RoadGraph>, config: Res<RoadDebugConfig>, mut gizmos: Gizmos) {
    if !config.show_road_graph {
        return;
    }

    for (idx, edge) in road_graph.edges() {
        let Some((a, b)) = road_graph.edge_endpoints(idx) else {
            continue;
        };
        let (Some(a), Some(b)) = (road_graph.node_position(a), road_graph.node_position(b)) else {
            continue;
        };

        let color = if edge.one_way {
            Color::srgb(1.0, 0.8, 0.0)
        } else if edge.width >= 5.0 {
            Color::srgb(1.0, 1.0, 1.0)
        } else {
            Color::srgb(0.6, 0.6, 0.6)
        };

        let start = Vec3::new(a.x, 0.05, a.y);
        let end = Vec3::new(b.x, 0.05, b.y);
        gizmos.line(start, end, color);

        // Arrowhead marks the legal direction of one-way streets
        if edge.one_way {
            gizmos.arrow(start.lerp(end, 0.4), start.lerp(end, 0.6), color);
        }
    }

    // Draw nodes as cross markers
    for (_idx, node) in road_graph.nodes() {
        let pos = Vec3::new(node.position.x, 0.05, node.position.y);
        let size = 0.8;
        let node_color = Color::srgb(0.0, 1.0, 0.0);

        gizmos.line(pos + Vec3::X * size, pos - Vec3::X * size, node_color);
        gizmos.line(pos + Vec3::Z * size, pos - Vec3::Z * size, node_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(one_way: bool) -> (RoadGraph, NodeIndex, NodeIndex, EdgeIndex) {
        let mut graph = RoadGraph::default();
        let a = graph.add_node(Vec2::new(0.0, 0.0));
        let b = graph.add_node(Vec2::new(30.0, 40.0));
        let edge = if one_way {
            RoadEdge::one_way(3.5, 30.0)
        } else {
            RoadEdge::two_way(3.5, 30.0)
        };
        let e = graph.add_edge(a, b, edge);
        (graph, a, b, e)
    }

    #[test]
    fn edge_length_comes_from_node_positions() {
        let (graph, _, _, e) = pair(false);
        assert!((graph.edge_by_index(e).unwrap().length - 50.0).abs() < 1e-4);
    }

    #[test]
    fn one_way_edges_only_depart_from_start() {
        let (graph, a, b, e) = pair(true);
        assert!(graph.departs_from(e, a));
        assert!(!graph.departs_from(e, b));

        let (graph, a, b, e) = pair(false);
        assert!(graph.departs_from(e, a));
        assert!(graph.departs_from(e, b));
    }

    #[test]
    fn closest_node_ignores_distance() {
        let (graph, a, b, _) = pair(false);
        assert_eq!(graph.closest_node(Vec2::new(-500.0, 0.0)), Some(a));
        assert_eq!(graph.closest_node(Vec2::new(29.0, 41.0)), Some(b));
        assert_eq!(RoadGraph::default().closest_node(Vec2::ZERO), None);
    }

    #[test]
    fn direction_from_points_away_from_node() {
        let (graph, a, b, e) = pair(false);
        let dir = graph.direction_from(e, b).unwrap();
        assert!((dir - Vec2::new(-0.6, -0.8)).length() < 1e-4);
        assert_eq!(graph.other_endpoint(e, a), Some(b));
    }

    #[test]
    fn empty_graph_is_not_drivable() {
        let mut graph = RoadGraph::default();
        assert!(!graph.is_drivable());
        graph.add_node(Vec2::ZERO);
        assert!(!graph.is_drivable());
    }
}
