//! Route continuation: which edge a vehicle takes at the next intersection.

use petgraph::graph::{EdgeIndex, NodeIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use smallvec::SmallVec;

use crate::road::RoadGraph;

type Candidates = SmallVec<[EdgeIndex; 8]>;

/// Pick the edge to leave `node` by, avoiding `exclude` (the edge just
/// arrived on) when possible.
///
/// Preference order:
/// 1. a random legal departure other than `exclude`;
/// 2. a random adjacent edge, `exclude` and one-way direction ignored;
/// 3. the node's first adjacent edge.
///
/// Returns `None` only for a node with no adjacency at all.
pub fn find_next_edge<R: Rng + ?Sized>(
    graph: &RoadGraph,
    node: NodeIndex,
    exclude: Option<EdgeIndex>,
    rng: &mut R,
) -> Option<EdgeIndex> {
    graph.node_by_index(node)?;

    let adjacent: Candidates = graph.edges_of_node(node).collect();

    let turns: Candidates = adjacent
        .iter()
        .copied()
        .filter(|&e| Some(e) != exclude && graph.departs_from(e, node))
        .collect();

    if let Some(&edge) = turns.choose(rng) {
        return Some(edge);
    }

    if let Some(&edge) = adjacent.choose(rng) {
        return Some(edge);
    }

    adjacent.first().copied()
}
