//! Spawning and despawning vehicles around the reference point.

use bevy::math::Vec3Swizzles;
use bevy::prelude::*;
use petgraph::graph::NodeIndex;
use rand::Rng;

use crate::road::RoadGraph;

use super::navigation::find_next_edge;
use super::vehicle::{TrafficPool, Vehicle};
use super::TrafficConfig;

/// Spawn timer state.
#[derive(Debug, Default)]
pub struct Population {
    spawn_timer: f32,
}

impl Population {
    /// Advance the spawn timer. Returns `true` when a spawn attempt is due.
    pub fn tick(&mut self, dt: f32, config: &TrafficConfig) -> bool {
        self.spawn_timer += dt;
        if self.spawn_timer > config.spawn_interval {
            self.spawn_timer = 0.0;
            true
        } else {
            false
        }
    }
}

/// Random pastel-to-mid paint color.
fn random_color(rng: &mut impl Rng) -> Color {
    Color::srgb_u8(
        rng.gen_range(80..=200),
        rng.gen_range(80..=200),
        rng.gen_range(80..=200),
    )
}

/// Whether `position` lies strictly inside the spawn annulus around `reference`.
pub fn in_spawn_ring(position: Vec2, reference: Vec3, config: &TrafficConfig) -> bool {
    let dist_sq = position.distance_squared(reference.xz());
    dist_sq > config.spawn_radius_min * config.spawn_radius_min
        && dist_sq < config.spawn_radius_max * config.spawn_radius_max
}

/// Build a vehicle leaving `node`, on a random legal direction of the edge
/// the navigator picks. Returns `None` if the node has nowhere to go or the
/// spawn point is occupied.
pub fn vehicle_from_node(
    pool: &TrafficPool,
    graph: &RoadGraph,
    node: NodeIndex,
    config: &TrafficConfig,
    rng: &mut impl Rng,
) -> Option<Vehicle> {
    let edge = find_next_edge(graph, node, None, rng)?;
    let (start, end) = graph.edge_endpoints(edge)?;

    // Either direction along a two-way edge
    let from = if graph.departs_from(edge, end) && rng.gen_bool(0.5) {
        end
    } else {
        start
    };

    let mut vehicle = Vehicle::on_edge(graph, edge, from, config.spawn_progress, random_color(rng))?;
    if !vehicle.place(graph, config) {
        return None;
    }
    if pool.is_occupied(vehicle.position.x, vehicle.position.z, config.spawn_clearance) {
        trace!("Spawn point on {:?} occupied", edge);
        return None;
    }

    vehicle.next_edge = find_next_edge(graph, vehicle.end_node, Some(edge), rng);
    Some(vehicle)
}

/// Try to spawn one vehicle on a random node inside the spawn ring.
/// Returns the slot filled.
pub fn try_spawn(
    pool: &mut TrafficPool,
    graph: &RoadGraph,
    reference: Vec3,
    config: &TrafficConfig,
    rng: &mut impl Rng,
) -> Option<usize> {
    let slot = pool.free_slot()?;
    let node_count = graph.node_count();
    if node_count == 0 {
        return None;
    }

    for _ in 0..config.spawn_attempts {
        let Some(node) = graph.node_at(rng.gen_range(0..node_count)) else {
            continue;
        };
        let Some(position) = graph.node_position(node) else {
            continue;
        };
        if !in_spawn_ring(position, reference, config) {
            continue;
        }

        if let Some(vehicle) = vehicle_from_node(pool, graph, node, config, rng) {
            debug!("Spawned vehicle in slot {} on {:?}", slot, vehicle.current_edge);
            pool.insert(slot, vehicle);
            return Some(slot);
        }
    }
    None
}

/// Release every vehicle farther than the despawn radius from `reference`
/// on the ground plane. Returns how many were removed.
pub fn despawn_distant(pool: &mut TrafficPool, reference: Vec3, config: &TrafficConfig) -> usize {
    let limit_sq = config.despawn_radius * config.despawn_radius;
    let mut removed = 0;

    for slot in 0..pool.capacity() {
        let Some(vehicle) = pool.get(slot) else {
            continue;
        };
        if vehicle.position.xz().distance_squared(reference.xz()) > limit_sq {
            pool.release(slot);
            trace!("Despawned vehicle in slot {}", slot);
            removed += 1;
        }
    }
    removed
}
