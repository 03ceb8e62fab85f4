//! Obstacle scanning: the closest car or player ahead of a vehicle.
//!
//! Vehicles are snapshotted once per frame and bucketed by edge, so each
//! scan only visits vehicles on the scanner's current and committed next
//! edge. The snapshot also keeps results independent of update order.

use std::collections::HashMap;

use bevy::prelude::*;
use petgraph::graph::EdgeIndex;
use smallvec::SmallVec;

use super::vehicle::TrafficPool;
use super::TrafficConfig;

/// Frame-start state of one vehicle, as seen by the others.
#[derive(Clone, Copy, Debug)]
pub struct VehicleSnapshot {
    pub slot: usize,
    pub position: Vec3,
    pub forward: Vec3,
    pub edge: EdgeIndex,
}

/// Per-frame edge buckets of vehicle snapshots.
#[derive(Default)]
pub struct ObstacleIndex {
    snapshots: Vec<VehicleSnapshot>,
    by_edge: HashMap<EdgeIndex, SmallVec<[usize; 4]>>,
}

impl ObstacleIndex {
    /// Rebuild from the pool. Call once per frame before any vehicle moves.
    pub fn rebuild(&mut self, pool: &TrafficPool) {
        self.snapshots.clear();
        self.by_edge.clear();

        for (slot, vehicle) in pool.iter_active() {
            let idx = self.snapshots.len();
            self.snapshots.push(VehicleSnapshot {
                slot,
                position: vehicle.position,
                forward: vehicle.forward,
                edge: vehicle.current_edge,
            });
            self.by_edge.entry(vehicle.current_edge).or_default().push(idx);
        }
    }

    fn on_edge(&self, edge: EdgeIndex) -> impl Iterator<Item = &VehicleSnapshot> {
        self.by_edge
            .get(&edge)
            .into_iter()
            .flatten()
            .map(|&i| &self.snapshots[i])
    }

    /// Distance to the closest vehicle ahead of `slot` on its current edge or
    /// its committed next edge.
    ///
    /// A candidate counts when it is in front of the scanner, is not heading
    /// the opposite way (oncoming lane), and is within the detection distance.
    pub fn distance_to_vehicle_ahead(
        &self,
        slot: usize,
        position: Vec3,
        forward: Vec3,
        current_edge: EdgeIndex,
        next_edge: Option<EdgeIndex>,
        config: &TrafficConfig,
    ) -> Option<f32> {
        let max_dist_sq = config.detection_distance * config.detection_distance;
        let next = next_edge.filter(|&e| e != current_edge);

        let candidates = self
            .on_edge(current_edge)
            .chain(next.into_iter().flat_map(|e| self.on_edge(e)));

        let mut closest: Option<f32> = None;
        for other in candidates {
            if other.slot == slot {
                continue;
            }

            let to_other = other.position - position;
            if to_other.dot(forward) < 0.0 {
                continue;
            }
            if forward.dot(other.forward) < config.oncoming_dot {
                continue;
            }

            let dist_sq = to_other.length_squared();
            if dist_sq > max_dist_sq {
                continue;
            }

            let dist = dist_sq.sqrt();
            if closest.map_or(true, |c| dist < c) {
                closest = Some(dist);
            }
        }
        closest
    }
}

/// Distance to the player if they are inside the detection radius and in
/// front of the vehicle. A player beside or behind does not count.
pub fn distance_to_player(
    position: Vec3,
    forward: Vec3,
    player: Vec3,
    config: &TrafficConfig,
) -> Option<f32> {
    let to_player = player - position;
    let dist_sq = to_player.length_squared();
    if dist_sq > config.detection_distance * config.detection_distance {
        return None;
    }

    let alignment = to_player.normalize_or_zero().dot(forward);
    if alignment < config.player_alignment {
        return None;
    }

    Some(dist_sq.sqrt())
}
