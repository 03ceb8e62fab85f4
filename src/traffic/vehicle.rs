//! Vehicle state and the fixed-capacity vehicle pool.

use bevy::prelude::*;
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::road::RoadGraph;

use super::TrafficConfig;

/// An autonomous vehicle following the road graph.
///
/// `position` and `forward` are never integrated; [`Vehicle::place`]
/// recomputes them from the edge endpoints and `progress` every frame.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// World placement, projected from the graph.
    pub position: Vec3,
    /// Unit heading along the current edge.
    pub forward: Vec3,
    /// Paint color picked at spawn.
    pub color: Color,
    /// Edge currently being driven.
    pub current_edge: EdgeIndex,
    /// Edge committed to at the upcoming intersection, chosen once per segment.
    pub next_edge: Option<EdgeIndex>,
    /// Node the vehicle left from.
    pub start_node: NodeIndex,
    /// Node the vehicle is heading toward.
    pub end_node: NodeIndex,
    /// Fraction of the current edge covered (0.0 to 1.0).
    pub progress: f32,
    /// Cached length of the current edge.
    pub edge_length: f32,
    /// Current speed (world units per second).
    pub speed: f32,
    /// Target speed computed on the last update.
    pub target_speed: f32,
    /// Seconds spent below the stall speed.
    pub stuck_timer: f32,
}

impl Vehicle {
    /// Put a vehicle on `edge`, leaving from `from` at the given progress.
    ///
    /// Returns `None` when `from` is not an endpoint of `edge`.
    pub fn on_edge(
        graph: &RoadGraph,
        edge: EdgeIndex,
        from: NodeIndex,
        progress: f32,
        color: Color,
    ) -> Option<Self> {
        let to = graph.other_endpoint(edge, from)?;
        let mut vehicle = Self {
            position: Vec3::ZERO,
            forward: Vec3::X,
            color,
            current_edge: edge,
            next_edge: None,
            start_node: from,
            end_node: to,
            progress,
            edge_length: 0.0,
            speed: 0.0,
            target_speed: 0.0,
            stuck_timer: 0.0,
        };
        vehicle.edge_length = graph.edge_by_index(edge)?.length;
        Some(vehicle)
    }

    /// Distance left before the end node.
    pub fn remaining_distance(&self) -> f32 {
        (1.0 - self.progress).max(0.0) * self.edge_length
    }

    /// Move onto `edge` from the node just reached.
    ///
    /// Returns `false` if the edge does not touch that node anymore.
    pub fn enter_edge(&mut self, graph: &RoadGraph, edge: EdgeIndex) -> bool {
        let arrived = self.end_node;
        let Some(next_end) = graph.other_endpoint(edge, arrived) else {
            return false;
        };

        self.current_edge = edge;
        self.start_node = arrived;
        self.end_node = next_end;
        self.progress = 0.0;
        match graph.edge_by_index(edge) {
            Some(weight) => {
                self.edge_length = weight.length;
                true
            }
            None => false,
        }
    }

    /// Recompute `position` and `forward` from the graph.
    ///
    /// Two-way edges keep the vehicle right of the centreline by a fraction
    /// of the road width; one-way edges use the whole width as a single lane.
    pub fn place(&mut self, graph: &RoadGraph, config: &TrafficConfig) -> bool {
        let (Some(start), Some(end), Some(edge)) = (
            graph.node_position(self.start_node),
            graph.node_position(self.end_node),
            graph.edge_by_index(self.current_edge),
        ) else {
            return false;
        };

        let dir = (end - start).normalize_or_zero();
        let centre = start.lerp(end, self.progress.clamp(0.0, 1.0));
        let right = Vec2::new(dir.y, -dir.x);
        let offset = if edge.one_way {
            0.0
        } else {
            edge.width * config.lane_offset
        };
        let ground = centre + right * offset;

        self.forward = Vec3::new(dir.x, 0.0, dir.y);
        self.position = Vec3::new(ground.x, config.road_height, ground.y);
        true
    }
}

/// Visual body type, derived from the slot a vehicle occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyStyle {
    Sedan,
    Van,
    Truck,
}

impl BodyStyle {
    pub fn for_slot(slot: usize) -> Self {
        match slot % 3 {
            1 => BodyStyle::Van,
            2 => BodyStyle::Truck,
            _ => BodyStyle::Sedan,
        }
    }
}

/// Fixed-capacity pool of vehicle slots. `None` marks a free slot.
#[derive(Clone, Debug, Default)]
pub struct TrafficPool {
    slots: Vec<Option<Vehicle>>,
}

impl TrafficPool {
    /// Create a pool with every slot free.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Free every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First free slot in pool order.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Claim a specific slot. Fails if it is taken or out of range.
    pub fn insert(&mut self, slot: usize, vehicle: Vehicle) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(vehicle);
                true
            }
            _ => false,
        }
    }

    /// Release a slot, returning the vehicle that was in it.
    pub fn release(&mut self, slot: usize) -> Option<Vehicle> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn get(&self, slot: usize) -> Option<&Vehicle> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Vehicle> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    /// Active vehicles with their slot, in pool order.
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &Vehicle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (usize, &mut Vehicle)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i, v)))
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
