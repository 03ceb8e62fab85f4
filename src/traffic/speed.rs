//! Target speed derivation and speed easing.
//!
//! The target starts at the road's cruise speed and is only ever lowered:
//! for sharp turns and dead ends near the end of the edge, then for a car
//! or the player ahead. Actual speed eases toward it, braking faster than
//! it accelerates.

use crate::road::{RoadEdge, RoadGraph};

use super::vehicle::Vehicle;
use super::TrafficConfig;

/// Cruise speed for an edge: the posted limit scaled to world units, with a
/// floor so slow roads still move.
pub fn cruise_speed(edge: &RoadEdge, config: &TrafficConfig) -> f32 {
    (edge.speed_limit * config.speed_limit_scale).max(config.min_cruise_speed)
}

/// Slow down approaching a sharp turn or a dead end.
///
/// The slowdown weight grows linearly from 0 at the lookahead boundary to 1
/// at the intersection.
pub fn corner_target(target: f32, vehicle: &Vehicle, graph: &RoadGraph, config: &TrafficConfig) -> f32 {
    let remaining = vehicle.remaining_distance();
    if config.turn_lookahead <= 0.0 || remaining >= config.turn_lookahead {
        return target;
    }
    let weight = 1.0 - remaining / config.turn_lookahead;

    let Some(next) = vehicle.next_edge else {
        return target * (1.0 - weight);
    };

    let heading = graph.direction_from(vehicle.current_edge, vehicle.start_node);
    let exit = graph.direction_from(next, vehicle.end_node);
    let (Some(heading), Some(exit)) = (heading, exit) else {
        return target;
    };

    if heading.dot(exit) >= config.turn_sharpness {
        return target;
    }

    let turn_speed = config.turn_speed.min(target);
    target + (turn_speed - target) * weight
}

/// Lower `target` for an obstacle `distance` ahead.
///
/// Inside the stop distance the target is zero; beyond it the allowed speed
/// scales linearly up to `cruise` at the detection distance.
pub fn yield_target(target: f32, cruise: f32, distance: Option<f32>, config: &TrafficConfig) -> f32 {
    let Some(distance) = distance else {
        return target;
    };
    if distance < config.stop_distance {
        return 0.0;
    }

    let span = (config.detection_distance - config.stop_distance).max(f32::EPSILON);
    let factor = ((distance - config.stop_distance) / span).clamp(0.0, 1.0);
    target.min(cruise * factor)
}

/// Ease `speed` toward `target`, using the brake rate when slowing down.
/// A single step never overshoots the target.
pub fn ease_speed(speed: f32, target: f32, dt: f32, config: &TrafficConfig) -> f32 {
    let rate = if speed > target {
        config.brake_rate
    } else {
        config.accel_rate
    };
    let t = (rate * dt).clamp(0.0, 1.0);
    (speed + (target - speed) * t).max(0.0)
}

/// Accumulate time spent crawling. Returns `true` once the vehicle has been
/// stuck longer than the stall time.
pub fn track_stall(vehicle: &mut Vehicle, dt: f32, config: &TrafficConfig) -> bool {
    if vehicle.speed < config.stall_speed {
        vehicle.stuck_timer += dt;
        vehicle.stuck_timer > config.stall_time
    } else {
        vehicle.stuck_timer = 0.0;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::prelude::*;
    use petgraph::graph::{EdgeIndex, NodeIndex};

    fn config() -> TrafficConfig {
        TrafficConfig::default()
    }

    /// West-east street with a straight continuation and a right-angle side
    /// street at the east node.
    fn junction() -> (RoadGraph, NodeIndex, EdgeIndex, EdgeIndex, EdgeIndex) {
        let mut graph = RoadGraph::default();
        let west = graph.add_node(Vec2::new(0.0, 0.0));
        let east = graph.add_node(Vec2::new(100.0, 0.0));
        let beyond = graph.add_node(Vec2::new(200.0, 0.0));
        let south = graph.add_node(Vec2::new(100.0, 100.0));
        let main = graph.add_edge(west, east, RoadEdge::two_way(4.0, 30.0));
        let straight = graph.add_edge(east, beyond, RoadEdge::two_way(4.0, 30.0));
        let turn = graph.add_edge(south, east, RoadEdge::two_way(4.0, 30.0));
        (graph, west, main, straight, turn)
    }

    #[test]
    fn cruise_speed_scales_with_floor() {
        let c = config();
        assert!((cruise_speed(&RoadEdge::two_way(4.0, 50.0), &c) - 17.5).abs() < 1e-4);
        assert_eq!(cruise_speed(&RoadEdge::two_way(4.0, 5.0), &c), c.min_cruise_speed);
    }

    #[test]
    fn straight_continuation_keeps_speed() {
        let (graph, west, main, straight, _) = junction();
        let mut v = Vehicle::on_edge(&graph, main, west, 0.99, Color::WHITE).unwrap();
        v.next_edge = Some(straight);
        assert_eq!(corner_target(10.0, &v, &graph, &config()), 10.0);
    }

    #[test]
    fn sharp_turn_blends_by_remaining_distance() {
        let (graph, west, main, _, turn) = junction();
        let c = config();
        let mut v = Vehicle::on_edge(&graph, main, west, 0.0, Color::WHITE).unwrap();
        v.next_edge = Some(turn);

        // Outside the lookahead window nothing changes
        v.progress = 0.5;
        assert_eq!(corner_target(10.0, &v, &graph, &c), 10.0);

        // Halfway through the window
        v.progress = 1.0 - (c.turn_lookahead * 0.5) / 100.0;
        let half = corner_target(10.0, &v, &graph, &c);
        assert!((half - (10.0 + c.turn_speed) * 0.5).abs() < 1e-3);

        // At the intersection
        v.progress = 1.0;
        assert!((corner_target(10.0, &v, &graph, &c) - c.turn_speed).abs() < 1e-4);
    }

    #[test]
    fn dead_end_blends_toward_zero() {
        let (graph, west, main, _, _) = junction();
        let c = config();
        let mut v = Vehicle::on_edge(&graph, main, west, 1.0, Color::WHITE).unwrap();
        v.next_edge = None;
        assert_eq!(corner_target(10.0, &v, &graph, &c), 0.0);
    }

    #[test]
    fn yield_only_lowers_target() {
        let c = config();
        assert_eq!(yield_target(10.0, 10.0, None, &c), 10.0);
        assert_eq!(yield_target(10.0, 10.0, Some(c.stop_distance - 0.1), &c), 0.0);
        assert_eq!(yield_target(2.0, 10.0, Some(c.detection_distance), &c), 2.0);

        let mid = c.stop_distance + (c.detection_distance - c.stop_distance) * 0.5;
        assert!((yield_target(10.0, 10.0, Some(mid), &c) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn brakes_faster_than_it_accelerates() {
        let c = config();
        let dt = 1.0 / 60.0;
        let gained = ease_speed(0.0, 10.0, dt, &c);
        let lost = 10.0 - ease_speed(10.0, 0.0, dt, &c);
        assert!(lost > gained);
        assert!(gained > 0.0);
    }

    #[test]
    fn easing_never_overshoots_or_goes_negative() {
        let c = config();
        assert_eq!(ease_speed(10.0, 0.0, 10.0, &c), 0.0);
        assert_eq!(ease_speed(0.0, 8.0, 10.0, &c), 8.0);
        assert!(ease_speed(1.0, 0.0, 1.0 / 60.0, &c) >= 0.0);
    }

    #[test]
    fn stall_timer_resets_when_moving() {
        let (graph, west, main, _, _) = junction();
        let c = config();
        let mut v = Vehicle::on_edge(&graph, main, west, 0.5, Color::WHITE).unwrap();

        v.speed = 0.0;
        assert!(!track_stall(&mut v, c.stall_time * 0.6, &c));
        v.speed = 5.0;
        assert!(!track_stall(&mut v, 0.1, &c));
        assert_eq!(v.stuck_timer, 0.0);

        v.speed = 0.0;
        assert!(!track_stall(&mut v, c.stall_time * 0.6, &c));
        assert!(track_stall(&mut v, c.stall_time * 0.6, &c));
    }
}
