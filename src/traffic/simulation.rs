//! Per-frame traffic update.
//!
//! Each call spawns on the population timer, snapshots every vehicle into the
//! obstacle index, then advances each vehicle reading only that snapshot, and
//! finally culls vehicles outside the despawn radius.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::road::RoadGraph;

use super::navigation::find_next_edge;
use super::obstacles::{distance_to_player, ObstacleIndex};
use super::population::{despawn_distant, try_spawn, vehicle_from_node, Population};
use super::speed::{corner_target, cruise_speed, ease_speed, track_stall, yield_target};
use super::vehicle::{TrafficPool, Vehicle};
use super::TrafficConfig;

/// Running counters for the traffic simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Vehicles active after the last update.
    pub active: usize,
    pub spawned: u64,
    /// Removed for leaving the despawn radius.
    pub despawned: u64,
    /// Removed by the stall timer.
    pub stalled: u64,
    /// Removed because their road vanished from the graph.
    pub lost: u64,
    pub collisions: u64,
}

/// What happened to a vehicle during its update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fate {
    Driving,
    Stalled,
    Lost,
}

/// The traffic engine: vehicle pool plus everything needed to advance it.
#[derive(Resource)]
pub struct TrafficSim {
    pub pool: TrafficPool,
    pub stats: TrafficStats,
    population: Population,
    obstacles: ObstacleIndex,
    rng: StdRng,
    graph_missing: bool,
}

impl FromWorld for TrafficSim {
    fn from_world(world: &mut World) -> Self {
        let config = world.get_resource_or_insert_with(TrafficConfig::default);
        Self::new(&config)
    }
}

impl TrafficSim {
    /// Empty pool sized and seeded from `config`.
    pub fn new(config: &TrafficConfig) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(config.seed))
    }

    pub fn with_rng(config: &TrafficConfig, rng: StdRng) -> Self {
        Self {
            pool: TrafficPool::new(config.capacity),
            stats: TrafficStats::default(),
            population: Population::default(),
            obstacles: ObstacleIndex::default(),
            rng,
            graph_missing: false,
        }
    }

    /// Free every slot and reset the counters.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.stats = TrafficStats::default();
        self.population = Population::default();
    }

    /// Advance the simulation by `dt` seconds around `reference`, which is
    /// both the population centre and the player the cars yield to.
    pub fn update(&mut self, config: &TrafficConfig, graph: &RoadGraph, reference: Vec3, dt: f32) {
        if !graph.is_drivable() {
            if !self.graph_missing {
                warn!("Road graph is empty, traffic paused");
                self.graph_missing = true;
            }
            return;
        }
        if self.graph_missing {
            info!("Road graph available, traffic resumed");
            self.graph_missing = false;
        }

        if self.population.tick(dt, config)
            && try_spawn(&mut self.pool, graph, reference, config, &mut self.rng).is_some()
        {
            self.stats.spawned += 1;
        }

        self.obstacles.rebuild(&self.pool);

        for slot in 0..self.pool.capacity() {
            let Some(vehicle) = self.pool.get_mut(slot) else {
                continue;
            };

            let fate = step_vehicle(
                vehicle,
                slot,
                &self.obstacles,
                graph,
                reference,
                dt,
                config,
                &mut self.rng,
            );

            match fate {
                Fate::Driving => {}
                Fate::Stalled => {
                    debug!("Vehicle in slot {} stalled, removing", slot);
                    self.pool.release(slot);
                    self.stats.stalled += 1;
                }
                Fate::Lost => {
                    debug!("Vehicle in slot {} lost its road, removing", slot);
                    self.pool.release(slot);
                    self.stats.lost += 1;
                }
            }
        }

        self.stats.despawned += despawn_distant(&mut self.pool, reference, config) as u64;
        self.stats.active = self.pool.active_count();
    }

    /// Spawn a vehicle at the node closest to `point`, ignoring the spawn
    /// ring. Returns the slot used.
    pub fn spawn_near(&mut self, config: &TrafficConfig, graph: &RoadGraph, point: Vec2) -> Option<usize> {
        let slot = self.pool.free_slot()?;
        let node = graph.closest_node(point)?;
        let vehicle = vehicle_from_node(&self.pool, graph, node, config, &mut self.rng)?;

        info!("Debug spawn in slot {} at node {:?}", slot, node);
        self.pool.insert(slot, vehicle);
        self.stats.spawned += 1;
        self.stats.active = self.pool.active_count();
        Some(slot)
    }

    /// Player contact query; see [`TrafficPool::collide`].
    pub fn collide(&mut self, x: f32, z: f32, radius: f32) -> Option<super::TrafficHit> {
        let hit = self.pool.collide(x, z, radius);
        if hit.is_some() {
            self.stats.collisions += 1;
        }
        hit
    }
}

/// Advance one vehicle: target speed, easing, stall check, progress,
/// segment transition and placement.
#[allow(clippy::too_many_arguments)]
fn step_vehicle(
    vehicle: &mut Vehicle,
    slot: usize,
    obstacles: &ObstacleIndex,
    graph: &RoadGraph,
    player: Vec3,
    dt: f32,
    config: &TrafficConfig,
    rng: &mut StdRng,
) -> Fate {
    let Some(edge) = graph.edge_by_index(vehicle.current_edge) else {
        return Fate::Lost;
    };
    if graph.other_endpoint(vehicle.current_edge, vehicle.start_node) != Some(vehicle.end_node) {
        return Fate::Lost;
    }

    // Target speed, only ever tightened
    let cruise = cruise_speed(edge, config);
    let mut target = corner_target(cruise, vehicle, graph, config);

    let car_ahead = obstacles.distance_to_vehicle_ahead(
        slot,
        vehicle.position,
        vehicle.forward,
        vehicle.current_edge,
        vehicle.next_edge,
        config,
    );
    target = yield_target(target, cruise, car_ahead, config);

    let player_ahead = distance_to_player(vehicle.position, vehicle.forward, player, config);
    target = yield_target(target, cruise, player_ahead, config);

    vehicle.target_speed = target;
    vehicle.speed = ease_speed(vehicle.speed, target, dt, config);

    if track_stall(vehicle, dt, config) {
        return Fate::Stalled;
    }

    // Movement along the edge
    if vehicle.edge_length > f32::EPSILON {
        vehicle.progress += vehicle.speed * dt / vehicle.edge_length;
    } else {
        vehicle.progress = 1.0;
    }

    if vehicle.progress >= 1.0 {
        // Without a committed edge, drive the current one back the other way
        let next = vehicle.next_edge.unwrap_or(vehicle.current_edge);
        if !vehicle.enter_edge(graph, next) {
            return Fate::Lost;
        }
        vehicle.next_edge = find_next_edge(graph, vehicle.end_node, Some(vehicle.current_edge), rng);
    }

    if vehicle.place(graph, config) {
        Fate::Driving
    } else {
        Fate::Lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::road::RoadEdge;
    use petgraph::graph::{EdgeIndex, NodeIndex};

    const DT: f32 = 1.0 / 60.0;

    fn sim(config: &TrafficConfig) -> TrafficSim {
        TrafficSim::with_rng(config, StdRng::seed_from_u64(42))
    }

    /// Reference point far enough that nothing spawns around a graph near the
    /// origin, but close enough that nothing despawns either.
    fn quiet_reference(config: &TrafficConfig) -> Vec3 {
        Vec3::new(0.0, 0.0, config.spawn_radius_max + 50.0)
    }

    fn put(sim: &mut TrafficSim, graph: &RoadGraph, slot: usize, edge: EdgeIndex, from: NodeIndex, progress: f32) {
        let config = TrafficConfig::default();
        let mut v = Vehicle::on_edge(graph, edge, from, progress, Color::WHITE).unwrap();
        v.place(graph, &config);
        assert!(sim.pool.insert(slot, v));
    }

    /// Single straight two-way street. Limit 10 / 0.35 gives a cruise of 10.
    fn straight() -> (RoadGraph, NodeIndex, NodeIndex, EdgeIndex) {
        let mut graph = RoadGraph::default();
        let a = graph.add_node(Vec2::new(0.0, 0.0));
        let b = graph.add_node(Vec2::new(60.0, 0.0));
        let e = graph.add_edge(a, b, RoadEdge::two_way(4.0, 10.0 / 0.35));
        (graph, a, b, e)
    }

    #[test]
    fn empty_graph_is_a_no_op() {
        let config = TrafficConfig::default();
        let mut s = sim(&config);
        s.update(&config, &RoadGraph::default(), Vec3::ZERO, 1.0);
        assert_eq!(s.pool.active_count(), 0);
        assert_eq!(s.stats, TrafficStats::default());
    }

    #[test]
    fn straight_edge_transition_turns_around() {
        let config = TrafficConfig::default();
        let (graph, a, b, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.0);
        s.pool.get_mut(0).unwrap().next_edge = find_next_edge(&graph, b, Some(e), &mut StdRng::seed_from_u64(1));
        assert_eq!(s.pool.get(0).unwrap().next_edge, Some(e));

        let reference = quiet_reference(&config);
        let mut last_progress = 0.0;
        let mut transitioned = false;
        for _ in 0..60 * 60 {
            s.update(&config, &graph, reference, DT);
            let v = s.pool.get(0).expect("vehicle should keep driving");
            assert!(v.target_speed <= 10.0 + 1e-3);
            if v.start_node == b {
                transitioned = true;
                assert_eq!(v.current_edge, e);
                assert_eq!(v.end_node, a);
                assert!(v.progress < last_progress);
                assert_eq!(v.next_edge, Some(e));
                break;
            }
            last_progress = v.progress;
        }
        assert!(transitioned);
    }

    #[test]
    fn progress_is_monotonic_within_a_segment() {
        let config = TrafficConfig::default();
        let (graph, a, _, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.0);

        let reference = quiet_reference(&config);
        let mut last = 0.0;
        for _ in 0..120 {
            s.update(&config, &graph, reference, DT);
            let v = s.pool.get(0).unwrap();
            assert!(v.progress >= last);
            assert!(v.speed >= 0.0);
            last = v.progress;
        }
    }

    #[test]
    fn trailing_car_yields_to_leader() {
        let config = TrafficConfig::default();
        let (graph, a, _, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.10);
        put(&mut s, &graph, 1, e, a, 0.10 + 5.0 / 60.0);
        for slot in 0..2 {
            s.pool.get_mut(slot).unwrap().speed = 10.0;
        }

        s.update(&config, &graph, quiet_reference(&config), DT);

        let trailing = s.pool.get(0).unwrap();
        let leading = s.pool.get(1).unwrap();
        assert!(trailing.target_speed < leading.speed);
        assert!(trailing.speed < leading.speed);
    }

    #[test]
    fn player_in_stop_distance_forces_zero_target() {
        let config = TrafficConfig::default();
        let (graph, a, _, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.5);
        s.pool.get_mut(0).unwrap().speed = 10.0;

        let car = s.pool.get(0).unwrap().position;
        let player = car + Vec3::X * (config.stop_distance * 0.5);
        s.update(&config, &graph, player, DT);

        assert_eq!(s.pool.get(0).unwrap().target_speed, 0.0);
    }

    #[test]
    fn blocked_vehicle_stalls_out() {
        let config = TrafficConfig::default();
        let (graph, a, _, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.5);

        let car = s.pool.get(0).unwrap().position;
        let player = car + Vec3::X * 2.0;
        let frames = ((config.stall_time + 1.0) / DT) as usize;
        for _ in 0..frames {
            s.update(&config, &graph, player, DT);
        }

        assert!(!s.pool.is_active(0));
        assert_eq!(s.stats.stalled, 1);
    }

    #[test]
    fn vehicles_leave_when_far_from_reference() {
        let config = TrafficConfig::default();
        let (graph, a, _, e) = straight();
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.5);

        s.update(&config, &graph, Vec3::new(0.0, 0.0, config.despawn_radius + 100.0), DT);
        assert_eq!(s.pool.active_count(), 0);
        assert_eq!(s.stats.despawned, 1);
    }

    #[test]
    fn removed_road_removes_its_vehicles() {
        let config = TrafficConfig::default();
        let (mut graph, a, _, e) = straight();
        let c = graph.add_node(Vec2::new(0.0, 60.0));
        graph.add_edge(a, c, RoadEdge::two_way(4.0, 30.0));
        let mut s = sim(&config);
        put(&mut s, &graph, 0, e, a, 0.5);

        // Removing swaps the last edge into `e`'s index, which no longer
        // touches the vehicle's nodes
        graph.graph.remove_edge(e);
        s.update(&config, &graph, quiet_reference(&config), DT);
        assert_eq!(s.pool.active_count(), 0);
        assert_eq!(s.stats.lost, 1);
    }

    #[test]
    fn grid_traffic_respects_invariants() {
        use crate::road::grid::{build_grid, GridLayout};

        let config = TrafficConfig::default();
        let mut graph = RoadGraph::default();
        build_grid(&mut graph, &GridLayout::default());
        let mut s = sim(&config);

        let mut reference = Vec3::ZERO;
        for frame in 0..60 * 30 {
            // Sweep the reference point so vehicles both spawn and despawn
            reference.x = (frame as f32 * 0.2).min(150.0);
            s.update(&config, &graph, reference, DT);

            for (_, v) in s.pool.iter_active() {
                assert!(graph.edge_by_index(v.current_edge).is_some());
                assert!((0.0..=1.0).contains(&v.progress));
                assert!(v.speed >= 0.0);

                let dx = v.position.x - reference.x;
                let dz = v.position.z - reference.z;
                assert!(dx * dx + dz * dz <= config.despawn_radius * config.despawn_radius);
            }
        }
        assert!(s.stats.spawned > 0);
    }

    #[test]
    fn debug_spawn_uses_closest_node() {
        let config = TrafficConfig::default();
        let (graph, a, _, _) = straight();
        let mut s = sim(&config);

        let slot = s.spawn_near(&config, &graph, Vec2::new(-5.0, 1.0)).unwrap();
        let v = s.pool.get(slot).unwrap();
        assert!(v.start_node == a || v.end_node == a);
        assert_eq!(s.stats.spawned, 1);
    }
}
