//! Autonomous road traffic.
//!
//! Vehicles live in a fixed pool, follow the road graph with randomized
//! route continuation, slow for turns, cars and the player ahead, and are
//! spawned and removed around a moving reference point (the entity carrying
//! [`TrafficObserver`]).

use bevy::prelude::*;

pub mod collision;
pub mod navigation;
pub mod obstacles;
pub mod population;
pub mod render;
pub mod simulation;
pub mod speed;
pub mod vehicle;

pub use collision::TrafficHit;
pub use navigation::find_next_edge;
pub use render::TrafficRenderPlugin;
pub use simulation::{TrafficSim, TrafficStats};
pub use vehicle::{BodyStyle, TrafficPool, Vehicle};

use crate::road::RoadGraph;

pub struct TrafficPlugin;

impl Plugin for TrafficPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TrafficConfig>()
            .init_resource::<TrafficSim>()
            .configure_sets(Update, TrafficSet::Simulate)
            .add_systems(Update, update_traffic.in_set(TrafficSet::Simulate))
            .add_systems(Startup, log_traffic_config);
    }
}

/// Ordering anchor for systems that read or mutate the vehicle pool.
///
/// Player movement and collision queries run before it, drawing after it.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrafficSet {
    Simulate,
}

/// Marks the entity traffic is populated around and yields to.
#[derive(Component, Default)]
pub struct TrafficObserver;

/// Configuration for the traffic simulation.
#[derive(Resource, Clone, Debug)]
pub struct TrafficConfig {
    /// Number of vehicle slots.
    pub capacity: usize,
    /// Seconds between spawn attempts.
    pub spawn_interval: f32,
    /// Random nodes tried per spawn attempt.
    pub spawn_attempts: usize,
    /// Inner radius of the spawn ring.
    pub spawn_radius_min: f32,
    /// Outer radius of the spawn ring.
    pub spawn_radius_max: f32,
    /// Vehicles beyond this ground distance are removed.
    pub despawn_radius: f32,
    /// Progress along the edge where new vehicles appear.
    pub spawn_progress: f32,
    /// Clear radius required around a spawn point.
    pub spawn_clearance: f32,
    /// World height vehicles are placed at.
    pub road_height: f32,
    /// Converts edge speed limits to world units per second.
    pub speed_limit_scale: f32,
    /// Lowest cruise speed any edge yields.
    pub min_cruise_speed: f32,
    /// Distance before an intersection where turn slowdown begins.
    pub turn_lookahead: f32,
    /// Heading dot product below which a turn counts as sharp.
    pub turn_sharpness: f32,
    /// Target speed at the apex of a sharp turn.
    pub turn_speed: f32,
    /// How far ahead cars and the player are detected.
    pub detection_distance: f32,
    /// Obstacles closer than this force a full stop.
    pub stop_distance: f32,
    /// Cars whose heading dot product is below this are oncoming.
    pub oncoming_dot: f32,
    /// Minimum alignment between heading and the player direction.
    pub player_alignment: f32,
    /// Easing rate while speeding up.
    pub accel_rate: f32,
    /// Easing rate while slowing down.
    pub brake_rate: f32,
    /// Below this speed a vehicle counts as stuck.
    pub stall_speed: f32,
    /// Seconds stuck before a vehicle is removed.
    pub stall_time: f32,
    /// Lane centre offset as a fraction of road width (two-way roads).
    pub lane_offset: f32,
    /// Largest frame delta fed into one update.
    pub max_frame_dt: f32,
    /// Seed for spawn and route choices.
    pub seed: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            spawn_interval: 0.5,
            spawn_attempts: 20,
            spawn_radius_min: 100.0,
            spawn_radius_max: 200.0,
            despawn_radius: 300.0,
            spawn_progress: 0.1,
            spawn_clearance: 2.0,
            road_height: 0.5,
            speed_limit_scale: 0.35,
            min_cruise_speed: 4.0,
            turn_lookahead: 12.0,
            turn_sharpness: 0.7,
            turn_speed: 2.0,
            detection_distance: 15.0,
            stop_distance: 4.0,
            oncoming_dot: -0.5,
            player_alignment: 0.2,
            accel_rate: 3.0,  // Slow to pick up speed
            brake_rate: 12.0, // Quick to brake
            stall_speed: 0.2,
            stall_time: 5.0,
            lane_offset: 0.25,
            max_frame_dt: 0.1,
            seed: 77777,
        }
    }
}

fn log_traffic_config(config: Res<TrafficConfig>) {
    info!(
        "Traffic: {} slots, spawn ring {}-{}, despawn at {}",
        config.capacity, config.spawn_radius_min, config.spawn_radius_max, config.despawn_radius
    );
}

/// Advance traffic one frame around the observer.
fn update_traffic(
    time: Res<Time>,
    config: Res<TrafficConfig>,
    road_graph: Res<RoadGraph>,
    mut sim: ResMut<TrafficSim>,
    observer: Query<&Transform, With<TrafficObserver>>,
) {
    let Ok(observer) = observer.get_single() else {
        return;
    };

    let dt = time.delta_secs().min(config.max_frame_dt);
    if dt <= 0.0 {
        return;
    }

    sim.update(&config, &road_graph, observer.translation, dt);
}
