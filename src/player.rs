//! Minimal player car for the demo: keyboard driving, crashes into traffic,
//! and a follow camera. Traffic is populated around this entity.

use bevy::prelude::*;

use crate::road::RoadGraph;
use crate::traffic::{TrafficConfig, TrafficHit, TrafficObserver, TrafficSet, TrafficSim};

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PlayerConfig>()
            .add_systems(Startup, setup_player)
            .add_systems(
                Update,
                (drive_player, debug_spawn_traffic)
                    .chain()
                    .before(TrafficSet::Simulate),
            )
            .add_systems(Update, (follow_camera, render_player).after(TrafficSet::Simulate));
    }
}

/// Handling and crash parameters for the player car.
#[derive(Resource)]
pub struct PlayerConfig {
    pub max_speed: f32,
    pub reverse_speed: f32,
    pub acceleration: f32,
    pub drag: f32,
    /// Degrees per second at full lock.
    pub steer_rate: f32,
    /// Contact radius against traffic.
    pub radius: f32,
    /// Relative speed below which crashes do no damage.
    pub safe_impact: f32,
    pub damage_per_unit: f32,
    /// Speed multiplier applied on a crash (negative bounces back).
    pub bounce: f32,
    /// Distance the player is shoved out of a struck car.
    pub knockback: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            reverse_speed: 6.0,
            acceleration: 10.0,
            drag: 4.0,
            steer_rate: 120.0,
            radius: 2.4,
            safe_impact: 4.0,
            damage_per_unit: 3.0,
            bounce: -0.4,
            knockback: 0.3,
        }
    }
}

/// Player car state.
#[derive(Component)]
pub struct Player {
    /// Signed speed along the heading.
    pub speed: f32,
    /// Heading in degrees, 0 = +Z.
    pub heading: f32,
    pub health: i32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            speed: 0.0,
            heading: 0.0,
            health: 100,
        }
    }
}

#[derive(Component)]
struct FollowCamera;

/// Damage from hitting a car, based on the speed difference.
pub fn impact_damage(player_speed: f32, traffic_speed: f32, config: &PlayerConfig) -> i32 {
    let impact = (player_speed - traffic_speed).abs();
    if impact > config.safe_impact {
        ((impact - config.safe_impact) * config.damage_per_unit) as i32
    } else {
        0
    }
}

/// Apply a crash to the player: damage, bounce and a shove away from the car.
pub fn resolve_crash(player: &mut Player, translation: &mut Vec3, hit: TrafficHit, config: &PlayerConfig) {
    let damage = impact_damage(player.speed, hit.impact_speed, config);
    if damage > 0 {
        player.health = (player.health - damage).max(0);
        info!("Crashed into traffic: {} damage, health {}", damage, player.health);
    }
    player.speed *= config.bounce;
    translation.x += hit.push.x * config.knockback;
    translation.z += hit.push.y * config.knockback;
}

fn setup_player(mut commands: Commands, road_graph: Res<RoadGraph>) {
    let start = road_graph
        .closest_node(Vec2::ZERO)
        .and_then(|n| road_graph.node_position(n))
        .unwrap_or(Vec2::ZERO);

    commands.spawn((
        Player::default(),
        TrafficObserver,
        Transform::from_xyz(start.x, 0.5, start.y),
    ));

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(start.x, 25.0, start.y - 30.0).looking_at(Vec3::new(start.x, 0.0, start.y), Vec3::Y),
        FollowCamera,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(50.0, 100.0, 50.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Keyboard driving, moving one axis at a time so a crash on one axis still
/// lets the other slide.
fn drive_player(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    config: Res<PlayerConfig>,
    traffic_config: Res<TrafficConfig>,
    mut sim: ResMut<TrafficSim>,
    mut query: Query<(&mut Player, &mut Transform)>,
) {
    let dt = time.delta_secs().min(traffic_config.max_frame_dt);

    for (mut player, mut transform) in &mut query {
        let mut throttle = 0.0;
        if keys.pressed(KeyCode::KeyW) || keys.pressed(KeyCode::ArrowUp) {
            throttle += 1.0;
        }
        if keys.pressed(KeyCode::KeyS) || keys.pressed(KeyCode::ArrowDown) {
            throttle -= 1.0;
        }

        let mut steer = 0.0;
        if keys.pressed(KeyCode::KeyA) || keys.pressed(KeyCode::ArrowLeft) {
            steer += 1.0;
        }
        if keys.pressed(KeyCode::KeyD) || keys.pressed(KeyCode::ArrowRight) {
            steer -= 1.0;
        }

        if throttle != 0.0 {
            player.speed += throttle * config.acceleration * dt;
        } else {
            // Coast down toward zero
            let slowed = player.speed.abs() - config.drag * dt;
            player.speed = player.speed.signum() * slowed.max(0.0);
        }
        player.speed = player.speed.clamp(-config.reverse_speed, config.max_speed);

        // Steering only bites while moving
        let grip = (player.speed.abs() / config.max_speed).min(1.0);
        player.heading += steer * config.steer_rate * grip * dt * player.speed.signum();

        let heading = player.heading.to_radians();
        let step = Vec2::new(heading.sin(), heading.cos()) * player.speed * dt;

        for axis in [Vec2::X, Vec2::Y] {
            let amount = step.dot(axis);
            if amount == 0.0 {
                continue;
            }
            let test = Vec2::new(transform.translation.x, transform.translation.z) + axis * amount;

            match sim.collide(test.x, test.y, config.radius) {
                None => {
                    transform.translation.x = test.x;
                    transform.translation.z = test.y;
                }
                Some(hit) => {
                    let mut translation = transform.translation;
                    resolve_crash(&mut player, &mut translation, hit, &config);
                    transform.translation = translation;
                }
            }
        }

        transform.rotation = Quat::from_rotation_y(heading);
    }
}

/// `T` drops a vehicle at the closest intersection.
fn debug_spawn_traffic(
    keys: Res<ButtonInput<KeyCode>>,
    config: Res<TrafficConfig>,
    road_graph: Res<RoadGraph>,
    mut sim: ResMut<TrafficSim>,
    query: Query<&Transform, With<Player>>,
) {
    if !keys.just_pressed(KeyCode::KeyT) {
        return;
    }
    let Ok(transform) = query.get_single() else {
        return;
    };

    let at = Vec2::new(transform.translation.x, transform.translation.z);
    if sim.spawn_near(&config, &road_graph, at).is_none() {
        warn!("Debug spawn failed: pool full or spawn point occupied");
    }
}

fn follow_camera(
    time: Res<Time>,
    player: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    mut camera: Query<&mut Transform, With<FollowCamera>>,
) {
    let Ok(target) = player.get_single() else {
        return;
    };
    let Ok(mut camera) = camera.get_single_mut() else {
        return;
    };

    let back = target.rotation * Vec3::NEG_Z;
    let desired = target.translation + back * 30.0 + Vec3::Y * 25.0;
    let t = (5.0 * time.delta_secs()).min(1.0);
    camera.translation = camera.translation.lerp(desired, t);
    camera.look_at(target.translation, Vec3::Y);
}

fn render_player(query: Query<(&Transform, &Player)>, mut gizmos: Gizmos) {
    for (transform, player) in &query {
        let color = if player.health > 30 {
            Color::srgb(0.2, 0.4, 1.0)
        } else {
            Color::srgb(1.0, 0.3, 0.1)
        };
        gizmos.cuboid(
            Transform::from_translation(transform.translation)
                .with_rotation(transform.rotation)
                .with_scale(Vec3::new(1.6, 0.8, 3.0)),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gentle_bumps_do_no_damage() {
        let config = PlayerConfig::default();
        assert_eq!(impact_damage(10.0, 8.0, &config), 0);
        assert_eq!(impact_damage(10.0, 0.0, &config), 18);
        assert_eq!(impact_damage(-6.0, 4.0, &config), 18);
    }

    #[test]
    fn crash_bounces_and_pushes_player() {
        let config = PlayerConfig::default();
        let mut player = Player {
            speed: 15.0,
            ..default()
        };
        let mut translation = Vec3::ZERO;
        let hit = TrafficHit {
            push: Vec2::new(0.0, -1.0),
            impact_speed: 0.0,
            slot: 0,
        };

        resolve_crash(&mut player, &mut translation, hit, &config);

        assert_eq!(player.health, 100 - 33);
        assert!((player.speed + 6.0).abs() < 1e-4);
        assert!((translation.z + config.knockback).abs() < 1e-5);
    }
}
