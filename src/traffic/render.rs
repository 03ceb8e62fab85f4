//! Gizmo rendering for traffic. Read-only with respect to the vehicle pool.

use bevy::prelude::*;

use super::vehicle::{BodyStyle, TrafficPool, Vehicle};
use super::{TrafficConfig, TrafficSet, TrafficSim};

pub struct TrafficRenderPlugin;

impl Plugin for TrafficRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TrafficDebug>().add_systems(
            Update,
            (toggle_traffic_debug, render_traffic, render_traffic_debug)
                .chain()
                .after(TrafficSet::Simulate),
        );
    }
}

/// Debug overlay toggle (F3).
#[derive(Resource, Default)]
pub struct TrafficDebug {
    pub show_detection: bool,
}

/// Vehicles are modelled small; scale them up to road size.
const BODY_SCALE: f32 = 2.0;
/// Below this speed the brake lights are on.
const BRAKE_LIGHT_SPEED: f32 = 3.0;

/// Box dimensions for one body style, in model units.
struct BodyShape {
    chassis: Vec3,
    cabin: Vec3,
    cabin_offset: Vec3,
}

impl BodyShape {
    fn of(style: BodyStyle) -> Self {
        match style {
            BodyStyle::Sedan => Self {
                chassis: Vec3::new(0.7, 0.35, 1.3),
                cabin: Vec3::new(0.6, 0.3, 0.7),
                cabin_offset: Vec3::new(0.0, 0.3, -0.1),
            },
            BodyStyle::Van => Self {
                chassis: Vec3::new(0.75, 0.4, 1.5),
                cabin: Vec3::new(0.65, 0.4, 1.1),
                cabin_offset: Vec3::new(0.0, 0.35, 0.1),
            },
            BodyStyle::Truck => Self {
                chassis: Vec3::new(0.7, 0.35, 1.9),
                cabin: Vec3::new(0.6, 0.4, 0.6),
                cabin_offset: Vec3::new(0.0, 0.35, 0.5),
            },
        }
    }
}

/// Body transform: model +Z points along the vehicle's heading.
fn body_transform(vehicle: &Vehicle) -> Transform {
    let yaw = vehicle.forward.x.atan2(vehicle.forward.z);
    Transform::from_translation(vehicle.position)
        .with_rotation(Quat::from_rotation_y(yaw))
        .with_scale(Vec3::splat(BODY_SCALE))
}

/// A box of `size` at `local` in the body's model space.
fn part(body: &Transform, local: Vec3, size: Vec3) -> Transform {
    Transform::from_translation(body.transform_point(local))
        .with_rotation(body.rotation)
        .with_scale(size * body.scale)
}

/// Draw every active vehicle.
pub fn draw_traffic(pool: &TrafficPool, gizmos: &mut Gizmos) {
    let glass = Color::srgba(0.4, 0.7, 1.0, 0.7);
    let headlight = Color::srgb(0.96, 0.96, 0.96);
    let brake_light = Color::srgb(0.9, 0.1, 0.1);

    for (slot, vehicle) in pool.iter_active() {
        let shape = BodyShape::of(BodyStyle::for_slot(slot));
        let body = body_transform(vehicle);
        let paint = vehicle.color.to_srgba();
        let cabin_color = Color::srgba(paint.red, paint.green, paint.blue, 0.8);

        gizmos.cuboid(part(&body, Vec3::ZERO, shape.chassis), vehicle.color);
        gizmos.cuboid(part(&body, shape.cabin_offset, shape.cabin), cabin_color);

        // Windshield at the front of the cabin
        let windshield = shape.cabin_offset + Vec3::Z * shape.cabin.z * 0.45;
        gizmos.cuboid(
            part(&body, windshield, Vec3::new(shape.cabin.x * 1.02, shape.cabin.y * 0.6, 0.05)),
            glass,
        );

        let front = shape.chassis.z * 0.5;
        let back = -front;
        for side in [-0.25, 0.25] {
            gizmos.cuboid(
                part(&body, Vec3::new(side, 0.0, front), Vec3::new(0.2, 0.15, 0.02)),
                headlight,
            );
            if vehicle.speed < BRAKE_LIGHT_SPEED {
                gizmos.cuboid(
                    part(&body, Vec3::new(side, 0.05, back), Vec3::new(0.15, 0.1, 0.05)),
                    brake_light,
                );
            }
        }
    }
}

fn render_traffic(sim: Res<TrafficSim>, mut gizmos: Gizmos) {
    draw_traffic(&sim.pool, &mut gizmos);
}

fn toggle_traffic_debug(keyboard: Res<ButtonInput<KeyCode>>, mut debug: ResMut<TrafficDebug>) {
    if keyboard.just_pressed(KeyCode::F3) {
        debug.show_detection = !debug.show_detection;
        let show_detection = debug.show_detection;
        info!("Traffic debug overlay: {}", show_detection);
    }
}

/// Stop distance and detection window ahead of each vehicle. The far part
/// is red when held at zero, orange while braking, green otherwise.
fn render_traffic_debug(
    sim: Res<TrafficSim>,
    config: Res<TrafficConfig>,
    debug: Res<TrafficDebug>,
    mut gizmos: Gizmos,
) {
    if !debug.show_detection {
        return;
    }

    for (_, vehicle) in sim.pool.iter_active() {
        let start = vehicle.position;
        let stop = start + vehicle.forward * config.stop_distance;
        let reach = start + vehicle.forward * config.detection_distance;

        let color = if vehicle.target_speed <= f32::EPSILON {
            Color::srgb(1.0, 0.0, 0.0)
        } else if vehicle.target_speed < vehicle.speed {
            Color::srgb(1.0, 0.6, 0.0)
        } else {
            Color::srgb(0.0, 1.0, 0.3)
        };

        gizmos.line(start, stop, Color::srgb(1.0, 0.0, 0.0));
        gizmos.line(stop, reach, color);
    }
}
