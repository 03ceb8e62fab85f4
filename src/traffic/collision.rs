//! Contact queries between a point (usually the player) and traffic.

use bevy::prelude::*;

use super::vehicle::TrafficPool;

/// Result of hitting a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrafficHit {
    /// Unit direction from the struck car toward the query point. Zero when
    /// the query point is exactly on the car.
    pub push: Vec2,
    /// The car's speed before the impact penalty.
    pub impact_speed: f32,
    /// Slot of the struck car.
    pub slot: usize,
}

impl TrafficPool {
    /// Check the point `(x, z)` against every active vehicle, in pool order.
    ///
    /// The first vehicle closer than `radius` is struck: its speed is halved
    /// once and the push direction and pre-impact speed are returned. Other
    /// simultaneous contacts are not reported.
    pub fn collide(&mut self, x: f32, z: f32, radius: f32) -> Option<TrafficHit> {
        let point = Vec2::new(x, z);
        let radius_sq = radius * radius;

        for (slot, vehicle) in self.iter_active_mut() {
            let offset = point - Vec2::new(vehicle.position.x, vehicle.position.z);
            if offset.length_squared() >= radius_sq {
                continue;
            }

            let impact_speed = vehicle.speed;
            vehicle.speed *= 0.5;
            return Some(TrafficHit {
                push: offset.normalize_or_zero(),
                impact_speed,
                slot,
            });
        }
        None
    }

    /// Whether any active vehicle is closer than `radius` to `(x, z)`.
    /// Read-only counterpart of [`TrafficPool::collide`] used to probe spawn points.
    pub fn is_occupied(&self, x: f32, z: f32, radius: f32) -> bool {
        let point = Vec2::new(x, z);
        self.iter_active()
            .any(|(_, v)| point.distance_squared(Vec2::new(v.position.x, v.position.z)) < radius * radius)
    }
}
