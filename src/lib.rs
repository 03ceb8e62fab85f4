//! Road traffic for a 3D driving game.
//!
//! Autonomous vehicles follow a road graph, yield to each other and to the
//! player, slow for turns, and are spawned and removed around the player as
//! they drive through the city.

pub mod player;
pub mod road;
pub mod traffic;
