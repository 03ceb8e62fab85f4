//! Traffic demo: drive a car through a street grid full of autonomous traffic.

use bevy::prelude::*;

use roadtraffic::player::PlayerPlugin;
use roadtraffic::road::grid::{build_grid, GridLayout};
use roadtraffic::road::{RoadGraph, RoadPlugin};
use roadtraffic::traffic::{TrafficPlugin, TrafficRenderPlugin};

fn main() {
    // Force Vulkan backend on Windows (DX12 causes crashes on some systems)
    #[cfg(target_os = "windows")]
    std::env::set_var("WGPU_BACKEND", "vulkan");

    let mut road_graph = RoadGraph::default();
    build_grid(&mut road_graph, &GridLayout::default());

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Road Traffic".into(),
                resolution: (1280., 720.).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.12, 0.13, 0.15)))
        .insert_resource(road_graph)
        // Road network
        .add_plugins(RoadPlugin)
        // Traffic simulation and drawing
        .add_plugins(TrafficPlugin)
        .add_plugins(TrafficRenderPlugin)
        // Player car and camera
        .add_plugins(PlayerPlugin)
        .run();
}
