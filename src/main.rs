use std::io;

use anyhow::{Context, Result};
use bevy::prelude::*;
use clap::Parser;

mod config;
mod game;
mod map;
mod rules;

fn main() -> Result<()> {
    let cli = config::Cli::parse();

    let difficulty = match cli.difficulty {
        Some(difficulty) => difficulty,
        None => config::prompt_difficulty(&mut io::stdin().lock(), &mut io::stdout())
            .context("failed to read the difficulty")?,
    };
    let grid = map::MapGrid::load(cli.map_path())?;

    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(game::window()),
        ..Default::default()
    }));

    #[cfg(feature = "debug")]
    app.add_plugins(bevy_inspector_egui::bevy_egui::EguiPlugin {
        enable_multipass_for_primary_context: true,
    })
    .add_plugins(bevy_inspector_egui::quick::WorldInspectorPlugin::new());

    app.add_plugins(game::TurtleGame::new(difficulty, grid.obstacles()));

    app.run();
    println!("\n{}", config::FAREWELL);
    Ok(())
}
