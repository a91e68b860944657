use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Duration,
};

use bevy::{asset::io::file::FileAssetReader, math::IVec2};
use clap::{Parser, ValueEnum};

/// Distance the leader travels on every tick.
pub const STEP: i32 = 20;
/// Largest coordinate magnitude still considered on screen.
pub const BOUND: i32 = 290;
/// Two things closer than this are touching.
pub const CLEARANCE: i32 = 20;
/// Side length of one map cell in world units.
pub const CELL: i32 = 20;
/// World coordinate of the map's top left corner.
pub const MAP_ORIGIN: i32 = 300;

pub const ORIGIN: IVec2 = IVec2::ZERO;
pub const FOOD_START: IVec2 = IVec2::new(0, 100);

pub const RESET_PAUSE: Duration = Duration::from_secs(1);
pub const DELAY_DECREMENT_MS: i64 = 1;
pub const FOOD_ATTEMPTS: usize = 10_000;

pub const SCREEN_WIDTH: f32 = 600.0;
pub const SCREEN_HEIGHT: f32 = 600.0;
pub const TITLE: &str = "Turtle Game";

pub const FAREWELL: &str = "Falou, até!";

const MAP_FILE: &str = "assets/map.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Tick delay in milliseconds at the start of every life.
    pub fn delay_ms(self) -> i64 {
        match self {
            Difficulty::Easy => 100,
            Difficulty::Medium => 75,
            Difficulty::Hard => 50,
        }
    }

    /// Matches a prompt answer. Only the capitalized and the lowercase spelling
    /// are accepted, nothing is trimmed.
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer {
            "Facil" | "facil" => Some(Difficulty::Easy),
            "Medio" | "medio" => Some(Difficulty::Medium),
            "Dificil" | "dificil" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Asks for a difficulty until a valid answer arrives.
pub fn prompt_difficulty<R, W>(input: &mut R, output: &mut W) -> io::Result<Difficulty>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Bem vindo ao Turtle!")?;
    loop {
        writeln!(output, "Escolha entre as dificuldades Facil Medio e Dificil")?;
        write!(output, "Dificuldade desejada: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before a difficulty was chosen",
            ));
        }
        if let Some(difficulty) = Difficulty::from_answer(line.trim_end_matches(['\r', '\n'])) {
            return Ok(difficulty);
        }
        writeln!(output, "Dificuldade inválida, tente de novo \n")?;
    }
}

#[derive(Debug, Parser)]
#[command(name = "turtle_game")]
#[command(version, about = "Grow a turtle chain without hitting walls or yourself")]
pub struct Cli {
    /// Skip the prompt and start at this difficulty
    #[arg(long)]
    pub difficulty: Option<Difficulty>,

    /// Obstacle map to load instead of the bundled one
    #[arg(long)]
    pub map: Option<PathBuf>,
}

impl Cli {
    pub fn map_path(&self) -> PathBuf {
        self.map.clone().unwrap_or_else(|| FileAssetReader::get_base_path().join(MAP_FILE))
    }
}
