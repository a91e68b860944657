use std::{
    fs,
    path::{Path, PathBuf},
};

use bevy::math::IVec2;
use thiserror::Error;

use crate::config::{CELL, MAP_ORIGIN};

const BLOCK: char = '#';

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rows of map characters, top row first. Rows may differ in length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapGrid {
    rows: Vec<Vec<char>>,
}

impl MapGrid {
    /// Splits on line breaks. A last row without a terminator is kept, a
    /// terminator at the very end does not open an extra empty row.
    pub fn parse(text: &str) -> Self {
        let rows = text.lines().map(|line| line.chars().collect()).collect();
        Self { rows }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MapError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// World positions of every `#` cell, in reading order.
    pub fn obstacles(&self) -> Vec<IVec2> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(row, line)| {
                line.iter()
                    .enumerate()
                    .filter(|&(_, &c)| c == BLOCK)
                    .map(move |(col, _)| cell_to_world(col as i32, row as i32))
            })
            .collect()
    }
}

pub fn cell_to_world(col: i32, row: i32) -> IVec2 {
    IVec2::new(col * CELL - MAP_ORIGIN, MAP_ORIGIN - row * CELL)
}
