use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::env::{ram, GameBoy};

pub const GRID_ROWS: usize = 16;
pub const GRID_COLS: usize = 20;

// =============================================================================
// Tiles
// =============================================================================

/// Tile-class codes the expert cares about. Any other code is scenery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tile {
    Empty = 0,
    Player = 1,
    Coin = 5,
    Ground = 10,
    MysteryBlock = 13,
    Pipe = 14,
}

impl Tile {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn is_collectible(code: u8) -> bool {
        code == Tile::Coin.code() || code == Tile::MysteryBlock.code()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub row: usize,
    pub col: usize,
}

impl GridPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Which player tile the locator settles on when the sprite covers several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerAnchor {
    /// Last hit of the bottom-up, right-to-left scan (topmost row, leftmost column).
    #[default]
    LastScanned,
    /// First hit of the same scan (bottom row, rightmost column).
    FirstScanned,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileGrid {
    cells: [[u8; GRID_COLS]; GRID_ROWS],
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        if rows.len() != GRID_ROWS {
            bail!("tile grid must have {GRID_ROWS} rows, got {}", rows.len());
        }
        let mut grid = Self::new();
        for (r, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != GRID_COLS {
                bail!(
                    "tile grid row {r} must have {GRID_COLS} columns, got {}",
                    row.len()
                );
            }
            grid.cells[r].copy_from_slice(row);
        }
        Ok(grid)
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, code: u8) {
        self.cells[row][col] = code;
    }

    pub fn fill_row(&mut self, row: usize, code: u8) {
        self.cells[row] = [code; GRID_COLS];
    }

    pub fn is(&self, row: usize, col: usize, tile: Tile) -> bool {
        self.get(row, col) == tile.code()
    }

    /// Negative or oversized indices wrap around to the opposite edge.
    pub fn get_wrapped(&self, row: isize, col: isize) -> u8 {
        let r = row.rem_euclid(GRID_ROWS as isize) as usize;
        let c = col.rem_euclid(GRID_COLS as isize) as usize;
        self.cells[r][c]
    }

    /// True when every cell of the window holds `tile`. The window is clipped
    /// to the grid first; a window clipped down to nothing counts as a match.
    pub fn window_is(&self, rows: Range<usize>, cols: Range<usize>, tile: Tile) -> bool {
        let rows = rows.start.min(GRID_ROWS)..rows.end.min(GRID_ROWS);
        let cols = cols.start.min(GRID_COLS)..cols.end.min(GRID_COLS);
        rows.into_iter()
            .all(|r| self.cells[r][cols.clone()].iter().all(|&c| c == tile.code()))
    }

    pub fn column_is(&self, col: usize, tile: Tile) -> bool {
        self.cells.iter().all(|row| row[col] == tile.code())
    }

    /// Scan bottom-up, right-to-left. Every hit overwrites the previous one,
    /// so ties resolve to the topmost row and, within it, the leftmost column.
    pub fn scan_last(&self, mut hit: impl FnMut(u8) -> bool) -> Option<GridPos> {
        let mut found = None;
        for row in (0..GRID_ROWS).rev() {
            for col in (0..GRID_COLS).rev() {
                if hit(self.cells[row][col]) {
                    found = Some(GridPos::new(row, col));
                }
            }
        }
        found
    }

    /// Same traversal as [`TileGrid::scan_last`], stopping at the first hit.
    pub fn scan_first(&self, mut hit: impl FnMut(u8) -> bool) -> Option<GridPos> {
        for row in (0..GRID_ROWS).rev() {
            for col in (0..GRID_COLS).rev() {
                if hit(self.cells[row][col]) {
                    return Some(GridPos::new(row, col));
                }
            }
        }
        None
    }

    pub fn locate_player(&self, anchor: PlayerAnchor) -> Option<GridPos> {
        let is_player = |code| code == Tile::Player.code();
        match anchor {
            PlayerAnchor::LastScanned => self.scan_last(is_player),
            PlayerAnchor::FirstScanned => self.scan_first(is_player),
        }
    }

    pub fn find_collectible(&self) -> Option<GridPos> {
        self.scan_last(Tile::is_collectible)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8; GRID_COLS]> {
        self.cells.iter()
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.cells.iter().enumerate() {
            write!(f, "{r:2} |")?;
            for code in row {
                write!(f, " {code:3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileGrid\n{self}")
    }
}

// =============================================================================
// Object Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    GroundEnemy,
    ShelledEnemy,
    Bat,
    Bee,
    Powerup,
}

impl EntityKind {
    pub fn classify(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(EntityKind::GroundEnemy),
            0x04 => Some(EntityKind::ShelledEnemy),
            0x0E => Some(EntityKind::Bat),
            0x42 => Some(EntityKind::Bee),
            0x28 | 0x29 | 0x2C | 0x34 => Some(EntityKind::Powerup),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::GroundEnemy => "ground_enemy",
            EntityKind::ShelledEnemy => "shelled_enemy",
            EntityKind::Bat => "bat",
            EntityKind::Bee => "bee",
            EntityKind::Powerup => "powerup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSlot {
    pub kind: u8,
    pub x: u8,
    pub y: u8,
}

impl ObjectSlot {
    pub const EMPTY: ObjectSlot = ObjectSlot {
        kind: ram::EMPTY_SLOT,
        x: 0,
        y: 0,
    };

    pub const fn new(kind: u8, x: u8, y: u8) -> Self {
        Self { kind, x, y }
    }

    pub fn entity(&self) -> Option<EntityKind> {
        EntityKind::classify(self.kind)
    }
}

impl Default for ObjectSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

// =============================================================================
// Observation
// =============================================================================

/// One decision cycle's view of the game. Built fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub grid: TileGrid,
    pub world_x: i32,
    pub player_x: u8,
    pub player_y: u8,
    pub on_ground: u8,
    pub power_state: u8,
    pub objects: [ObjectSlot; ram::OBJECT_SLOTS],
}

impl Observation {
    pub fn capture<G: GameBoy + ?Sized>(gb: &G) -> Self {
        let mut objects = [ObjectSlot::EMPTY; ram::OBJECT_SLOTS];
        for (i, slot) in objects.iter_mut().enumerate() {
            *slot = ObjectSlot {
                kind: gb.peek(ram::object_addr(i, ram::OBJECT_TYPE)),
                x: gb.peek(ram::object_addr(i, ram::OBJECT_X)),
                y: gb.peek(ram::object_addr(i, ram::OBJECT_Y)),
            };
        }
        Self {
            grid: gb.game_area(),
            world_x: gb.x_position(),
            player_x: gb.peek(ram::PLAYER_X),
            player_y: gb.peek(ram::PLAYER_Y),
            on_ground: gb.peek(ram::ON_GROUND),
            power_state: gb.peek(ram::POWER_STATE),
            objects,
        }
    }

    pub fn player_cell(&self, anchor: PlayerAnchor) -> Option<GridPos> {
        self.grid.locate_player(anchor)
    }
}
