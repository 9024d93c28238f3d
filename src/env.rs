use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::observation::TileGrid;

// =============================================================================
// RAM Addresses
// =============================================================================

pub mod ram {
    pub const PLAYER_Y: u16 = 0xC201;
    pub const PLAYER_X: u16 = 0xC202;
    pub const POWER_STATE: u16 = 0xC207;
    pub const ON_GROUND: u16 = 0xC20A;

    /// Ten object slots, one every `OBJECT_STRIDE` bytes.
    pub const OBJECT_TABLE: u16 = 0xD100;
    pub const OBJECT_STRIDE: u16 = 0x10;
    pub const OBJECT_SLOTS: usize = 10;

    pub const OBJECT_TYPE: u16 = 0x00;
    pub const OBJECT_Y: u16 = 0x02;
    pub const OBJECT_X: u16 = 0x03;

    /// Type byte of a slot with nothing in it.
    pub const EMPTY_SLOT: u8 = 0xFF;

    pub const fn object_addr(slot: usize, field: u16) -> u16 {
        OBJECT_TABLE + (slot as u16) * OBJECT_STRIDE + field
    }
}

// =============================================================================
// Screen
// =============================================================================

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// =============================================================================
// Buttons
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Button {
    Down = 0,
    Left = 1,
    Right = 2,
    Up = 3,
    A = 4,
    B = 5,
}

impl Button {
    pub const COUNT: usize = 6;

    pub const ALL: [Button; Button::COUNT] = [
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Up,
        Button::A,
        Button::B,
    ];

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::Up => "up",
            Button::A => "a",
            Button::B => "b",
        }
    }
}

// =============================================================================
// Game Statistics
// =============================================================================

/// End-of-session counters reported by the game itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStats {
    pub lives: i32,
    pub score: u32,
    pub coins: u32,
    pub world: u8,
    pub stage: u8,
    pub time_left: u32,
    pub x_position: i32,
}

// =============================================================================
// Console
// =============================================================================

/// Everything the agent needs from a running Game Boy: RAM and tile reads on
/// one side, joypad and clock on the other.
pub trait GameBoy {
    fn reset(&mut self) -> Result<()>;

    fn peek(&self, addr: u16) -> u8;

    /// 16x20 tile-class codes of the visible playfield.
    fn game_area(&self) -> TileGrid;

    /// Player position in level coordinates.
    fn x_position(&self) -> i32;

    fn is_game_over(&self) -> bool;

    fn game_stats(&self) -> GameStats;

    /// RGBA, `SCREEN_WIDTH * SCREEN_HEIGHT * 4` bytes.
    fn frame_buffer(&mut self) -> &[u8];

    fn frame_size(&self) -> (usize, usize) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    fn press(&mut self, button: Button);

    fn release(&mut self, button: Button);

    /// Advance emulation by one frame.
    fn tick(&mut self) -> Result<()>;
}

pub(crate) fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(val) => matches!(val.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"),
        Err(_) => false,
    }
}
