//! A `GameBoy` that plays back a recorded per-tick trace.
//!
//! Traces are JSON lines, one [`Snapshot`] per emulator tick. Inputs do not
//! steer the playback; they are logged so a run can be checked afterwards.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::env::{ram, Button, GameBoy, GameStats, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::observation::{TileGrid, GRID_COLS, GRID_ROWS};

const TILE_PX: usize = 8;
const HUD_ROWS: usize = SCREEN_HEIGHT - GRID_ROWS * TILE_PX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub game_area: TileGrid,
    pub x_position: i32,
    /// Bytes not listed read as 0, except object type bytes which read as empty.
    #[serde(default)]
    pub ram: BTreeMap<u16, u8>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub stats: GameStats,
}

impl Snapshot {
    pub fn new(game_area: TileGrid, x_position: i32) -> Self {
        Self {
            game_area,
            x_position,
            ram: BTreeMap::new(),
            game_over: false,
            stats: GameStats::default(),
        }
    }

    pub fn with_byte(mut self, addr: u16, value: u8) -> Self {
        self.ram.insert(addr, value);
        self
    }

    pub fn with_player(self, x: u8, y: u8, on_ground: u8) -> Self {
        self.with_byte(ram::PLAYER_X, x)
            .with_byte(ram::PLAYER_Y, y)
            .with_byte(ram::ON_GROUND, on_ground)
    }

    pub fn with_object(self, slot: usize, kind: u8, x: u8, y: u8) -> Self {
        self.with_byte(ram::object_addr(slot, ram::OBJECT_TYPE), kind)
            .with_byte(ram::object_addr(slot, ram::OBJECT_X), x)
            .with_byte(ram::object_addr(slot, ram::OBJECT_Y), y)
    }

    pub fn with_game_over(mut self) -> Self {
        self.game_over = true;
        self
    }

    fn read(&self, addr: u16) -> u8 {
        match self.ram.get(&addr) {
            Some(&value) => value,
            None if is_object_type_addr(addr) => ram::EMPTY_SLOT,
            None => 0,
        }
    }
}

fn is_object_type_addr(addr: u16) -> bool {
    let table = ram::OBJECT_TABLE..ram::object_addr(ram::OBJECT_SLOTS, 0);
    table.contains(&addr) && (addr - ram::OBJECT_TABLE) % ram::OBJECT_STRIDE == ram::OBJECT_TYPE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputEvent {
    pub tick: u64,
    pub button: Button,
    pub pressed: bool,
}

pub struct ReplayConsole {
    snapshots: Vec<Snapshot>,
    cursor: usize,
    exhausted: bool,
    ticks: u64,
    held: [bool; Button::COUNT],
    events: Vec<InputEvent>,
    frame: Vec<u8>,
}

impl ReplayConsole {
    pub fn new(snapshots: Vec<Snapshot>) -> Result<Self> {
        if snapshots.is_empty() {
            bail!("replay trace has no snapshots");
        }
        Ok(Self {
            snapshots,
            cursor: 0,
            exhausted: false,
            ticks: 0,
            held: [false; Button::COUNT],
            events: Vec::new(),
            frame: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed opening trace {}", path.display()))?;
        let snapshots = read_trace(BufReader::new(file))
            .with_context(|| format!("failed reading trace {}", path.display()))?;
        Self::new(snapshots)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshot(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Jump playback to `index` without ticking.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        if index >= self.snapshots.len() {
            bail!(
                "tick {index} is past the end of the trace ({} snapshots)",
                self.snapshots.len()
            );
        }
        self.cursor = index;
        self.exhausted = false;
        Ok(())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn is_held(&self, button: Button) -> bool {
        self.held[button.index()]
    }

    fn current(&self) -> &Snapshot {
        &self.snapshots[self.cursor]
    }

    fn set_button(&mut self, button: Button, pressed: bool) {
        tracing::trace!(tick = self.ticks, button = button.name(), pressed, "input");
        self.held[button.index()] = pressed;
        self.events.push(InputEvent {
            tick: self.ticks,
            button,
            pressed,
        });
    }
}

impl GameBoy for ReplayConsole {
    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        self.exhausted = false;
        self.ticks = 0;
        self.held = [false; Button::COUNT];
        self.events.clear();
        Ok(())
    }

    fn peek(&self, addr: u16) -> u8 {
        self.current().read(addr)
    }

    fn game_area(&self) -> TileGrid {
        self.current().game_area.clone()
    }

    fn x_position(&self) -> i32 {
        self.current().x_position
    }

    fn is_game_over(&self) -> bool {
        self.exhausted || self.current().game_over
    }

    fn game_stats(&self) -> GameStats {
        self.current().stats.clone()
    }

    fn frame_buffer(&mut self) -> &[u8] {
        let grid = &self.snapshots[self.cursor].game_area;
        render_grid(grid, &mut self.frame);
        &self.frame
    }

    fn press(&mut self, button: Button) {
        self.set_button(button, true);
    }

    fn release(&mut self, button: Button) {
        self.set_button(button, false);
    }

    fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        if self.cursor + 1 < self.snapshots.len() {
            self.cursor += 1;
        } else {
            self.exhausted = true;
        }
        Ok(())
    }
}

pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let snapshot: Snapshot = serde_json::from_str(&line)
            .with_context(|| format!("invalid snapshot on line {}", i + 1))?;
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

pub fn write_trace(path: &Path, snapshots: &[Snapshot]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for snapshot in snapshots {
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

// DMG greens, lightest to darkest.
const PALETTE: [[u8; 4]; 4] = [
    [224, 248, 208, 255],
    [136, 192, 112, 255],
    [52, 104, 86, 255],
    [8, 24, 32, 255],
];

fn tile_color(code: u8) -> [u8; 4] {
    match code {
        0 => PALETTE[0],
        1 => PALETTE[3],
        10 | 14 => PALETTE[2],
        _ => PALETTE[1],
    }
}

fn render_grid(grid: &TileGrid, out: &mut [u8]) {
    for (y, px_row) in out.chunks_exact_mut(SCREEN_WIDTH * 4).enumerate() {
        if y < HUD_ROWS {
            for px in px_row.chunks_exact_mut(4) {
                px.copy_from_slice(&PALETTE[3]);
            }
            continue;
        }
        let row = (y - HUD_ROWS) / TILE_PX;
        for (x, px) in px_row.chunks_exact_mut(4).enumerate() {
            let col = (x / TILE_PX).min(GRID_COLS - 1);
            px.copy_from_slice(&tile_color(grid.get(row, col)));
        }
    }
}
