use serde::Serialize;

use crate::env::Button;
use crate::hazard::{self, HazardMatch};
use crate::observation::{
    EntityKind, GridPos, Observation, PlayerAnchor, Tile, TileGrid, GRID_COLS,
};

// =============================================================================
// Expert Tuning Knobs
// =============================================================================

pub struct ExpertConfig {
    pub player_anchor: PlayerAnchor,
    /// Rows below the player that must be empty for a hole.
    pub hole_depth: usize,
    /// Columns ahead of the player that must be empty for a hole.
    pub hole_width: usize,
    /// Holes are ignored when the player sits this far right and below `hole_min_row`.
    pub hole_edge_col: usize,
    pub hole_min_row: usize,
    /// Columns the player may be past a block and still jump for it.
    pub block_reach_cols: usize,
    /// Rows a block may sit above the player.
    pub block_reach_rows: usize,
    /// Beyond this row the pipe probe reports "not on pipe".
    pub pipe_max_row: usize,
    /// Consecutive pipe contacts before the expert forces a dismount.
    pub pipe_release_after: u32,
    /// Stuck count at which the wall jump fires.
    pub wall_jump_at: u32,
    /// Row the player stands on in the bonus room before the leftward exit.
    pub bonus_room_floor_row: usize,
    /// Row probed two columns behind the player for the bonus-room ledge.
    pub bonus_room_ledge_row: usize,
}

impl Default for ExpertConfig {
    fn default() -> Self {
        Self {
            player_anchor: PlayerAnchor::LastScanned,
            hole_depth: 4,
            hole_width: 2,
            hole_edge_col: 18,
            hole_min_row: 11,
            block_reach_cols: 2,
            block_reach_rows: 5,
            pipe_max_row: 14,
            pipe_release_after: 2,
            wall_jump_at: 3,
            bonus_room_floor_row: 13,
            bonus_room_ledge_row: 9,
        }
    }
}

// =============================================================================
// Plans & State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hold {
    pub button: Button,
    pub ticks: u32,
}

/// One cycle's button instructions for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub primary: Hold,
    pub secondary: Option<Hold>,
    pub sprint: bool,
}

impl ActionPlan {
    pub const fn tap(button: Button, ticks: u32, sprint: bool) -> Self {
        Self {
            primary: Hold { button, ticks },
            secondary: None,
            sprint,
        }
    }

    pub const fn combo(
        button: Button,
        ticks: u32,
        second: Button,
        second_ticks: u32,
        sprint: bool,
    ) -> Self {
        Self {
            primary: Hold { button, ticks },
            secondary: Some(Hold {
                button: second,
                ticks: second_ticks,
            }),
            sprint,
        }
    }
}

pub const HOLE_JUMP: ActionPlan = ActionPlan::combo(Button::Right, 2, Button::A, 19, false);
pub const BLOCK_JUMP: ActionPlan = ActionPlan::tap(Button::A, 8, false);
pub const PIPE_CLIMB: ActionPlan = ActionPlan::combo(Button::Down, 8, Button::Right, 2, false);
pub const PIPE_DISMOUNT: ActionPlan = ActionPlan::combo(Button::A, 8, Button::Right, 1, true);
pub const BONUS_ROOM_LEFT_JUMP: ActionPlan =
    ActionPlan::combo(Button::Left, 8, Button::A, 15, true);
pub const WALL_JUMP: ActionPlan = ActionPlan::combo(Button::A, 12, Button::Right, 2, false);
pub const BONUS_ROOM_RIGHT_JUMP: ActionPlan =
    ActionPlan::combo(Button::A, 14, Button::Right, 2, false);
pub const NUDGE: ActionPlan = ActionPlan::tap(Button::Right, 2, false);
pub const STAY_DOWN: ActionPlan = ActionPlan::tap(Button::Down, 5, false);
pub const SPRINT: ActionPlan = ActionPlan::tap(Button::Right, 1, true);

/// Cross-cycle memory, threaded through `Expert::decide` by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentState {
    pub prev_x: i32,
    pub curr_x: i32,
    pub stuck: u32,
    pub stuck_on_pipe: u32,
    pub hole_count: u32,
    /// Where the player was last seen on the grid.
    pub last_cell: GridPos,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Counter {
    #[default]
    Keep,
    Increment,
    Set(u32),
}

impl Counter {
    fn apply(self, value: u32) -> u32 {
        match self {
            Counter::Keep => value,
            Counter::Increment => value.saturating_add(1),
            Counter::Set(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub stuck: Counter,
    pub hole_count: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Rule {
    Hazard(EntityKind),
    HoleJump,
    BlockJump,
    PipeClimb,
    PipeDismount,
    BonusRoomLeftJump,
    WallJump,
    BonusRoomRightJump,
    Stall,
    StayDown,
    Sprint,
}

impl Rule {
    pub fn name(self) -> &'static str {
        match self {
            Rule::Hazard(EntityKind::GroundEnemy) => "hazard_ground_enemy",
            Rule::Hazard(EntityKind::ShelledEnemy) => "hazard_shelled_enemy",
            Rule::Hazard(EntityKind::Bat) => "hazard_bat",
            Rule::Hazard(EntityKind::Bee) => "hazard_bee",
            Rule::Hazard(EntityKind::Powerup) => "hazard_powerup",
            Rule::HoleJump => "hole_jump",
            Rule::BlockJump => "block_jump",
            Rule::PipeClimb => "pipe_climb",
            Rule::PipeDismount => "pipe_dismount",
            Rule::BonusRoomLeftJump => "bonus_room_left_jump",
            Rule::WallJump => "wall_jump",
            Rule::BonusRoomRightJump => "bonus_room_right_jump",
            Rule::Stall => "stall",
            Rule::StayDown => "stay_down",
            Rule::Sprint => "sprint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub rule: Rule,
    pub plan: ActionPlan,
    pub patch: StatePatch,
}

impl Outcome {
    fn new(rule: Rule, plan: ActionPlan) -> Self {
        Self {
            rule,
            plan,
            patch: StatePatch::default(),
        }
    }

    fn stuck(mut self, stuck: Counter) -> Self {
        self.patch.stuck = stuck;
        self
    }

    fn holes(mut self, holes: Counter) -> Self {
        self.patch.hole_count = holes;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub rule: Rule,
    pub plan: ActionPlan,
    pub state: AgentState,
}

impl Decision {
    pub fn into_parts(self) -> (ActionPlan, AgentState) {
        (self.plan, self.state)
    }
}

// =============================================================================
// Scene
// =============================================================================

/// Facts derived once per cycle and shared by every rule.
pub struct Scene<'a> {
    pub obs: &'a Observation,
    pub state: &'a AgentState,
    pub config: &'a ExpertConfig,
    /// Player cell on this cycle's grid, or the last known cell when hidden.
    pub cell: GridPos,
    pub block: bool,
    pub hole: bool,
    /// `Some(true)` climbing, `Some(false)` forced off, `None` not near a pipe.
    pub pipe: Option<bool>,
    pub stalled: bool,
}

impl Scene<'_> {
    fn grid(&self) -> &TileGrid {
        &self.obs.grid
    }

    /// Bonus rooms in 1-1 are walled in along the leftmost column.
    fn in_bonus_room(&self) -> bool {
        self.grid().column_is(0, Tile::Ground)
    }
}

/// No coin or mystery block on screen means no block to jump for; the block
/// position never defaults to (0, 0).
fn near_block(grid: &TileGrid, player: GridPos, config: &ExpertConfig) -> bool {
    let Some(block) = grid.find_collectible() else {
        return false;
    };
    let cols_past = player.col as isize - block.col as isize;
    let rows_below = player.row as isize - block.row as isize;
    (0..config.block_reach_cols as isize).contains(&cols_past)
        && (0..config.block_reach_rows as isize).contains(&rows_below)
}

fn over_hole(obs: &Observation, player: GridPos, block: bool, config: &ExpertConfig) -> bool {
    if player.col >= config.hole_edge_col && player.row > config.hole_min_row {
        return false;
    }
    if block {
        return false;
    }
    let rows = player.row + 1..player.row + 1 + config.hole_depth;
    let cols = player.col + 1..player.col + 1 + config.hole_width;
    obs.grid.window_is(rows, cols, Tile::Empty) && obs.on_ground != 0
}

/// Advances `stuck_on_pipe` as a side effect, every cycle.
fn probe_pipe(
    grid: &TileGrid,
    located: Option<GridPos>,
    stuck_on_pipe: &mut u32,
    config: &ExpertConfig,
) -> Option<bool> {
    let Some(player) = located else {
        return Some(false);
    };
    if player.row > config.pipe_max_row {
        return Some(false);
    }
    if *stuck_on_pipe == config.pipe_release_after {
        *stuck_on_pipe = 0;
        return Some(false);
    }
    let below = player.row as isize + 1;
    let col = player.col as isize;
    let pipe = Tile::Pipe.code();
    if grid.get_wrapped(below, col) == pipe || grid.get_wrapped(below, col - 1) == pipe {
        *stuck_on_pipe += 1;
        return Some(true);
    }
    None
}

// =============================================================================
// Rules
// =============================================================================

type RuleFn = fn(&Scene<'_>) -> Option<Outcome>;

/// Priority order. The first rule returning a plan wins; `cruise` is the fallback.
const RULES: &[RuleFn] = &[
    hazard_rule,
    hole_rule,
    block_rule,
    pipe_climb_rule,
    pipe_dismount_rule,
    bonus_room_left_jump_rule,
    wall_jump_rule,
    stall_rule,
];

fn hazard_rule(scene: &Scene<'_>) -> Option<Outcome> {
    let HazardMatch {
        slot,
        kind,
        reaction,
        plan,
    } = hazard::scan(scene.obs)?;
    tracing::debug!(slot, reaction, "hazard in range");
    Some(Outcome::new(Rule::Hazard(kind), plan))
}

fn hole_rule(scene: &Scene<'_>) -> Option<Outcome> {
    scene
        .hole
        .then(|| Outcome::new(Rule::HoleJump, HOLE_JUMP).holes(Counter::Increment))
}

fn block_rule(scene: &Scene<'_>) -> Option<Outcome> {
    scene.block.then(|| Outcome::new(Rule::BlockJump, BLOCK_JUMP))
}

fn pipe_climb_rule(scene: &Scene<'_>) -> Option<Outcome> {
    (scene.pipe == Some(true))
        .then(|| Outcome::new(Rule::PipeClimb, PIPE_CLIMB).stuck(Counter::Increment))
}

fn pipe_dismount_rule(scene: &Scene<'_>) -> Option<Outcome> {
    (scene.pipe == Some(false)).then(|| Outcome::new(Rule::PipeDismount, PIPE_DISMOUNT))
}

/// 1-1 bonus room: the exit is up and to the left, reached by a leftward jump
/// off the floor (or from under the ledge two columns back).
fn bonus_room_left_jump_rule(scene: &Scene<'_>) -> Option<Outcome> {
    if !scene.stalled || !scene.in_bonus_room() {
        return None;
    }
    let grid = scene.grid();
    let GridPos { row, col } = scene.cell;
    let ground = Tile::Ground.code();
    let on_floor =
        row == scene.config.bonus_room_floor_row && grid.is(row, GRID_COLS - 1, Tile::Ground);
    let under_ledge =
        grid.get_wrapped(scene.config.bonus_room_ledge_row as isize, col as isize - 2) == ground;
    (on_floor || under_ledge).then(|| Outcome::new(Rule::BonusRoomLeftJump, BONUS_ROOM_LEFT_JUMP))
}

fn wall_jump_rule(scene: &Scene<'_>) -> Option<Outcome> {
    (scene.state.stuck == scene.config.wall_jump_at).then(|| {
        Outcome::new(Rule::WallJump, WALL_JUMP).stuck(Counter::Set(scene.config.wall_jump_at + 1))
    })
}

fn stall_rule(scene: &Scene<'_>) -> Option<Outcome> {
    if !scene.stalled {
        return None;
    }
    // 1-1 bonus room again: open space two rows up over columns 5-6 means the
    // way out is a long jump to the right.
    let gap_row = scene.cell.row as isize - 2;
    let gap_above = (5..7).all(|c| scene.grid().get_wrapped(gap_row, c) == Tile::Empty.code());
    if gap_above && scene.in_bonus_room() {
        return Some(
            Outcome::new(Rule::BonusRoomRightJump, BONUS_ROOM_RIGHT_JUMP)
                .stuck(Counter::Set(0)),
        );
    }
    Some(Outcome::new(Rule::Stall, NUDGE).stuck(Counter::Increment))
}

fn cruise(scene: &Scene<'_>) -> Outcome {
    // Airborne with solid ground under and ahead: hold down to drop onto it.
    let col = scene.cell.col;
    let ground_below = scene.grid().window_is(15..16, col..col + 2, Tile::Ground);
    if ground_below && scene.obs.on_ground == 0x00 {
        return Outcome::new(Rule::StayDown, STAY_DOWN);
    }
    Outcome::new(Rule::Sprint, SPRINT).stuck(Counter::Set(0))
}

// =============================================================================
// Expert
// =============================================================================

#[derive(Default)]
pub struct Expert {
    pub config: ExpertConfig,
}

impl Expert {
    pub fn new(config: ExpertConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, obs: &Observation, state: &AgentState) -> Decision {
        let config = &self.config;
        let mut next = *state;
        next.curr_x = obs.world_x;

        let located = obs.player_cell(config.player_anchor);
        let cell = match located {
            Some(cell) => {
                next.last_cell = cell;
                cell
            }
            None => {
                tracing::warn!(
                    world_x = obs.world_x,
                    "player tile not on grid, using last known cell"
                );
                state.last_cell
            }
        };

        let block = located.is_some_and(|p| near_block(&obs.grid, p, config));
        let hole = located.is_some_and(|p| over_hole(obs, p, block, config));
        let pipe = probe_pipe(&obs.grid, located, &mut next.stuck_on_pipe, config);

        let scene = Scene {
            obs,
            state: &next,
            config,
            cell,
            block,
            hole,
            pipe,
            stalled: next.curr_x == next.prev_x,
        };

        let outcome = RULES
            .iter()
            .find_map(|rule| rule(&scene))
            .unwrap_or_else(|| cruise(&scene));

        next.stuck = outcome.patch.stuck.apply(next.stuck);
        next.hole_count = outcome.patch.hole_count.apply(next.hole_count);
        next.prev_x = next.curr_x;

        tracing::debug!(
            rule = outcome.rule.name(),
            plan = ?outcome.plan,
            world_x = obs.world_x,
            stuck = next.stuck,
            "decided"
        );

        Decision {
            rule: outcome.rule,
            plan: outcome.plan,
            state: next,
        }
    }
}

/// Decide with the default tuning.
pub fn decide(obs: &Observation, state: &AgentState) -> (ActionPlan, AgentState) {
    Expert::default().decide(obs, state).into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::ram;
    use crate::observation::ObjectSlot;

    fn observation(grid: TileGrid, world_x: i32) -> Observation {
        Observation {
            grid,
            world_x,
            player_x: 40,
            player_y: 100,
            on_ground: 0,
            power_state: 0,
            objects: [ObjectSlot::EMPTY; ram::OBJECT_SLOTS],
        }
    }

    fn floor_with_player(row: usize, col: usize) -> TileGrid {
        let mut grid = TileGrid::new();
        grid.fill_row(15, Tile::Ground.code());
        grid.set(row, col, Tile::Player.code());
        grid
    }

    /// Player at (10, 5), ground along the bottom row except a gap at 6-8.
    fn gap_ahead() -> TileGrid {
        let mut grid = floor_with_player(10, 5);
        for col in 6..=8 {
            grid.set(15, col, Tile::Empty.code());
        }
        grid
    }

    fn moving(world_x: i32) -> AgentState {
        AgentState {
            prev_x: world_x - 3,
            curr_x: world_x - 3,
            ..AgentState::default()
        }
    }

    fn stalled(world_x: i32, stuck: u32) -> AgentState {
        AgentState {
            prev_x: world_x,
            curr_x: world_x,
            stuck,
            ..AgentState::default()
        }
    }

    #[test]
    fn gap_ahead_triggers_hole_jump() {
        let mut obs = observation(gap_ahead(), 120);
        obs.on_ground = 0x01;
        let decision = Expert::default().decide(&obs, &AgentState::default());
        assert_eq!(decision.rule, Rule::HoleJump);
        assert_eq!(decision.plan, HOLE_JUMP);
        assert_eq!(
            decision.plan,
            ActionPlan::combo(Button::Right, 2, Button::A, 19, false)
        );
        assert_eq!(decision.state.hole_count, 1);
        assert_eq!(decision.state.prev_x, 120);
        assert_eq!(decision.state.last_cell, GridPos::new(10, 5));
    }

    #[test]
    fn hole_needs_ground_flag() {
        let obs = observation(gap_ahead(), 120);
        let decision = Expert::default().decide(&obs, &moving(120));
        assert_ne!(decision.rule, Rule::HoleJump);
    }

    #[test]
    fn hazard_outranks_hole() {
        let mut obs = observation(gap_ahead(), 120);
        obs.on_ground = 0x01;
        obs.objects[3] = ObjectSlot::new(0x00, 45, 101);
        let state = AgentState {
            prev_x: 90,
            curr_x: 90,
            ..AgentState::default()
        };
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!(decision.rule, Rule::Hazard(EntityKind::GroundEnemy));
        assert_eq!(decision.plan, ActionPlan::tap(Button::A, 1, false));
        assert_eq!(decision.state.prev_x, 120);
        assert_eq!(decision.state.hole_count, 0);
    }

    #[test]
    fn block_above_triggers_jump_and_suppresses_hole() {
        let mut grid = gap_ahead();
        grid.set(7, 4, Tile::MysteryBlock.code());
        let mut obs = observation(grid, 200);
        obs.on_ground = 0x01;
        let decision = Expert::default().decide(&obs, &moving(200));
        assert_eq!(decision.rule, Rule::BlockJump);
        assert_eq!(decision.plan, BLOCK_JUMP);
    }

    #[test]
    fn block_tie_break_uses_last_scanned_tile() {
        let mut grid = floor_with_player(10, 5);
        // Scanned first, in reach.
        grid.set(8, 5, Tile::Coin.code());
        // Scanned last, out of reach.
        grid.set(3, 5, Tile::MysteryBlock.code());
        // Standing, with the hole window closed off.
        grid.set(11, 6, Tile::Ground.code());
        let mut obs = observation(grid.clone(), 300);
        obs.on_ground = 0x01;
        let decision = Expert::default().decide(&obs, &moving(300));
        assert_eq!(decision.rule, Rule::Sprint);
        assert_eq!(decision.plan, SPRINT);

        // With only the near tile present the jump fires.
        grid.set(3, 5, Tile::Empty.code());
        let mut obs = observation(grid, 300);
        obs.on_ground = 0x01;
        let decision = Expert::default().decide(&obs, &moving(300));
        assert_eq!(decision.rule, Rule::BlockJump);
    }

    #[test]
    fn pipe_contact_climbs_twice_then_dismounts() {
        let mut grid = floor_with_player(10, 5);
        grid.set(11, 5, Tile::Pipe.code());
        let expert = Expert::default();
        let mut state = AgentState::default();
        let mut rules = Vec::new();
        for cycle in 0..3 {
            let obs = observation(grid.clone(), 500 + cycle);
            let decision = expert.decide(&obs, &state);
            rules.push(decision.rule);
            state = decision.state;
        }
        assert_eq!(
            rules,
            vec![Rule::PipeClimb, Rule::PipeClimb, Rule::PipeDismount]
        );
        assert_eq!(state.stuck_on_pipe, 0);
        assert_eq!(state.stuck, 2);
    }

    #[test]
    fn pipe_below_left_counts_as_contact() {
        let mut grid = floor_with_player(10, 5);
        grid.set(11, 4, Tile::Pipe.code());
        let obs = observation(grid, 10);
        let decision = Expert::default().decide(&obs, &moving(10));
        assert_eq!(decision.rule, Rule::PipeClimb);
        assert_eq!(decision.plan, PIPE_CLIMB);
        assert_eq!(decision.state.stuck_on_pipe, 1);
    }

    #[test]
    fn pipe_contact_wraps_past_left_edge() {
        let mut grid = floor_with_player(10, 0);
        let obs = observation(grid.clone(), 20);
        assert_ne!(
            Expert::default().decide(&obs, &moving(20)).rule,
            Rule::PipeClimb
        );

        grid.set(11, 19, Tile::Pipe.code());
        let obs = observation(grid, 20);
        let decision = Expert::default().decide(&obs, &moving(20));
        assert_eq!(decision.rule, Rule::PipeClimb);
        assert_eq!(decision.state.stuck_on_pipe, 1);
    }

    #[test]
    fn hidden_player_falls_back_and_dismounts() {
        let mut grid = TileGrid::new();
        grid.fill_row(15, Tile::Ground.code());
        let obs = observation(grid, 640);
        let state = AgentState {
            last_cell: GridPos::new(12, 7),
            ..moving(640)
        };
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!(decision.rule, Rule::PipeDismount);
        assert_eq!(decision.state.last_cell, GridPos::new(12, 7));
    }

    #[test]
    fn player_on_bottom_row_is_forced_off_pipe_logic() {
        let mut grid = TileGrid::new();
        grid.set(15, 3, Tile::Player.code());
        let obs = observation(grid, 50);
        let decision = Expert::default().decide(&obs, &moving(50));
        assert_eq!(decision.rule, Rule::PipeDismount);
    }

    #[test]
    fn stall_ladder_nudges_then_wall_jumps() {
        let expert = Expert::default();
        let obs = observation(floor_with_player(10, 5), 700);
        let mut state = stalled(700, 0);
        let mut plans = Vec::new();
        for _ in 0..4 {
            let decision = expert.decide(&obs, &state);
            plans.push((decision.rule, decision.state.stuck));
            state = decision.state;
        }
        assert_eq!(
            plans,
            vec![
                (Rule::Stall, 1),
                (Rule::Stall, 2),
                (Rule::Stall, 3),
                (Rule::WallJump, 4),
            ]
        );
    }

    #[test]
    fn wall_jump_fires_even_when_moving() {
        let obs = observation(floor_with_player(10, 5), 800);
        let state = AgentState {
            stuck: 3,
            ..moving(800)
        };
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!(decision.rule, Rule::WallJump);
        assert_eq!(decision.plan, WALL_JUMP);
        assert_eq!(decision.state.stuck, 4);
    }

    fn bonus_room(player_row: usize, player_col: usize) -> TileGrid {
        let mut grid = floor_with_player(player_row, player_col);
        for row in 0..16 {
            grid.set(row, 0, Tile::Ground.code());
        }
        grid
    }

    #[test]
    fn bonus_room_floor_triggers_left_jump() {
        let mut grid = bonus_room(13, 8);
        grid.set(13, 19, Tile::Ground.code());
        let obs = observation(grid, 900);
        let decision = Expert::default().decide(&obs, &stalled(900, 1));
        assert_eq!(decision.rule, Rule::BonusRoomLeftJump);
        assert_eq!(decision.plan, BONUS_ROOM_LEFT_JUMP);
        assert_eq!(decision.state.stuck, 1);
    }

    #[test]
    fn bonus_room_ledge_behind_triggers_left_jump() {
        let mut grid = bonus_room(10, 8);
        grid.set(9, 6, Tile::Ground.code());
        let obs = observation(grid, 910);
        let decision = Expert::default().decide(&obs, &stalled(910, 1));
        assert_eq!(decision.rule, Rule::BonusRoomLeftJump);
        assert_eq!(decision.plan, BONUS_ROOM_LEFT_JUMP);
    }

    #[test]
    fn bonus_room_ledge_check_wraps_past_left_edge() {
        // Player in column 1: two columns back wraps to column 19.
        let grid = bonus_room(10, 1);
        let obs = observation(grid.clone(), 920);
        let decision = Expert::default().decide(&obs, &stalled(920, 1));
        assert_ne!(decision.rule, Rule::BonusRoomLeftJump);

        let mut grid = grid;
        grid.set(9, 19, Tile::Ground.code());
        let obs = observation(grid, 920);
        let decision = Expert::default().decide(&obs, &stalled(920, 1));
        assert_eq!(decision.rule, Rule::BonusRoomLeftJump);
    }

    #[test]
    fn no_block_on_screen_never_block_jumps() {
        // Standing near the top-left corner, within reach of (0, 0).
        let mut grid = floor_with_player(3, 1);
        grid.fill_row(4, Tile::Ground.code());
        let mut obs = observation(grid, 300);
        obs.on_ground = 0x01;
        let decision = Expert::default().decide(&obs, &moving(300));
        assert_eq!(decision.rule, Rule::Sprint);
    }

    #[test]
    fn bonus_room_open_ceiling_triggers_right_jump() {
        let obs = observation(bonus_room(10, 9), 950);
        let decision = Expert::default().decide(&obs, &stalled(950, 2));
        assert_eq!(decision.rule, Rule::BonusRoomRightJump);
        assert_eq!(decision.plan, BONUS_ROOM_RIGHT_JUMP);
        assert_eq!(decision.state.stuck, 0);
    }

    #[test]
    fn bonus_room_ceiling_blocked_falls_back_to_nudge() {
        let mut grid = bonus_room(10, 9);
        grid.set(8, 6, Tile::Ground.code());
        let obs = observation(grid, 950);
        let decision = Expert::default().decide(&obs, &stalled(950, 0));
        assert_eq!(decision.rule, Rule::Stall);
        assert_eq!(decision.plan, NUDGE);
        assert_eq!(decision.state.stuck, 1);
    }

    #[test]
    fn airborne_over_ground_holds_down() {
        let obs = observation(floor_with_player(10, 5), 1000);
        let state = AgentState {
            stuck: 2,
            ..moving(1000)
        };
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!(decision.rule, Rule::StayDown);
        assert_eq!(decision.plan, STAY_DOWN);
        assert_eq!(decision.state.stuck, 2);
        assert_eq!(decision.state.prev_x, 1000);
    }

    #[test]
    fn progress_sprints_and_clears_stuck() {
        let mut obs = observation(floor_with_player(10, 5), 1100);
        obs.on_ground = 0x01;
        // Gap window under the player is filled so no hole fires.
        obs.grid.set(11, 6, Tile::Ground.code());
        let state = AgentState {
            stuck: 2,
            ..moving(1100)
        };
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!(decision.rule, Rule::Sprint);
        assert_eq!(decision.plan, SPRINT);
        assert_eq!(decision.state.stuck, 0);
        assert_eq!(decision.state.prev_x, 1100);
        assert_eq!(decision.state.curr_x, 1100);
    }

    #[test]
    fn first_scanned_anchor_is_configurable() {
        let mut grid = floor_with_player(9, 4);
        grid.set(9, 5, Tile::Player.code());
        grid.set(10, 4, Tile::Player.code());
        grid.set(10, 5, Tile::Player.code());
        let obs = observation(grid, 5);

        let last = Expert::default().decide(&obs, &moving(5));
        assert_eq!(last.state.last_cell, GridPos::new(9, 4));

        let first = Expert::new(ExpertConfig {
            player_anchor: PlayerAnchor::FirstScanned,
            ..ExpertConfig::default()
        })
        .decide(&obs, &moving(5));
        assert_eq!(first.state.last_cell, GridPos::new(10, 5));
    }

    #[test]
    fn free_function_matches_default_expert() {
        let obs = observation(floor_with_player(10, 5), 42);
        let state = moving(42);
        let (plan, next) = decide(&obs, &state);
        let decision = Expert::default().decide(&obs, &state);
        assert_eq!((plan, next), decision.into_parts());
    }
}
