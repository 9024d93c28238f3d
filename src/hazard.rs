//! Reactions to the object table: enemies to hop over or dodge, powerups to
//! walk into.
//!
//! Offsets compare the entity's RAM coordinates with the player's
//! (`dx = entity_x - player_x`, `dy = entity_y - player_y`). Screen y grows
//! downwards, so `-dy > 0` means the entity is above the player.

use crate::env::Button;
use crate::expert::ActionPlan;
use crate::observation::{EntityKind, Observation};

// Tuned by hand against 1-1 and 1-2; keep the exact values.
const GROUND_REACH: i32 = 15;
const GROUND_BEHIND: i32 = 5;
const GROUND_BELOW: i32 = 5;
const SHELL_REACH: i32 = 12;
const FLYER_REACH: i32 = 12;
const POWERUP_REACH: i32 = 10;
/// `dy` below which an entity counts as level with the player.
const LEVEL_BAND: i32 = 3;
/// Height above the player past which an entity counts as overhead.
const OVERHEAD_GAP: i32 = 5;
const OVERHEAD_REACH: i32 = 20;
const OVERHEAD_GROUND_NEAR: i32 = 13;
const ON_GROUND: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub fn between(obs: &Observation, x: u8, y: u8) -> Self {
        Self {
            dx: x as i32 - obs.player_x as i32,
            dy: y as i32 - obs.player_y as i32,
        }
    }

    fn above(self) -> i32 {
        -self.dy
    }
}

pub struct Reaction {
    pub name: &'static str,
    pub kind: EntityKind,
    pub when: fn(Offset, &Observation) -> bool,
    pub plan: ActionPlan,
}

/// Checked in order for each slot's entity class; the first hit wins.
pub const REACTIONS: &[Reaction] = &[
    Reaction {
        name: "ground_enemy_ahead",
        kind: EntityKind::GroundEnemy,
        when: |o, _| 0 < o.dx && o.dx < GROUND_REACH && 0 < o.dy && o.dy < LEVEL_BAND,
        plan: ActionPlan::tap(Button::A, 1, false),
    },
    Reaction {
        name: "ground_enemy_ahead_below",
        kind: EntityKind::GroundEnemy,
        when: |o, _| 0 < o.dx && o.dx < GROUND_REACH && -GROUND_BELOW <= o.dy && o.dy < 0,
        plan: ActionPlan::tap(Button::A, 1, false),
    },
    Reaction {
        name: "ground_enemy_behind",
        kind: EntityKind::GroundEnemy,
        when: |o, _| -GROUND_BEHIND < o.dx && o.dx < 0 && 0 < o.dy && o.dy < LEVEL_BAND,
        plan: ActionPlan::combo(Button::Right, 2, Button::A, 4, false),
    },
    Reaction {
        name: "ground_enemy_overhead",
        kind: EntityKind::GroundEnemy,
        when: |o, _| {
            o.above() > OVERHEAD_GAP && OVERHEAD_GROUND_NEAR < o.dx && o.dx < OVERHEAD_REACH
        },
        plan: ActionPlan::tap(Button::Left, 5, true),
    },
    // Enemies walking on the ledge just above the player in 1-2.
    Reaction {
        name: "ground_enemy_on_ledge",
        kind: EntityKind::GroundEnemy,
        when: |o, obs| {
            (3..=8).contains(&o.above()) && 1 < o.dx && o.dx < 5 && obs.on_ground == ON_GROUND
        },
        plan: ActionPlan::tap(Button::A, 5, false),
    },
    Reaction {
        name: "shelled_enemy_ahead",
        kind: EntityKind::ShelledEnemy,
        when: |o, _| 0 < o.dx && o.dx < SHELL_REACH && o.dy < LEVEL_BAND,
        plan: ActionPlan::tap(Button::A, 1, false),
    },
    Reaction {
        name: "shelled_enemy_overhead",
        kind: EntityKind::ShelledEnemy,
        when: |o, _| o.above() > OVERHEAD_GAP && o.dx < OVERHEAD_REACH,
        plan: ActionPlan::tap(Button::Left, 5, true),
    },
    Reaction {
        name: "bat_ahead",
        kind: EntityKind::Bat,
        when: |o, _| 0 < o.dx && o.dx < FLYER_REACH && o.dy < LEVEL_BAND,
        plan: ActionPlan::combo(Button::A, 14, Button::Right, 1, true),
    },
    Reaction {
        name: "bat_overhead",
        kind: EntityKind::Bat,
        when: |o, _| o.above() > OVERHEAD_GAP && o.dx < OVERHEAD_REACH,
        plan: ActionPlan::tap(Button::Left, 8, true),
    },
    Reaction {
        name: "powerup_ahead",
        kind: EntityKind::Powerup,
        when: |o, _| 0 < o.dx && o.dx < POWERUP_REACH && o.dy < LEVEL_BAND,
        plan: ActionPlan::tap(Button::Right, 5, true),
    },
    Reaction {
        name: "powerup_behind",
        kind: EntityKind::Powerup,
        when: |o, _| 0 < -o.dx && -o.dx < POWERUP_REACH && o.dy < LEVEL_BAND,
        plan: ActionPlan::combo(Button::Left, 5, Button::A, 1, true),
    },
    Reaction {
        name: "powerup_overhead",
        kind: EntityKind::Powerup,
        when: |o, _| o.above() > OVERHEAD_GAP && o.dx < OVERHEAD_REACH,
        plan: ActionPlan::combo(Button::A, 8, Button::Right, 1, false),
    },
    Reaction {
        name: "bee_ahead",
        kind: EntityKind::Bee,
        when: |o, _| 0 < o.dx && o.dx < FLYER_REACH && o.dy < LEVEL_BAND,
        plan: ActionPlan::tap(Button::A, 9, true),
    },
    Reaction {
        name: "bee_overhead",
        kind: EntityKind::Bee,
        when: |o, _| o.above() > OVERHEAD_GAP && o.dx < OVERHEAD_REACH,
        plan: ActionPlan::tap(Button::A, 15, true),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardMatch {
    pub slot: usize,
    pub kind: EntityKind,
    pub reaction: &'static str,
    pub plan: ActionPlan,
}

/// Walk slots 0..9 in order and return the first slot/reaction pair that fires.
pub fn scan(obs: &Observation) -> Option<HazardMatch> {
    for (slot, object) in obs.objects.iter().enumerate() {
        let Some(kind) = object.entity() else {
            continue;
        };
        let offset = Offset::between(obs, object.x, object.y);
        let hit = REACTIONS
            .iter()
            .filter(|r| r.kind == kind)
            .find(|r| (r.when)(offset, obs));
        if let Some(reaction) = hit {
            return Some(HazardMatch {
                slot,
                kind,
                reaction: reaction.name,
                plan: reaction.plan,
            });
        }
    }
    None
}
