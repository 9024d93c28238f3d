use anyhow::Result;
use std::ops::RangeInclusive;

use crate::env::{Button, GameBoy};
use crate::expert::{ActionPlan, AgentState};

// =============================================================================
// Executor Constants
// =============================================================================

pub struct ExecutorConfig {
    pub sprint_button: Button,
    /// Stuck count at which the executor backs off before running the plan.
    pub unstick_at: u32,
    pub unstick_button: Button,
    pub unstick_ticks: u32,
    /// World x range of the second pipe in 1-1 that has to be entered.
    pub pipe_entry_band: RangeInclusive<i32>,
    pub pipe_entry_button: Button,
    pub pipe_entry_ticks: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            sprint_button: Button::B,
            unstick_at: 4,
            unstick_button: Button::Left,
            unstick_ticks: 5,
            pipe_entry_band: 1305..=1400,
            pipe_entry_button: Button::Down,
            pipe_entry_ticks: 8,
        }
    }
}

#[derive(Default)]
pub struct Executor {
    pub config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Play `plan` out on the console. Returns the number of ticks advanced.
    pub fn execute<G: GameBoy + ?Sized>(
        &self,
        plan: &ActionPlan,
        state: &mut AgentState,
        gb: &mut G,
    ) -> Result<u64> {
        let cfg = &self.config;
        let mut ticks = 0u64;

        if state.stuck == cfg.unstick_at {
            tracing::debug!(stuck = state.stuck, "backing off before plan");
            gb.press(cfg.unstick_button);
            ticks += advance(gb, cfg.unstick_ticks)?;
            gb.release(cfg.unstick_button);
            state.stuck = 0;
        }

        // Sprint is a level: asserted or cleared on every plan.
        if plan.sprint {
            gb.press(cfg.sprint_button);
        } else {
            gb.release(cfg.sprint_button);
        }

        let primary = plan.primary;
        gb.press(primary.button);
        for _ in 0..primary.ticks {
            if let Some(secondary) = plan.secondary {
                gb.press(secondary.button);
                if cfg.pipe_entry_band.contains(&state.curr_x) {
                    // The pipe has to be entered, not jumped. Down stays held
                    // until a later plan releases it.
                    tracing::debug!(world_x = state.curr_x, "pipe entry band, pressing down");
                    gb.press(cfg.pipe_entry_button);
                    ticks += advance(gb, cfg.pipe_entry_ticks)?;
                    break;
                }
                ticks += advance(gb, secondary.ticks)?;
                gb.release(secondary.button);
            }
            gb.tick()?;
            ticks += 1;
        }

        gb.release(primary.button);
        if let Some(secondary) = plan.secondary {
            gb.release(secondary.button);
        }
        ticks += advance(gb, primary.ticks)?;

        Ok(ticks)
    }
}

fn advance<G: GameBoy + ?Sized>(gb: &mut G, ticks: u32) -> Result<u64> {
    for _ in 0..ticks {
        gb.tick()?;
    }
    Ok(ticks as u64)
}
