use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::env::{env_flag, GameBoy, GameStats};
use crate::executor::Executor;
use crate::expert::{AgentState, Expert, Rule};
use crate::observation::Observation;
use crate::video::GifRecorder;

pub const RESULTS_FILE: &str = "results.json";
pub const VIDEO_FILE: &str = "mario_expert.gif";

/// Anything that wants to see the frames of a run.
pub trait FrameSink {
    fn push_frame(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()>;

    /// A sink that returns false here ends the session early.
    fn is_open(&self) -> bool {
        true
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<W: Write> FrameSink for GifRecorder<W> {
    fn push_frame(&mut self, rgba: &[u8], _width: usize, _height: usize) -> Result<()> {
        self.write_frame(rgba)
    }

    fn finish(&mut self) -> Result<()> {
        GifRecorder::finish(self)
    }
}

pub struct SessionConfig {
    pub results_dir: PathBuf,
    pub record_video: bool,
    pub fps: u32,
    /// Decision cycles before the run is cut off; 0 runs until game over.
    pub max_cycles: u64,
    /// Print the tile grid to stderr every cycle.
    pub debug_grid: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            record_video: true,
            fps: 30,
            max_cycles: 0,
            debug_grid: env_flag("MARIO_DEBUG_GRID"),
        }
    }
}

/// Flat key/value summary written to `results.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    #[serde(flatten)]
    pub game: GameStats,
    pub cycles: u64,
    pub ticks: u64,
    pub furthest_x: i32,
    pub final_x: i32,
    pub final_stuck: u32,
    pub holes_jumped: u32,
    /// `rule_<name>` -> times the rule fired.
    #[serde(flatten)]
    pub rules: BTreeMap<String, u64>,
}

impl SessionReport {
    fn count(&mut self, rule: Rule) {
        *self.rules.entry(format!("rule_{}", rule.name())).or_default() += 1;
    }

    pub fn fired(&self, rule: Rule) -> u64 {
        self.rules
            .get(&format!("rule_{}", rule.name()))
            .copied()
            .unwrap_or(0)
    }
}

pub struct Session {
    pub expert: Expert,
    pub executor: Executor,
    pub config: SessionConfig,
    sinks: Vec<Box<dyn FrameSink>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            expert: Expert::default(),
            executor: Executor::default(),
            config,
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    /// Drive `gb` until game over (or the cycle cap), then write the report.
    pub fn play<G: GameBoy + ?Sized>(&mut self, gb: &mut G) -> Result<SessionReport> {
        let dir = &self.config.results_dir;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed creating results dir {}", dir.display()))?;

        let mut video = if self.config.record_video {
            let (w, h) = gb.frame_size();
            Some(GifRecorder::create(&dir.join(VIDEO_FILE), w, h, self.config.fps)?)
        } else {
            None
        };

        gb.reset()?;
        tracing::info!(
            results_dir = %dir.display(),
            video = self.config.record_video,
            max_cycles = self.config.max_cycles,
            "session start"
        );

        let mut state = AgentState::default();
        let mut report = SessionReport::default();

        while !gb.is_game_over() {
            if self.config.max_cycles > 0 && report.cycles >= self.config.max_cycles {
                tracing::info!(cycles = report.cycles, "cycle cap reached");
                break;
            }
            if self.sinks.iter().any(|s| !s.is_open()) {
                tracing::info!(cycles = report.cycles, "frame sink closed");
                break;
            }

            let (w, h) = gb.frame_size();
            let frame = gb.frame_buffer();
            if let Some(video) = video.as_mut() {
                video.push_frame(frame, w, h)?;
            }
            for sink in self.sinks.iter_mut() {
                sink.push_frame(frame, w, h)?;
            }

            let obs = Observation::capture(&*gb);
            tracing::trace!(world_x = obs.world_x, "grid\n{}", obs.grid);
            if self.config.debug_grid {
                eprintln!("cycle {} x={}\n{}", report.cycles, obs.world_x, obs.grid);
            }

            let decision = self.expert.decide(&obs, &state);
            report.count(decision.rule);
            state = decision.state;
            report.ticks += self.executor.execute(&decision.plan, &mut state, gb)?;
            report.cycles += 1;
            report.furthest_x = report.furthest_x.max(state.curr_x);
        }

        if let Some(video) = video.as_mut() {
            video.finish()?;
        }
        for sink in self.sinks.iter_mut() {
            sink.finish()?;
        }

        report.game = gb.game_stats();
        report.final_x = gb.x_position();
        report.furthest_x = report.furthest_x.max(report.final_x);
        report.final_stuck = state.stuck;
        report.holes_jumped = state.hole_count;

        write_report(&dir.join(RESULTS_FILE), &report)?;
        tracing::info!(
            cycles = report.cycles,
            ticks = report.ticks,
            furthest_x = report.furthest_x,
            "session end"
        );
        Ok(report)
    }
}

pub fn run_session<G: GameBoy + ?Sized>(
    gb: &mut G,
    config: SessionConfig,
) -> Result<SessionReport> {
    Session::new(config).play(gb)
}

fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("failed writing {}", path.display()))?;
    writer.flush()?;
    Ok(())
}
