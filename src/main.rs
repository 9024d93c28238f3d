// =============================================================================
// Super Mario Land: rule-based expert agent
// =============================================================================
// Build & Run:
//   cargo build --release
//   cargo run --release -- replay  --trace runs/1-1.jsonl --results-dir results
//   cargo run --release -- inspect --trace runs/1-1.jsonl --tick 120

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mario_expert::env::{SCREEN_HEIGHT, SCREEN_WIDTH};
use mario_expert::{
    AgentState, Expert, FrameSink, GameBoy, Observation, ReplayConsole, Session, SessionConfig,
};

fn blit_rgba_to_u32(fb: &[u8], out: &mut [u32]) {
    for (dst, src) in out.iter_mut().zip(fb.chunks_exact(4)) {
        *dst = ((src[0] as u32) << 16) | ((src[1] as u32) << 8) | (src[2] as u32);
    }
}

// =============================================================================
// Window
// =============================================================================

struct WindowSink {
    window: minifb::Window,
    buf: Vec<u32>,
}

impl WindowSink {
    fn open(title: &str) -> Result<Self> {
        let mut window = minifb::Window::new(
            title,
            SCREEN_WIDTH,
            SCREEN_HEIGHT,
            minifb::WindowOptions {
                resize: true,
                scale: minifb::Scale::X4,
                ..Default::default()
            },
        )?;
        window.set_target_fps(60);
        Ok(Self {
            window,
            buf: vec![0u32; SCREEN_WIDTH * SCREEN_HEIGHT],
        })
    }
}

impl FrameSink for WindowSink {
    fn push_frame(&mut self, rgba: &[u8], width: usize, height: usize) -> Result<()> {
        self.buf.resize(width * height, 0);
        blit_rgba_to_u32(rgba, &mut self.buf);
        self.window.update_with_buffer(&self.buf, width, height)?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(minifb::Key::Escape)
    }
}

// =============================================================================
// Commands
// =============================================================================

fn replay(args: &ReplayArgs) -> Result<()> {
    let mut gb = ReplayConsole::load(&args.trace)?;

    eprintln!("═══════════════════════════════════════════════════");
    eprintln!("  Mario expert — replay");
    eprintln!("  Trace:    {} ({} ticks)", args.trace.display(), gb.len());
    eprintln!("  Results:  {}", args.results_dir.display());
    eprintln!("═══════════════════════════════════════════════════");

    let mut session = Session::new(SessionConfig {
        results_dir: args.results_dir.clone(),
        record_video: !args.no_video,
        max_cycles: args.max_cycles,
        ..SessionConfig::default()
    });
    if !args.headless {
        session.add_sink(Box::new(WindowSink::open("Mario Expert — Replay")?));
    }

    let report = session.play(&mut gb)?;

    eprintln!("═══════════════════════════════════════════════════");
    eprintln!(
        "  Done: {} cycles, {} ticks, furthest x {}",
        report.cycles, report.ticks, report.furthest_x
    );
    for (rule, count) in &report.rules {
        eprintln!("    {rule:<28} {count:>6}");
    }
    eprintln!("═══════════════════════════════════════════════════");
    Ok(())
}

fn inspect(args: &InspectArgs) -> Result<()> {
    let mut gb = ReplayConsole::load(&args.trace)?;
    gb.seek(args.tick)?;

    let obs = Observation::capture(&gb);
    let expert = Expert::default();
    let prev_x = args.tick.checked_sub(1).and_then(|t| gb.snapshot(t)).map_or(0, |s| s.x_position);
    let state = AgentState {
        prev_x: args.prev_x.unwrap_or(prev_x),
        stuck: args.stuck,
        ..AgentState::default()
    };
    let decision = expert.decide(&obs, &state);

    println!("tick {}  world_x {}  game_over {}", args.tick, obs.world_x, gb.is_game_over());
    println!(
        "player ({}, {})  on_ground {:#04x}  power {:#04x}",
        obs.player_x, obs.player_y, obs.on_ground, obs.power_state
    );
    match obs.player_cell(expert.config.player_anchor) {
        Some(cell) => println!("player cell row {} col {}", cell.row, cell.col),
        None => println!("player cell not on grid"),
    }
    println!("{}", obs.grid);
    for (slot, object) in obs.objects.iter().enumerate() {
        if let Some(kind) = object.entity() {
            println!(
                "slot {slot}: {} ({:#04x}) at ({}, {})",
                kind.name(),
                object.kind,
                object.x,
                object.y
            );
        }
    }
    println!("rule  {}", decision.rule.name());
    println!("plan  {:?}", decision.plan);
    println!("state {:?}", decision.state);
    Ok(())
}

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "mario-expert", about = "Rule-based Super Mario Land agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the expert against a recorded trace
    Replay(ReplayArgs),
    /// Show the observation and decision at one tick of a trace
    Inspect(InspectArgs),
}

#[derive(Parser)]
struct ReplayArgs {
    #[arg(long)]
    trace: PathBuf,
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,
    #[arg(long, default_value_t = false)]
    headless: bool,
    #[arg(long, default_value_t = false)]
    no_video: bool,
    /// Stop after this many decision cycles (0 = until game over)
    #[arg(long, default_value_t = 0)]
    max_cycles: u64,
}

#[derive(Parser)]
struct InspectArgs {
    #[arg(long)]
    trace: PathBuf,
    #[arg(long)]
    tick: usize,
    /// World x of the previous cycle; defaults to the previous tick's
    #[arg(long)]
    prev_x: Option<i32>,
    #[arg(long, default_value_t = 0)]
    stuck: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Replay(args) => replay(args),
        Commands::Inspect(args) => inspect(args),
    }
}
