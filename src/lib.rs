pub mod env;
pub mod executor;
pub mod expert;
pub mod hazard;
pub mod observation;
pub mod replay;
pub mod session;
pub mod video;

pub use env::{ram, Button, GameBoy, GameStats};
pub use executor::{Executor, ExecutorConfig};
pub use expert::{decide, ActionPlan, AgentState, Decision, Expert, ExpertConfig, Rule};
pub use observation::{EntityKind, GridPos, Observation, PlayerAnchor, Tile, TileGrid};
pub use replay::{InputEvent, ReplayConsole, Snapshot};
pub use session::{run_session, FrameSink, Session, SessionConfig, SessionReport};
pub use video::GifRecorder;
