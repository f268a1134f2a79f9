// The LMS to MPRIS bridge: status mapping, command translation, poll scheduling and the engine

pub mod commands;
pub mod engine;
pub mod mapper;
pub mod position;
pub mod scheduler;

pub use commands::{translate, CommandContext, LocalUpdate, Translation};
pub use engine::{Bridge, BridgeHandle, EngineChannel, EngineEvent};
pub use mapper::{map_status, normalize_volume_percent, MappedStatus};
pub use position::PositionClock;
pub use scheduler::{PollCycle, PollState};
