// Data structures shared by the LMS client, the bridge engine and the MPRIS export

pub mod loop_status;
pub mod metadata;
pub mod playback_status;
pub mod player_call;
pub mod snapshot;

pub use loop_status::LoopStatus;
pub use metadata::{Metadata, TrackId};
pub use playback_status::PlaybackStatus;
pub use player_call::PlayerCall;
pub use snapshot::{MprisSnapshot, PlayerView};
