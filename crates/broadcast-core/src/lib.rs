//! Live broadcast PGN handling: buffering the round stream, picking a game out
//! of it, replaying its moves and reading its clocks.

pub mod clock;
pub mod error;
pub mod game;
pub mod live;
pub mod matcher;
pub mod replay;
pub mod stream_buffer;

pub use clock::ClockState;
pub use error::ReplayError;
pub use game::{GameBlock, GameResult, Side};
pub use live::LiveGame;
pub use replay::{Replay, StoppedMove};
pub use stream_buffer::StreamBuffer;
