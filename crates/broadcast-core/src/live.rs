//! Everything the overlay needs about one game, derived in a single pass.

use serde::Serialize;

use crate::clock::{base_time_seconds, extract_clocks, ClockState};
use crate::error::ReplayError;
use crate::game::{GameBlock, GameResult};
use crate::replay::{replay, StoppedMove};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveGame {
    pub fen: String,
    pub result: GameResult,
    pub clock: ClockState,
    /// Half-moves since the game's starting position, used to keep a link
    /// from moving backwards.
    pub ply: u32,
    /// Set when the movetext has a move that could not be played; the
    /// position is the one reached before it.
    pub stopped_at: Option<StoppedMove>,
}

impl LiveGame {
    /// Half-move count encoded in a FEN's full-move number and side to move.
    pub fn ply_from_fen(fen: &str) -> u32 {
        let mut fields = fen.split_whitespace().skip(1);
        let black_to_move = fields.next() == Some("b");
        let fullmoves: u32 = fields
            .nth(3)
            .and_then(|f| f.parse().ok())
            .unwrap_or(1)
            .max(1);
        (fullmoves - 1) * 2 + u32::from(black_to_move)
    }
}

/// Replay the block, read its clocks and its result.
pub fn analyze(game: &GameBlock) -> Result<LiveGame, ReplayError> {
    let replay = replay(game)?;
    let base = game.time_control().map(base_time_seconds).unwrap_or(0);
    let clock = extract_clocks(&game.movetext, base);

    Ok(LiveGame {
        ply: LiveGame::ply_from_fen(&replay.fen),
        fen: replay.fen,
        result: game.result(),
        clock,
        stopped_at: replay.stopped_at,
    })
}
