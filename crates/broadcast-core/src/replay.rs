//! Replaying a game's movetext to its current position.
//!
//! Replay is best-effort: streamed PGN is often cut mid-token or garbled, so the
//! first move that does not parse or is not legal ends the replay and the
//! position reached so far is reported.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::{CastlingMode, CastlingSide, Chess, EnPassantMode, Move, Position, Role};

use crate::error::ReplayError;
use crate::game::{GameBlock, GameResult, Side};

static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+").expect("valid move number regex"));

/// Final state of a replayed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replay {
    pub fen: String,
    pub side_to_move: Side,
    pub fullmoves: u32,
    /// Number of moves successfully applied.
    pub plies: usize,
    /// The move replay stopped at, if any.
    pub stopped_at: Option<StoppedMove>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoppedMove {
    /// 1-based index of the offending move within the movetext.
    pub index: usize,
    pub token: String,
}

/// Replay `game` from its starting position.
///
/// Errors only when an explicit `FEN` tag cannot be turned into a position;
/// bad moves are not errors.
pub fn replay(game: &GameBlock) -> Result<Replay, ReplayError> {
    let (mut pos, mode) = starting_position(game)?;
    let tokens = tokenize_movetext(&game.movetext);

    let mut plies = 0;
    let mut stopped_at = None;
    for (i, token) in tokens.iter().enumerate() {
        match resolve_move(&pos, token, mode) {
            Some(m) => {
                pos.play_unchecked(m);
                plies += 1;
            }
            None => {
                stopped_at = Some(StoppedMove {
                    index: i + 1,
                    token: token.clone(),
                });
                break;
            }
        }
    }

    Ok(Replay {
        fen: Fen::from_position(&pos, EnPassantMode::Legal).to_string(),
        side_to_move: pos.turn().into(),
        fullmoves: pos.fullmoves().get(),
        plies,
        stopped_at,
    })
}

/// The standard initial position, or the `FEN` tag parsed with Chess960
/// castling rules (Freestyle / Chess960 broadcasts always carry one).
pub fn starting_position(game: &GameBlock) -> Result<(Chess, CastlingMode), ReplayError> {
    let Some(fen) = game.start_fen() else {
        return Ok((Chess::default(), CastlingMode::Standard));
    };

    let parsed: Fen = fen
        .parse()
        .map_err(|e: shakmaty::fen::ParseFenError| ReplayError::InvalidStartFen(e.to_string()))?;
    let pos = parsed
        .into_position::<Chess>(CastlingMode::Chess960)
        .map_err(|e| ReplayError::IllegalStartPosition(e.to_string()))?;
    Ok((pos, CastlingMode::Chess960))
}

/// Strip comments, variations, move numbers, NAGs, annotation glyphs and result
/// markers, leaving only SAN tokens.
pub fn tokenize_movetext(movetext: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(movetext.len());
    let mut in_comment = false;
    let mut variation_depth = 0usize;

    for ch in movetext.chars() {
        match ch {
            '{' if !in_comment => {
                in_comment = true;
                cleaned.push(' ');
            }
            '}' if in_comment => {
                in_comment = false;
                cleaned.push(' ');
            }
            _ if in_comment => {}
            '(' => {
                variation_depth += 1;
                cleaned.push(' ');
            }
            ')' => {
                variation_depth = variation_depth.saturating_sub(1);
                cleaned.push(' ');
            }
            _ if variation_depth > 0 => {}
            _ => cleaned.push(ch),
        }
    }

    cleaned.split_whitespace().filter_map(clean_token).collect()
}

fn clean_token(raw: &str) -> Option<String> {
    if raw.starts_with('$') || GameResult::from_token(raw).is_some() {
        return None;
    }
    let without_number = MOVE_NUMBER_RE.replace(raw, "");
    let san = without_number.trim_end_matches(['!', '?']);
    if san.is_empty() {
        return None;
    }
    // Zero-castling (`0-0`) is common in hand-entered broadcasts.
    if san.starts_with("0-0") {
        return Some(san.replace('0', "O"));
    }
    Some(san.to_string())
}

fn resolve_move(pos: &Chess, token: &str, mode: CastlingMode) -> Option<Move> {
    let san = SanPlus::from_ascii(token.as_bytes()).ok()?.san;
    let san = match mode {
        CastlingMode::Chess960 => normalize_chess960_castling(pos, san),
        CastlingMode::Standard => san,
    };
    san.to_move(pos).ok()
}

/// In Chess960 the king may already stand next to (or on) its castling
/// destination, so broadcasts sometimes write castling as a plain king move to
/// the destination or onto the castling rook. Rewrite such a move to `O-O` /
/// `O-O-O` when it is not a legal ordinary king move.
fn normalize_chess960_castling(pos: &Chess, san: San) -> San {
    let San::Normal {
        role: Role::King,
        to,
        promotion: None,
        ..
    } = san
    else {
        return san;
    };
    if san.to_move(pos).is_ok() {
        return san;
    }

    let turn = pos.turn();
    for side in [CastlingSide::KingSide, CastlingSide::QueenSide] {
        let matches_target = pos
            .castling_moves(side)
            .iter()
            .any(|m| m.to() == to || side.king_to(turn) == to);
        if matches_target {
            return San::Castle(side);
        }
    }
    san
}
