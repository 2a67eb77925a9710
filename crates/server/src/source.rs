//! Where tracked games are looked up: the accumulated PGN stream of a round,
//! or the last JSON snapshot when the stream is unavailable.

use broadcast_core::game::Side;
use broadcast_core::live::analyze;
use broadcast_core::matcher::{available_pairings, find_game};
use broadcast_core::{ClockState, GameResult, LiveGame, ReplayError, StreamBuffer};

use crate::clients::lichess::{RoundGame, RoundResponse};

pub trait GameSource {
    /// Current state of the most recent game between `white` and `black`.
    ///
    /// `None` means the pairing is not (yet) in the round.
    fn lookup(&self, white: &str, black: &str) -> Option<Result<LiveGame, ReplayError>>;

    /// Distinct `(white, black)` pairings in first-seen order.
    fn pairings(&self) -> Vec<(String, String)>;
}

/// Games parsed out of the streamed round PGN.
#[derive(Debug, Default)]
pub struct BufferSource {
    buffer: StreamBuffer,
}

impl BufferSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.buffer.append(chunk);
    }

    pub fn append_bytes(&mut self, chunk: &[u8]) {
        self.buffer.append_bytes(chunk);
    }
}

impl GameSource for BufferSource {
    fn lookup(&self, white: &str, black: &str) -> Option<Result<LiveGame, ReplayError>> {
        let blocks = self.buffer.segment();
        find_game(&blocks, white, black).map(|game| analyze(&game))
    }

    fn pairings(&self) -> Vec<(String, String)> {
        available_pairings(&self.buffer.segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PolledGame {
    white: String,
    black: String,
    fen: String,
    white_ms: u64,
    black_ms: u64,
    result: GameResult,
}

/// A round as reported by the JSON endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolledRound {
    games: Vec<PolledGame>,
}

impl PolledRound {
    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl From<RoundResponse> for PolledRound {
    /// Games without a position or without both players are dropped.
    fn from(resp: RoundResponse) -> Self {
        let games = resp.games.into_iter().filter_map(polled_game).collect();
        Self { games }
    }
}

fn polled_game(game: RoundGame) -> Option<PolledGame> {
    let fen = game.fen.filter(|f| !f.trim().is_empty())?;
    let [white, black] = game.players.get(..2)? else {
        return None;
    };
    Some(PolledGame {
        white: white.name.trim().to_string(),
        black: black.name.trim().to_string(),
        fen,
        white_ms: white.clock.unwrap_or(0),
        black_ms: black.clock.unwrap_or(0),
        result: game
            .status
            .as_deref()
            .and_then(GameResult::from_token)
            .unwrap_or_default(),
    })
}

impl GameSource for PolledRound {
    fn lookup(&self, white: &str, black: &str) -> Option<Result<LiveGame, ReplayError>> {
        let game = self
            .games
            .iter()
            .rev()
            .find(|g| g.white == white.trim() && g.black == black.trim())?;

        let side_to_move = if game.fen.split_whitespace().nth(1) == Some("b") {
            Side::Black
        } else {
            Side::White
        };
        let move_number = game
            .fen
            .split_whitespace()
            .nth(5)
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);

        Some(Ok(LiveGame {
            ply: LiveGame::ply_from_fen(&game.fen),
            fen: game.fen.clone(),
            result: game.result,
            clock: ClockState {
                white_seconds: (game.white_ms / 1000) as u32,
                black_seconds: (game.black_ms / 1000) as u32,
                side_to_move,
                move_number,
            },
            stopped_at: None,
        }))
    }

    fn pairings(&self) -> Vec<(String, String)> {
        let mut seen = Vec::new();
        for g in &self.games {
            let pair = (g.white.clone(), g.black.clone());
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::lichess::RoundPlayer;

    fn player(name: &str, clock: Option<u64>) -> RoundPlayer {
        RoundPlayer {
            name: name.to_string(),
            clock,
        }
    }

    #[test]
    fn test_buffer_source_lookup() {
        let mut source = BufferSource::new();
        source.append("[White \"Carlsen, Magnus\"]\n[Black \"Caruana, Fabiano\"]\n\n1. e4 { [%clk 1:59:58] } *\n\n\n");
        source.append("[White \"Gukesh D\"]\n[Black \"Firouzja, Alireza\"]\n\n1. d4 { [%clk 1:59:50] } 1... d5 { [%clk 1:59:40] } *");

        let live = source.lookup("Gukesh D", "Firouzja, Alireza").unwrap().unwrap();
        assert_eq!(live.ply, 2);
        assert_eq!(live.clock.side_to_move, Side::White);
        assert!(source.lookup("Gukesh D", "Carlsen, Magnus").is_none());
        assert_eq!(
            source.pairings(),
            vec![
                ("Carlsen, Magnus".to_string(), "Caruana, Fabiano".to_string()),
                ("Gukesh D".to_string(), "Firouzja, Alireza".to_string()),
            ]
        );
    }

    #[test]
    fn test_buffer_source_reports_bad_start_fen() {
        let mut source = BufferSource::new();
        source.append("[White \"A\"]\n[Black \"B\"]\n[FEN \"not a fen\"]\n\n1. e4 *");
        assert!(matches!(source.lookup("A", "B"), Some(Err(_))));
    }

    #[test]
    fn test_polled_round_lookup() {
        let round = PolledRound::from(RoundResponse {
            games: vec![
                RoundGame {
                    fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".into()),
                    players: vec![player("A", Some(5_990_000)), player("B", Some(6_000_000))],
                    status: Some("*".into()),
                },
                RoundGame {
                    fen: None,
                    players: vec![player("C", None), player("D", None)],
                    status: None,
                },
                RoundGame {
                    fen: Some("8/8/8/8/8/8/8/K6k w - - 0 61".into()),
                    players: vec![player("E", Some(1_500)), player("F", Some(0))],
                    status: Some("½-½".into()),
                },
            ],
        });
        assert_eq!(round.len(), 2);

        let live = round.lookup("A", "B").unwrap().unwrap();
        assert_eq!(live.clock.white_seconds, 5990);
        assert_eq!(live.clock.black_seconds, 6000);
        assert_eq!(live.clock.side_to_move, Side::Black);
        assert_eq!(live.clock.move_number, 1);
        assert_eq!(live.ply, 1);

        let drawn = round.lookup("E", "F").unwrap().unwrap();
        assert_eq!(drawn.result, GameResult::Draw);
        assert_eq!(drawn.clock.white_seconds, 1);

        assert!(round.lookup("C", "D").is_none());
    }
}
