//! Cheap structural FEN check done before any backend is contacted.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenProblem {
    TooFewFields,
    RankCount(usize),
    BadPiece(char),
    RankWidth { rank: usize, squares: u32 },
    SideToMove,
}

impl fmt::Display for FenProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenProblem::TooFewFields => write!(f, "fewer than 4 fields"),
            FenProblem::RankCount(n) => write!(f, "{n} ranks instead of 8"),
            FenProblem::BadPiece(c) => write!(f, "unexpected character {c:?} in board"),
            FenProblem::RankWidth { rank, squares } => {
                write!(f, "rank {rank} covers {squares} squares")
            }
            FenProblem::SideToMove => write!(f, "side to move must be 'w' or 'b'"),
        }
    }
}

/// At least four fields, eight ranks of exactly eight squares each, and a
/// side to move of `w` or `b`.
pub fn validate_fen(fen: &str) -> Result<(), FenProblem> {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(FenProblem::TooFewFields);
    }

    let ranks: Vec<&str> = fields[0].split('/').collect();
    if ranks.len() != 8 {
        return Err(FenProblem::RankCount(ranks.len()));
    }
    for (i, rank) in ranks.iter().enumerate() {
        let mut squares = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => squares += c.to_digit(10).unwrap_or(0),
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => {
                    squares += 1
                }
                other => return Err(FenProblem::BadPiece(other)),
            }
        }
        if squares != 8 {
            return Err(FenProblem::RankWidth {
                rank: 8 - i,
                squares,
            });
        }
    }

    match fields[1] {
        "w" | "b" => Ok(()),
        _ => Err(FenProblem::SideToMove),
    }
}

/// Whether black is to move; only meaningful for a validated FEN.
pub fn black_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) == Some("b")
}
