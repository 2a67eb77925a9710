//! Locating a tracked pairing inside the round's game blocks.

use std::collections::HashSet;

use crate::game::GameBlock;

/// Most recently streamed block whose trimmed `White`/`Black` tags equal the
/// given names exactly. Later blocks shadow earlier ones with the same pairing.
/// Blocks without both player tags are skipped.
pub fn find_game<S: AsRef<str>>(blocks: &[S], white: &str, black: &str) -> Option<GameBlock> {
    blocks.iter().rev().find_map(|raw| {
        let game = GameBlock::parse(raw.as_ref());
        match (game.white(), game.black()) {
            (Some(w), Some(b)) if w == white && b == black => Some(game),
            _ => None,
        }
    })
}

/// Distinct `(white, black)` pairings in first-seen order.
pub fn available_pairings<S: AsRef<str>>(blocks: &[S]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut pairings = Vec::new();
    for raw in blocks {
        let game = GameBlock::parse(raw.as_ref());
        if let (Some(w), Some(b)) = (game.white(), game.black()) {
            let pair = (w.to_string(), b.to_string());
            if seen.insert(pair.clone()) {
                pairings.push(pair);
            }
        }
    }
    pairings
}
