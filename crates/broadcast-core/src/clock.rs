//! Clock annotations (`[%clk H:MM:SS]`) embedded in broadcast movetext.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::game::Side;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[%clk\s+([^\]\s]+)\s*\]").expect("valid clock regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub white_seconds: u32,
    pub black_seconds: u32,
    pub side_to_move: Side,
    pub move_number: u32,
}

/// Derive both clocks, the side to move and the display move number from the
/// movetext's clock annotations.
///
/// Every move carries one annotation, so the count's parity gives the side to
/// move (even: white, odd: black) and the last annotation belongs to the side
/// that just moved. With a single annotation only white's clock is known and
/// black keeps `base_seconds`; that case is kept as the broadcast convention
/// even though a missing first annotation would invert it.
pub fn extract_clocks(movetext: &str, base_seconds: u32) -> ClockState {
    let clocks: Vec<u32> = CLOCK_RE
        .captures_iter(movetext)
        .map(|cap| clock_to_seconds(&cap[1]))
        .collect();
    let count = clocks.len();

    let mut white_seconds = base_seconds;
    let mut black_seconds = base_seconds;
    let side_to_move = if count % 2 == 0 { Side::White } else { Side::Black };

    match count {
        0 => {}
        1 => white_seconds = clocks[0],
        _ => {
            let last = clocks[count - 1];
            let previous = clocks[count - 2];
            if side_to_move == Side::Black {
                white_seconds = last;
                black_seconds = previous;
            } else {
                black_seconds = last;
                white_seconds = previous;
            }
        }
    }

    ClockState {
        white_seconds,
        black_seconds,
        side_to_move,
        move_number: (count / 2) as u32 + 1,
    }
}

/// `H:MM:SS` (fractional seconds allowed) to whole seconds; malformed input is 0.
pub fn clock_to_seconds(clock: &str) -> u32 {
    let parts: Vec<&str> = clock.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return 0;
    };
    let (Ok(h), Ok(m), Ok(s)) = (h.parse::<u32>(), m.parse::<u32>(), s.parse::<f64>()) else {
        return 0;
    };
    if !s.is_finite() || s < 0.0 {
        return 0;
    }
    h.saturating_mul(3600)
        .saturating_add(m.saturating_mul(60))
        .saturating_add(s.trunc() as u32)
}

/// Main time, in seconds, from a `TimeControl` tag: `5400+30` → 5400,
/// `40/7200:3600` → 7200. Anything unparseable is 0.
pub fn base_time_seconds(time_control: &str) -> u32 {
    let first_period = time_control.split(':').next().unwrap_or("");
    let main = first_period.split('+').next().unwrap_or("");
    let main = match main.split_once('/') {
        Some((_, seconds)) => seconds,
        None => main,
    };
    main.trim().parse().unwrap_or(0)
}
