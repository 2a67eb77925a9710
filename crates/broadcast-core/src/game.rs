use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*\[(\w+)\s+"([^"]*)"\]"#).expect("valid header regex"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("valid comment regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// Game outcome as written in PGN. `Ongoing` covers `*` and a missing result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameResult {
    #[default]
    #[serde(rename = "*")]
    Ongoing,
    #[serde(rename = "1-0")]
    WhiteWin,
    #[serde(rename = "0-1")]
    BlackWin,
    #[serde(rename = "1/2-1/2")]
    Draw,
}

impl GameResult {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "1-0" => Some(GameResult::WhiteWin),
            "0-1" => Some(GameResult::BlackWin),
            "1/2-1/2" | "½-½" => Some(GameResult::Draw),
            "*" => Some(GameResult::Ongoing),
            _ => None,
        }
    }

    pub fn is_finished(self) -> bool {
        self != GameResult::Ongoing
    }

    /// A win for either side.
    pub fn is_decisive(self) -> bool {
        matches!(self, GameResult::WhiteWin | GameResult::BlackWin)
    }
}

/// One game cut out of the round stream: its tag pairs and its raw movetext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameBlock {
    pub headers: BTreeMap<String, String>,
    pub movetext: String,
}

impl GameBlock {
    /// Parse a raw block. Never fails: a block without headers simply has none.
    pub fn parse(raw: &str) -> Self {
        let mut headers = BTreeMap::new();
        for cap in HEADER_RE.captures_iter(raw) {
            headers.insert(cap[1].to_string(), cap[2].to_string());
        }

        let movetext = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !is_tag_line(line))
            .collect::<Vec<_>>()
            .join(" ");

        Self { headers, movetext }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn white(&self) -> Option<&str> {
        self.header("White").map(str::trim)
    }

    pub fn black(&self) -> Option<&str> {
        self.header("Black").map(str::trim)
    }

    pub fn time_control(&self) -> Option<&str> {
        self.header("TimeControl")
    }

    /// Explicit starting position (Chess960 / Freestyle and other set-ups).
    pub fn start_fen(&self) -> Option<&str> {
        self.header("FEN").map(str::trim).filter(|f| !f.is_empty())
    }

    /// A trailing result token in the movetext wins over the `Result` tag,
    /// which broadcasts sometimes update late.
    pub fn result(&self) -> GameResult {
        let without_comments = COMMENT_RE.replace_all(&self.movetext, " ");
        let trailing = without_comments
            .split_whitespace()
            .last()
            .and_then(GameResult::from_token)
            .filter(|r| r.is_finished());

        trailing
            .or_else(|| self.header("Result").and_then(GameResult::from_token))
            .unwrap_or_default()
    }
}

/// A line holding exactly one tag pair. Movetext lines may also start with
/// `[`, e.g. a wrapped comment beginning with `[%clk ...]`.
fn is_tag_line(line: &str) -> bool {
    HEADER_RE
        .find(line)
        .is_some_and(|m| m.start() == 0 && m.end() == line.len())
}
