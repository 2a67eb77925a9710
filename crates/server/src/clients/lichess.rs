use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum LichessError {
    #[error("Request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Round {0} not found")]
    NotFound(String),

    #[error("HTTP {0}")]
    Status(StatusCode),
}

/// `GET /api/broadcast/-/-/{roundId}`, reduced to what the overlay reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundResponse {
    #[serde(default)]
    pub games: Vec<RoundGame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundGame {
    #[serde(default)]
    pub fen: Option<String>,
    /// White first, then black.
    #[serde(default)]
    pub players: Vec<RoundPlayer>,
    /// `*`, `1-0`, `0-1` or `½-½`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoundPlayer {
    #[serde(default)]
    pub name: String,
    /// Remaining time in milliseconds.
    #[serde(default)]
    pub clock: Option<u64>,
}

pub struct LichessClient {
    client: Client,
    base_url: String,
}

impl LichessClient {
    pub fn new(base_url: &str) -> Result<Self, LichessError> {
        // no overall timeout: the round stream stays open for hours
        let client = Client::builder()
            .user_agent("EvalBars/1.0")
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Open the live PGN stream of a broadcast round.
    ///
    /// The stream first replays every game so far, then sends each update as
    /// it happens. Chunks are raw bytes and may split a game or a character.
    pub async fn stream_round(
        &self,
        round_id: &str,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, LichessError> {
        let url = format!("{}/api/stream/broadcast/round/{}.pgn", self.base_url, round_id);
        let resp = self.client.get(&url).send().await?;
        check_status(resp.status(), round_id)?;
        Ok(resp.bytes_stream())
    }

    /// One-off JSON snapshot of a round, used when streaming is unavailable.
    pub async fn fetch_round(&self, round_id: &str) -> Result<RoundResponse, LichessError> {
        let url = format!("{}/api/broadcast/-/-/{}", self.base_url, round_id);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(20))
            .send()
            .await?;
        check_status(resp.status(), round_id)?;
        Ok(resp.json().await?)
    }
}

fn check_status(status: StatusCode, round_id: &str) -> Result<(), LichessError> {
    if status == StatusCode::NOT_FOUND {
        return Err(LichessError::NotFound(round_id.to_string()));
    }
    if !status.is_success() {
        return Err(LichessError::Status(status));
    }
    Ok(())
}
