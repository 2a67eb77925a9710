//! The round currently being followed.
//!
//! A background task reads the round's PGN stream into a [`BufferSource`].
//! If the stream cannot be opened or breaks, the task switches to polling the
//! round's JSON snapshot instead. Starting another round cancels the task and
//! starts over from an empty buffer.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use broadcast_core::{LiveGame, ReplayError};
use futures::StreamExt;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::lichess::LichessClient;
use crate::source::{BufferSource, GameSource, PolledRound};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    Idle,
    Stream,
    Poll,
}

#[derive(Debug)]
enum RoundSource {
    Stream(BufferSource),
    Poll(PolledRound),
}

#[derive(Debug)]
struct FeedState {
    /// Bumped on every start/stop so a cancelled task cannot write stale data.
    generation: u64,
    round_id: Option<String>,
    source: RoundSource,
}

impl RoundSource {
    fn as_source(&self) -> &dyn GameSource {
        match self {
            RoundSource::Stream(buffer) => buffer,
            RoundSource::Poll(round) => round,
        }
    }
}

impl FeedState {
    fn mode(&self) -> FeedMode {
        match (&self.round_id, &self.source) {
            (None, _) => FeedMode::Idle,
            (Some(_), RoundSource::Stream(_)) => FeedMode::Stream,
            (Some(_), RoundSource::Poll(_)) => FeedMode::Poll,
        }
    }
}

/// What `GET /api/games` reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub round_id: Option<String>,
    pub mode: FeedMode,
    pub games: Vec<Pairing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pairing {
    pub white_player: String,
    pub black_player: String,
}

pub struct RoundFeed {
    client: Arc<LichessClient>,
    state: Arc<RwLock<FeedState>>,
    task: Mutex<Option<CancellationToken>>,
    poll_every: Duration,
}

impl RoundFeed {
    pub fn new(client: LichessClient, poll_every: Duration) -> Self {
        Self {
            client: Arc::new(client),
            state: Arc::new(RwLock::new(FeedState {
                generation: 0,
                round_id: None,
                source: RoundSource::Stream(BufferSource::new()),
            })),
            task: Mutex::new(None),
            poll_every,
        }
    }

    /// Follow `round_id`, abandoning the previous round and its buffer.
    pub fn start(&self, round_id: &str) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.swap_task(Some(cancel.clone())) {
            previous.cancel();
        }

        let generation = {
            let mut state = write(&self.state);
            state.generation += 1;
            state.round_id = Some(round_id.to_string());
            state.source = RoundSource::Stream(BufferSource::new());
            state.generation
        };

        info!(round_id, "following broadcast round");
        tokio::spawn(follow_round(
            self.client.clone(),
            self.state.clone(),
            round_id.to_string(),
            generation,
            cancel,
            self.poll_every,
        ));
    }

    /// Stop following the current round and drop its data.
    pub fn stop(&self) {
        if let Some(previous) = self.swap_task(None) {
            previous.cancel();
        }
        let mut state = write(&self.state);
        state.generation += 1;
        state.round_id = None;
        state.source = RoundSource::Stream(BufferSource::new());
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let state = read(&self.state);
        FeedSnapshot {
            round_id: state.round_id.clone(),
            mode: state.mode(),
            games: state
                .source
                .as_source()
                .pairings()
                .into_iter()
                .map(|(white_player, black_player)| Pairing {
                    white_player,
                    black_player,
                })
                .collect(),
        }
    }

    fn swap_task(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut task = match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *task, next)
    }
}

impl GameSource for RoundFeed {
    fn lookup(&self, white: &str, black: &str) -> Option<Result<LiveGame, ReplayError>> {
        read(&self.state).source.as_source().lookup(white, black)
    }

    fn pairings(&self) -> Vec<(String, String)> {
        read(&self.state).source.as_source().pairings()
    }
}

impl Drop for RoundFeed {
    fn drop(&mut self) {
        if let Some(task) = self.swap_task(None) {
            task.cancel();
        }
    }
}

fn read(state: &RwLock<FeedState>) -> RwLockReadGuard<'_, FeedState> {
    match state.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write(state: &RwLock<FeedState>) -> RwLockWriteGuard<'_, FeedState> {
    match state.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Apply `f` to the state if it still belongs to `generation`.
fn with_current<F>(state: &RwLock<FeedState>, generation: u64, f: F) -> bool
where
    F: FnOnce(&mut FeedState),
{
    let mut state = write(state);
    if state.generation != generation {
        return false;
    }
    f(&mut state);
    true
}

async fn follow_round(
    client: Arc<LichessClient>,
    state: Arc<RwLock<FeedState>>,
    round_id: String,
    generation: u64,
    cancel: CancellationToken,
    poll_every: Duration,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = client.stream_round(&round_id) => opened,
    };

    match opened {
        Ok(stream) => {
            let mut stream = std::pin::pin!(stream);
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => return,
                    chunk = stream.next() => chunk,
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        let live = with_current(&state, generation, |s| {
                            if let RoundSource::Stream(buffer) = &mut s.source {
                                buffer.append_bytes(&bytes);
                            }
                        });
                        if !live {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(round_id = %round_id, error = %e, "round stream broke, falling back to polling");
                        break;
                    }
                    None => {
                        info!(round_id = %round_id, "round stream ended");
                        return;
                    }
                }
            }
        }
        Err(e) => {
            warn!(round_id = %round_id, error = %e, "round stream unavailable, falling back to polling");
        }
    }

    poll_round(client, state, round_id, generation, cancel, poll_every).await;
}

async fn poll_round(
    client: Arc<LichessClient>,
    state: Arc<RwLock<FeedState>>,
    round_id: String,
    generation: u64,
    cancel: CancellationToken,
    poll_every: Duration,
) {
    let mut ticker = tokio::time::interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = client.fetch_round(&round_id) => fetched,
        };

        match fetched {
            Ok(resp) => {
                let round = PolledRound::from(resp);
                let games = round.len();
                let live = with_current(&state, generation, |s| s.source = RoundSource::Poll(round));
                if !live {
                    return;
                }
                debug!(round_id = %round_id, games, "polled round");
            }
            Err(e) => warn!(round_id = %round_id, error = %e, "round poll failed"),
        }
    }
}
