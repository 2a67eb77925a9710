//! Tracked overlay slots ("links") and the periodic update cycle.
//!
//! A cycle looks every link up in the round, and for each one whose position
//! or result moved it asks the oracle for a score and stores the new state.
//! The link list lock is never held while an evaluation is running.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use broadcast_core::{GameResult, LiveGame, Side};
use chrono::{DateTime, Utc};
use eval_oracle::{EvalOracle, Evaluation, OracleError};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::source::GameSource;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Player names must not be empty")]
    EmptyName,

    #[error("{white} vs {black} is already tracked")]
    Duplicate { white: String, black: String },

    #[error("Game id '{0}' is not of the form '<white>-vs-<black>'")]
    MalformedGameId(String),
}

/// Split a `<white>-vs-<black>` game id into the two player names.
pub fn parse_game_id(id: &str) -> Result<(&str, &str), LinkError> {
    match id.split_once("-vs-") {
        Some((w, b)) if !w.trim().is_empty() && !b.trim().is_empty() => Ok((w.trim(), b.trim())),
        _ => Err(LinkError::MalformedGameId(id.to_string())),
    }
}

/// One overlay slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedLink {
    pub white_player: String,
    pub black_player: String,
    pub last_fen: Option<String>,
    pub result: GameResult,
    pub white_seconds: u32,
    pub black_seconds: u32,
    pub side_to_move: Option<Side>,
    pub move_number: u32,
    /// Pawns from White's point of view.
    pub evaluation: Option<f64>,
    pub mate_in: Option<i32>,
    pub best_move: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    pub ply: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackedLink {
    pub fn new(white: &str, black: &str) -> Self {
        Self {
            white_player: white.to_string(),
            black_player: black.to_string(),
            last_fen: None,
            result: GameResult::Ongoing,
            white_seconds: 0,
            black_seconds: 0,
            side_to_move: None,
            move_number: 0,
            evaluation: None,
            mate_in: None,
            best_move: None,
            error: None,
            ply: 0,
            updated_at: None,
        }
    }

    /// `<white>-vs-<black>`
    pub fn game_id(&self) -> String {
        format!("{}-vs-{}", self.white_player, self.black_player)
    }

    fn is(&self, white: &str, black: &str) -> bool {
        self.white_player == white && self.black_player == black
    }

    /// Whether `game` is news for this link: a different position or result,
    /// and never an earlier position than the one already shown.
    fn wants(&self, game: &LiveGame) -> bool {
        if self.last_fen.is_some() && game.ply < self.ply {
            return false;
        }
        self.last_fen.as_deref() != Some(game.fen.as_str()) || self.result != game.result
    }

    fn reset(&mut self) {
        *self = Self::new(&self.white_player, &self.black_player);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlunderSettings {
    /// Only swings starting inside `-band..=band` pawns count.
    pub band: f64,
    /// Minimum swing, in pawns.
    pub threshold: f64,
    /// Minimum gap between two swing notifications, across all links.
    pub cooldown: Duration,
    /// Quiet period after the tracker (re)starts while the round replays.
    pub warmup: Duration,
}

impl Default for BlunderSettings {
    fn default() -> Self {
        Self {
            band: 4.0,
            threshold: 2.0,
            cooldown: Duration::from_secs(10),
            warmup: Duration::from_secs(5),
        }
    }
}

/// Decides whether an evaluation swing is worth a notification.
#[derive(Debug)]
pub struct BlunderDetector {
    settings: BlunderSettings,
    started: Instant,
    last_fired: Option<Instant>,
}

impl BlunderDetector {
    pub fn new(settings: BlunderSettings, started: Instant) -> Self {
        Self {
            settings,
            started,
            last_fired: None,
        }
    }

    /// Start a new warm-up period, e.g. after a round change.
    pub fn restart(&mut self, now: Instant) {
        self.started = now;
        self.last_fired = None;
    }

    /// Records the notification when it fires.
    pub fn check(&mut self, previous: Option<f64>, current: f64, now: Instant) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        if now.duration_since(self.started) < self.settings.warmup {
            return false;
        }
        if previous.abs() > self.settings.band {
            return false;
        }
        if (current - previous).abs() < self.settings.threshold {
            return false;
        }
        if let Some(last) = self.last_fired {
            if now.duration_since(last) < self.settings.cooldown {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlunderKind {
    Swing { from: f64, to: f64 },
    Result { result: GameResult },
}

/// Notification for the overlay, addressed by link index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlunderEvent {
    pub index: usize,
    pub white_player: String,
    pub black_player: String,
    #[serde(flatten)]
    pub kind: BlunderKind,
    pub at: DateTime<Utc>,
}

/// A link whose game moved on and needs a fresh evaluation.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub white: String,
    pub black: String,
    pub game: LiveGame,
    /// Round the lookup was made in; updates from a reset round are dropped.
    epoch: u64,
}

struct TrackerState {
    links: Vec<TrackedLink>,
    detector: BlunderDetector,
    /// Bumped by `reset_round`.
    epoch: u64,
}

pub struct LinkTracker {
    state: Mutex<TrackerState>,
    events: broadcast::Sender<BlunderEvent>,
}

impl LinkTracker {
    pub fn new(settings: BlunderSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(TrackerState {
                links: Vec::new(),
                detector: BlunderDetector::new(settings, Instant::now()),
                epoch: 0,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start tracking a pairing; returns its index.
    pub fn add_link(&self, white: &str, black: &str) -> Result<usize, LinkError> {
        let (white, black) = (white.trim(), black.trim());
        if white.is_empty() || black.is_empty() {
            return Err(LinkError::EmptyName);
        }

        let mut state = self.lock();
        if state.links.iter().any(|l| l.is(white, black)) {
            return Err(LinkError::Duplicate {
                white: white.to_string(),
                black: black.to_string(),
            });
        }
        state.links.push(TrackedLink::new(white, black));
        info!(white, black, "tracking game");
        Ok(state.links.len() - 1)
    }

    /// Seed links from `<white>-vs-<black>` ids. Already tracked pairings are
    /// skipped; a malformed id fails the whole batch before anything is added.
    pub fn add_game_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<usize>, LinkError> {
        let pairs = ids
            .iter()
            .map(|id| parse_game_id(id.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut added = Vec::new();
        for (white, black) in pairs {
            match self.add_link(white, black) {
                Ok(index) => added.push(index),
                Err(LinkError::Duplicate { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    pub fn remove_link(&self, index: usize) -> Option<TrackedLink> {
        let mut state = self.lock();
        if index >= state.links.len() {
            return None;
        }
        let link = state.links.remove(index);
        info!(white = %link.white_player, black = %link.black_player, "stopped tracking game");
        Some(link)
    }

    pub fn snapshot(&self) -> Vec<TrackedLink> {
        self.lock().links.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every link's game state (the round changed), keeping the pairings.
    pub fn reset_round(&self, now: Instant) {
        let mut state = self.lock();
        for link in &mut state.links {
            link.reset();
        }
        state.detector.restart(now);
        state.epoch += 1;
    }

    /// Drop all links.
    pub fn clear(&self) {
        self.lock().links.clear();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlunderEvent> {
        self.events.subscribe()
    }

    /// Look every link up in `source` and collect those that need an
    /// evaluation. Links whose game cannot be replayed get their error set.
    pub fn pending_updates<S: GameSource + ?Sized>(&self, source: &S) -> Vec<PendingUpdate> {
        let mut state = self.lock();
        let epoch = state.epoch;
        let mut pending = Vec::new();

        for link in &mut state.links {
            match source.lookup(&link.white_player, &link.black_player) {
                None => {}
                Some(Err(e)) => {
                    warn!(white = %link.white_player, black = %link.black_player, error = %e, "cannot replay game");
                    link.error = Some(e.to_string());
                }
                Some(Ok(game)) if link.wants(&game) => pending.push(PendingUpdate {
                    white: link.white_player.clone(),
                    black: link.black_player.clone(),
                    game,
                    epoch,
                }),
                Some(Ok(game)) => {
                    if game.ply < link.ply {
                        debug!(white = %link.white_player, ply = game.ply, shown = link.ply, "ignoring older position");
                    }
                }
            }
        }
        pending
    }

    /// Store an evaluated update. Returns whether a link changed.
    ///
    /// A failed or empty evaluation only records the error, so the same
    /// position is retried next cycle.
    pub fn apply_update(
        &self,
        update: PendingUpdate,
        outcome: Result<Option<Evaluation>, OracleError>,
        now: Instant,
    ) -> bool {
        let mut state = self.lock();
        let TrackerState {
            links,
            detector,
            epoch,
        } = &mut *state;

        if update.epoch != *epoch {
            debug!(white = %update.white, black = %update.black, "dropping update from a reset round");
            return false;
        }

        let Some(index) = links.iter().position(|l| l.is(&update.white, &update.black)) else {
            // untracked while it was being evaluated
            return false;
        };
        let link = &mut links[index];

        let evaluation = match outcome {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => {
                link.error = Some("No evaluation available".to_string());
                return false;
            }
            Err(e) => {
                warn!(white = %link.white_player, black = %link.black_player, error = %e, "evaluation failed");
                link.error = Some(e.to_string());
                return false;
            }
        };

        if !link.wants(&update.game) {
            return false;
        }

        let game = update.game;
        let previous = link.evaluation;
        let previous_result = link.result;
        let seen_before = link.last_fen.is_some();

        link.last_fen = Some(game.fen);
        link.result = game.result;
        link.white_seconds = game.clock.white_seconds;
        link.black_seconds = game.clock.black_seconds;
        link.side_to_move = Some(game.clock.side_to_move);
        link.move_number = game.clock.move_number;
        link.ply = game.ply;
        link.evaluation = Some(evaluation.evaluation);
        link.mate_in = evaluation.mate_in;
        link.best_move = evaluation.best_move;
        link.error = None;
        if let Some(stopped) = game.stopped_at {
            warn!(
                index,
                white = %link.white_player,
                black = %link.black_player,
                move_index = stopped.index,
                token = %stopped.token,
                "replay stopped at an unplayable move"
            );
            link.error = Some(format!(
                "Replay stopped at move {} ({})",
                stopped.index, stopped.token
            ));
        }
        link.updated_at = Some(Utc::now());

        let mut events = Vec::new();
        if detector.check(previous, evaluation.evaluation, now) {
            events.push(BlunderKind::Swing {
                from: previous.unwrap_or_default(),
                to: evaluation.evaluation,
            });
        }
        if seen_before && !previous_result.is_finished() && link.result.is_decisive() {
            events.push(BlunderKind::Result {
                result: link.result,
            });
        }

        for kind in events {
            info!(index, white = %link.white_player, black = %link.black_player, ?kind, "notification");
            // no subscribers is fine
            let _ = self.events.send(BlunderEvent {
                index,
                white_player: link.white_player.clone(),
                black_player: link.black_player.clone(),
                kind,
                at: Utc::now(),
            });
        }
        true
    }

    /// One pass over all links. Returns how many links were updated.
    pub async fn run_cycle<S: GameSource + ?Sized>(
        &self,
        source: &S,
        oracle: &EvalOracle,
        link_delay: Duration,
    ) -> usize {
        let pending = self.pending_updates(source);
        let mut updated = 0;

        for (i, update) in pending.into_iter().enumerate() {
            if i > 0 && !link_delay.is_zero() {
                tokio::time::sleep(link_delay).await;
            }
            let outcome = oracle.evaluate(&update.game.fen, None).await;
            if self.apply_update(update, outcome, Instant::now()) {
                updated += 1;
            }
        }
        updated
    }
}
