//! Whole pipeline: streamed round PGN -> tracker cycle -> evaluation -> link.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broadcast_core::{GameResult, Side};
use eval_oracle::{EvalBackend, EvalOracle, Evaluation, OracleError, ProgressFn};
use evalbars_server::source::{BufferSource, GameSource};
use evalbars_server::tracker::{BlunderKind, BlunderSettings, LinkTracker};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

const START_960: &str = "bbqnnrkr/pppppppp/8/8/8/8/PPPPPPPP/BBQNNRKR w HFhf - 0 1";
const MOVES: [&str; 10] = ["e4", "e5", "d4", "d5", "Ne3", "Ne6", "Nd3", "Nd6", "g3", "g6"];

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Returns queued scores in order, repeating the last one, and counts calls.
struct QueueBackend {
    scores: Vec<f64>,
    calls: AtomicUsize,
}

impl QueueBackend {
    fn new(scores: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            scores: scores.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvalBackend for QueueBackend {
    async fn evaluate(
        &self,
        _fen: &str,
        _progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let score = self.scores[n.min(self.scores.len() - 1)];
        Ok(Some(Evaluation {
            evaluation: score,
            depth: 18,
            mate_in: None,
            best_move: None,
        }))
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

fn freestyle_round() -> String {
    let clocks = [
        "1:30:55", "1:30:50", "1:30:40", "1:30:30", "1:29:00", "1:28:00", "1:25:10", "1:24:05",
        "1:20:00", "1:19:30",
    ];
    let mut movetext = String::new();
    for (i, (san, clk)) in MOVES.iter().zip(clocks).enumerate() {
        if i % 2 == 0 {
            movetext.push_str(&format!("{}. ", i / 2 + 1));
        } else {
            movetext.push_str(&format!("{}... ", i / 2 + 1));
        }
        movetext.push_str(&format!("{san} {{ [%clk {clk}] }} "));
    }
    movetext.push('*');

    format!(
        "[Event \"Freestyle Chess Grand Slam\"]\n[White \"Carlsen, Magnus\"]\n[Black \"Caruana, Fabiano\"]\n\
         [Variant \"Chess960\"]\n[FEN \"{START_960}\"]\n[SetUp \"1\"]\n[TimeControl \"5400+30\"]\n\n\
         {movetext}\n\n\n\
         [Event \"Freestyle Chess Grand Slam\"]\n[White \"Nakamura, Hikaru\"]\n[Black \"So, Wesley\"]\n\
         [FEN \"{START_960}\"]\n\n1. e4 {{ [%clk 1:30:58] }} *\n\n\n"
    )
}

fn manual_replay() -> String {
    let setup: Fen = START_960.parse().unwrap();
    let mut pos: Chess = setup.into_position(CastlingMode::Chess960).unwrap();
    for san in MOVES {
        let m = san.parse::<San>().unwrap().to_move(&pos).unwrap();
        pos.play_unchecked(m);
    }
    Fen::from_position(&pos, EnPassantMode::Legal).to_string()
}

fn quiet_settings() -> BlunderSettings {
    BlunderSettings {
        warmup: Duration::ZERO,
        ..BlunderSettings::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_freestyle_game_end_to_end() {
    let mut source = BufferSource::new();
    // network chunks cut mid-game
    let round = freestyle_round();
    let (head, tail) = round.as_bytes().split_at(round.len() / 3);
    source.append_bytes(head);
    source.append_bytes(tail);

    let backend = QueueBackend::new(&[0.4]);
    let oracle = EvalOracle::new(backend.clone(), 100);
    let tracker = LinkTracker::new(quiet_settings());
    tracker.add_link("Carlsen, Magnus", "Caruana, Fabiano").unwrap();

    let updated = tracker.run_cycle(&source, &oracle, Duration::ZERO).await;
    assert_eq!(updated, 1);

    let link = &tracker.snapshot()[0];
    assert_eq!(link.last_fen.as_deref(), Some(manual_replay().as_str()));
    assert_eq!(link.move_number, 6);
    assert_eq!(link.side_to_move, Some(Side::White));
    assert_eq!(link.white_seconds, 4800);
    assert_eq!(link.black_seconds, 4770);
    assert_eq!(link.result, GameResult::Ongoing);
    assert_eq!(link.evaluation, Some(0.4));
    assert!(link.error.is_none());
    assert_eq!(backend.calls(), 1);

    // same position next cycle: no second backend call
    assert_eq!(tracker.run_cycle(&source, &oracle, Duration::ZERO).await, 0);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_same_position_in_two_links_hits_cache() {
    let mut source = BufferSource::new();
    source.append(&freestyle_round());
    source.append(
        "[White \"Carlsen, Magnus\"]\n[Black \"So, Wesley\"]\n\n1. e4 *\n\n\n\
         [White \"Caruana, Fabiano\"]\n[Black \"Nakamura, Hikaru\"]\n\n1. e4 *\n\n\n",
    );

    let backend = QueueBackend::new(&[0.3]);
    let oracle = EvalOracle::new(backend.clone(), 100);
    let tracker = LinkTracker::new(quiet_settings());
    tracker
        .add_game_ids(&["Carlsen, Magnus-vs-So, Wesley", "Caruana, Fabiano-vs-Nakamura, Hikaru"])
        .unwrap();

    assert_eq!(tracker.run_cycle(&source, &oracle, Duration::ZERO).await, 2);
    assert_eq!(backend.calls(), 1);
    assert_eq!(oracle.cache_len(), 1);

    let links = tracker.snapshot();
    assert_eq!(links[0].last_fen, links[1].last_fen);
    assert_eq!(links[1].evaluation, Some(0.3));
}

#[tokio::test]
async fn test_growing_stream_triggers_blunder() {
    let mut source = BufferSource::new();
    source.append(
        "[White \"Nakamura, Hikaru\"]\n[Black \"So, Wesley\"]\n\n\
         1. e4 { [%clk 1:30:58] } 1... e5 { [%clk 1:30:55] } *\n\n\n",
    );

    let backend = QueueBackend::new(&[0.2, 3.1]);
    let oracle = EvalOracle::new(backend.clone(), 100);
    let tracker = LinkTracker::new(quiet_settings());
    tracker.add_link("Nakamura, Hikaru", "So, Wesley").unwrap();
    let mut events = tracker.subscribe();

    tracker.run_cycle(&source, &oracle, Duration::ZERO).await;
    assert!(events.try_recv().is_err());

    // the round stream re-sends the game with one more move
    source.append(
        "[White \"Nakamura, Hikaru\"]\n[Black \"So, Wesley\"]\n\n\
         1. e4 { [%clk 1:30:58] } 1... e5 { [%clk 1:30:55] } 2. Ke2 { [%clk 1:30:01] } *\n\n\n",
    );
    assert_eq!(tracker.run_cycle(&source, &oracle, Duration::ZERO).await, 1);

    let event = events.try_recv().unwrap();
    assert_eq!(event.index, 0);
    assert_eq!(event.kind, BlunderKind::Swing { from: 0.2, to: 3.1 });

    let link = &tracker.snapshot()[0];
    assert_eq!(link.side_to_move, Some(Side::Black));
    assert_eq!(link.move_number, 2);
}

#[tokio::test]
async fn test_garbled_move_keeps_partial_position() {
    let mut source = BufferSource::new();
    source.append("[White \"A\"]\n[Black \"B\"]\n\n1. d4 d5 2. c4 Qxh7 3. Nc3 *");
    let partial = "rnbqkbnr/ppp1pppp/8/3p4/2PP4/8/PP2PPPP/RNBQKBNR b KQkq - 0 2";
    let live = source.lookup("A", "B").unwrap().unwrap();
    assert_eq!(live.ply, 3);
    assert_eq!(live.fen, partial);
    let stopped = live.stopped_at.unwrap();
    assert_eq!(stopped.index, 4);
    assert_eq!(stopped.token, "Qxh7");

    let oracle = EvalOracle::new(QueueBackend::new(&[0.1]), 100);
    let tracker = LinkTracker::new(quiet_settings());
    tracker.add_link("A", "B").unwrap();
    assert_eq!(tracker.run_cycle(&source, &oracle, Duration::ZERO).await, 1);

    let link = &tracker.snapshot()[0];
    assert_eq!(link.last_fen.as_deref(), Some(partial));
    assert_eq!(link.evaluation, Some(0.1));
    assert!(link.error.as_deref().unwrap().contains("Qxh7"));
}
