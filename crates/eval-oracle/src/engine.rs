//! UCI engine process wrapper (async I/O)

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::OracleError;
use crate::fen::black_to_move;
use crate::{Evaluation, Progress, ProgressFn, MATE_SCORE};

/// How long an engine gets to answer `stop` with `bestmove`.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Command line of one engine variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
    pub init_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 16,
            init_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_depth: u32,
    /// Wall-clock budget; when it runs out the best score so far is returned.
    pub timeout: Duration,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_depth: 18,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A running engine that has completed the UCI handshake.
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    name: String,
}

impl UciEngine {
    /// Spawn the engine and run `uci` / `isready`, configuring threads and hash.
    pub async fn start(spec: &EngineSpec, options: &EngineOptions) -> Result<Self, OracleError> {
        let mut process = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Engine(format!("Failed to spawn {}: {e}", spec.program)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| OracleError::Engine("engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| OracleError::Engine("engine stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            name: spec.program.clone(),
        };

        timeout(options.init_timeout, engine.handshake(options))
            .await
            .map_err(|_| OracleError::Engine(format!("{} did not become ready", spec.program)))??;

        info!(engine = %engine.name, "engine ready");
        Ok(engine)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn handshake(&mut self, options: &EngineOptions) -> Result<(), OracleError> {
        self.send("uci").await?;
        loop {
            let line = self.read_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.trim().to_string();
            } else if line == "uciok" {
                break;
            }
        }

        self.send(&format!("setoption name Threads value {}", options.threads))
            .await?;
        self.send(&format!("setoption name Hash value {}", options.hash_mb))
            .await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    async fn send(&mut self, cmd: &str) -> Result<(), OracleError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|_| OracleError::EngineCrashed)?;
        self.stdin
            .flush()
            .await
            .map_err(|_| OracleError::EngineCrashed)?;
        Ok(())
    }

    /// Next trimmed output line; end of output means the process died.
    async fn read_line(&mut self) -> Result<String, OracleError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| OracleError::Engine(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Err(OracleError::EngineCrashed);
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "engine >");
        Ok(trimmed)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), OracleError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Search `fen` to `limits.max_depth`. When the time limit passes or
    /// `cancel` fires the engine is told to `stop` and the deepest score seen so
    /// far is returned (`None` if no score arrived at all).
    pub async fn search(
        &mut self,
        fen: &str,
        limits: SearchLimits,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<Option<Evaluation>, OracleError> {
        let black = black_to_move(fen);
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {}", limits.max_depth)).await?;

        let deadline = Instant::now() + limits.timeout;
        let mut stop_deadline: Option<Instant> = None;
        let mut best: Option<Evaluation> = None;

        loop {
            let stopping = stop_deadline.is_some();
            let grace = stop_deadline.unwrap_or(deadline);
            let next = tokio::select! {
                line = self.read_line() => Some(line?),
                _ = sleep_until(deadline), if !stopping => None,
                _ = cancel.cancelled(), if !stopping => None,
                _ = sleep_until(grace), if stopping => {
                    return Err(OracleError::Engine("engine ignored stop".into()));
                }
            };

            let Some(line) = next else {
                self.send("stop").await?;
                stop_deadline = Some(Instant::now() + STOP_GRACE);
                continue;
            };

            if line.starts_with("info ") {
                let Some(depth) = parse_depth(&line) else {
                    continue;
                };
                let Some((evaluation, mate_in)) =
                    white_pov_score(parse_cp(&line), parse_mate(&line), black)
                else {
                    continue;
                };
                if let Some(cb) = progress {
                    cb(Progress { evaluation, depth });
                }
                best = Some(Evaluation {
                    evaluation,
                    depth,
                    mate_in,
                    best_move: best.and_then(|b| b.best_move),
                });
            } else if let Some(rest) = line.strip_prefix("bestmove") {
                if let Some(b) = best.as_mut() {
                    b.best_move = rest
                        .split_whitespace()
                        .next()
                        .filter(|m| *m != "(none)")
                        .map(String::from);
                }
                return Ok(best);
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = timeout(Duration::from_millis(500), self.process.wait()).await;
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Convert a side-to-move score to pawns from White's point of view.
///
/// Any mate becomes `±MATE_SCORE`; `mate 0` means the side to move is mated.
pub fn white_pov_score(
    cp: Option<i32>,
    mate: Option<i32>,
    black_to_move: bool,
) -> Option<(f64, Option<i32>)> {
    let sign = if black_to_move { -1 } else { 1 };
    if let Some(mate) = mate {
        let white_mate = mate * sign;
        let white_wins = if mate == 0 {
            black_to_move
        } else {
            white_mate > 0
        };
        let score = if white_wins { MATE_SCORE } else { -MATE_SCORE };
        return Some((score, Some(white_mate)));
    }
    cp.map(|cp| (f64::from(cp * sign) / 100.0, None))
}

fn parse_field(line: &str, key: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

fn parse_depth(line: &str) -> Option<u32> {
    parse_field(line, "depth").and_then(|d| u32::try_from(d).ok())
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_field(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_field(line, "mate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_depth(line), Some(20));
        assert_eq!(parse_mate(line), None);
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(-3));
    }

    #[test]
    fn test_info_string_has_no_depth() {
        assert_eq!(parse_depth("info string NNUE evaluation enabled"), None);
    }

    #[test]
    fn test_white_pov_centipawns() {
        assert_eq!(white_pov_score(Some(35), None, false), Some((0.35, None)));
        assert_eq!(white_pov_score(Some(35), None, true), Some((-0.35, None)));
        assert_eq!(white_pov_score(None, None, true), None);
    }

    #[test]
    fn test_white_pov_mate() {
        assert_eq!(
            white_pov_score(None, Some(2), false),
            Some((MATE_SCORE, Some(2)))
        );
        assert_eq!(
            white_pov_score(None, Some(2), true),
            Some((-MATE_SCORE, Some(-2)))
        );
        assert_eq!(
            white_pov_score(None, Some(-4), true),
            Some((MATE_SCORE, Some(4)))
        );
        // side to move is already mated
        assert_eq!(
            white_pov_score(None, Some(0), true),
            Some((MATE_SCORE, Some(0)))
        );
        assert_eq!(
            white_pov_score(None, Some(0), false),
            Some((-MATE_SCORE, Some(0)))
        );
    }
}
