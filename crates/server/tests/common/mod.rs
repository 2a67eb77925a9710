#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use eval_oracle::{EvalBackend, Evaluation, OracleError, ProgressFn};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// Scores a position by its side to move and counts the calls.
#[derive(Default)]
pub struct ScriptedBackend {
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvalBackend for ScriptedBackend {
    async fn evaluate(
        &self,
        fen: &str,
        _progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let black = fen.split_whitespace().nth(1) == Some("b");
        Ok(Some(Evaluation {
            evaluation: if black { -0.5 } else { 0.5 },
            depth: 18,
            mate_in: None,
            best_move: None,
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn pgn(white: &str, black: &str, movetext: &str) -> String {
    format!("[Event \"Test Open\"]\n[White \"{white}\"]\n[Black \"{black}\"]\n[Result \"*\"]\n\n{movetext}\n\n\n")
}

