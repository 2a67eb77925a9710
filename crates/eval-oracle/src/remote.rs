//! HTTP scoring service backend: one request per FEN.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::backend::EvalBackend;
use crate::error::OracleError;
use crate::{Evaluation, ProgressFn, MATE_SCORE};

/// How the FEN is handed to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMode {
    /// `POST {endpoint}` with body `{"fen": ...}`.
    JsonBody,
    /// `GET {endpoint}?fen=...`.
    QueryParam,
}

#[derive(Deserialize)]
struct RemoteResponse {
    #[serde(default)]
    evaluation: Value,
    #[serde(default, alias = "bestMove", alias = "bestmove")]
    best_move: Option<String>,
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    mate: Option<i32>,
}

pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    mode: RemoteMode,
}

impl RemoteBackend {
    pub fn new(endpoint: &str, mode: RemoteMode, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .user_agent("EvalBars/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            mode,
        })
    }
}

#[async_trait]
impl EvalBackend for RemoteBackend {
    async fn evaluate(
        &self,
        fen: &str,
        _progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError> {
        let request = match self.mode {
            RemoteMode::JsonBody => self.client.post(&self.endpoint).json(&json!({ "fen": fen })),
            RemoteMode::QueryParam => self.client.get(&self.endpoint).query(&[("fen", fen)]),
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(OracleError::Status(resp.status().as_u16()));
        }

        let body: RemoteResponse = serde_json::from_slice(&resp.bytes().await?)?;
        debug!(fen, evaluation = %body.evaluation, "remote evaluation");
        Ok(normalize(body))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

fn normalize(body: RemoteResponse) -> Option<Evaluation> {
    let score = match &body.evaluation {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    match (body.mate, score) {
        (Some(mate), _) if mate != 0 => Some(Evaluation {
            evaluation: if mate > 0 { MATE_SCORE } else { -MATE_SCORE },
            depth: body.depth.unwrap_or(0),
            mate_in: Some(mate),
            best_move: body.best_move,
        }),
        (_, Some(evaluation)) => Some(Evaluation {
            evaluation,
            depth: body.depth.unwrap_or(0),
            mate_in: None,
            best_move: body.best_move,
        }),
        _ => None,
    }
}
