//! Local engine backend: one long-lived UCI process fed by a FIFO job queue.
//!
//! The engine can only run one search at a time, so every request goes
//! through a single worker task. A crashed engine is restarted (trying the
//! fallback variants in order) and only the request that was in flight fails.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::EvalBackend;
use crate::engine::{EngineOptions, EngineSpec, SearchLimits, UciEngine};
use crate::error::OracleError;
use crate::{Evaluation, ProgressFn};

#[derive(Debug, Clone)]
pub struct LocalEngineSettings {
    /// Primary engine first, then fallbacks.
    pub engines: Vec<EngineSpec>,
    pub options: EngineOptions,
    pub limits: SearchLimits,
    /// Pause between consecutive searches.
    pub cooldown: Duration,
}

type Reply = oneshot::Sender<Result<Option<Evaluation>, OracleError>>;

struct Job {
    fen: String,
    progress: Option<ProgressFn>,
    reply: Reply,
}

pub struct LocalEngineBackend {
    jobs: mpsc::UnboundedSender<Job>,
    current: Arc<Mutex<CancellationToken>>,
    shutdown: CancellationToken,
}

impl LocalEngineBackend {
    /// Start the worker task. The engine itself is launched on the first job.
    pub fn spawn(settings: LocalEngineSettings) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(CancellationToken::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(run_worker(
            rx,
            settings,
            current.clone(),
            shutdown.clone(),
        ));

        Self {
            jobs,
            current,
            shutdown,
        }
    }
}

#[async_trait]
impl EvalBackend for LocalEngineBackend {
    async fn evaluate(
        &self,
        fen: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Option<Evaluation>, OracleError> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job {
                fen: fen.to_string(),
                progress,
                reply,
            })
            .map_err(|_| OracleError::QueueClosed)?;
        rx.await.map_err(|_| OracleError::QueueClosed)?
    }

    async fn stop(&self) {
        lock(&self.current).cancel();
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

fn lock(token: &Mutex<CancellationToken>) -> MutexGuard<'_, CancellationToken> {
    match token.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    settings: LocalEngineSettings,
    current: Arc<Mutex<CancellationToken>>,
    shutdown: CancellationToken,
) {
    let mut engine: Option<UciEngine> = None;

    loop {
        let job = tokio::select! {
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        // caller gave up while queued
        if job.reply.is_closed() {
            debug!(fen = %job.fen, "skipping abandoned evaluation");
            continue;
        }

        let cancel = shutdown.child_token();
        *lock(&current) = cancel.clone();

        let result = run_job(&mut engine, &settings, &job, &cancel).await;
        let _ = job.reply.send(result);

        tokio::select! {
            _ = tokio::time::sleep(settings.cooldown) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    if let Some(mut engine) = engine {
        engine.quit().await;
    }
    info!("engine worker stopped");
}

async fn run_job(
    engine: &mut Option<UciEngine>,
    settings: &LocalEngineSettings,
    job: &Job,
    cancel: &CancellationToken,
) -> Result<Option<Evaluation>, OracleError> {
    let mut active = match engine.take() {
        Some(active) => active,
        None => start_any(settings).await?,
    };

    match active
        .search(&job.fen, settings.limits, job.progress.as_ref(), cancel)
        .await
    {
        Ok(result) => {
            *engine = Some(active);
            Ok(result)
        }
        Err(e) => {
            warn!(fen = %job.fen, error = %e, "engine search failed, restarting engine");
            drop(active);
            match start_any(settings).await {
                Ok(fresh) => *engine = Some(fresh),
                Err(restart) => warn!(error = %restart, "engine restart failed"),
            }
            Err(e)
        }
    }
}

async fn start_any(settings: &LocalEngineSettings) -> Result<UciEngine, OracleError> {
    for spec in &settings.engines {
        match UciEngine::start(spec, &settings.options).await {
            Ok(engine) => return Ok(engine),
            Err(e) => warn!(program = %spec.program, error = %e, "engine failed to start"),
        }
    }
    let tried: Vec<&str> = settings.engines.iter().map(|s| s.program.as_str()).collect();
    Err(OracleError::EngineUnavailable(tried.join(", ")))
}
