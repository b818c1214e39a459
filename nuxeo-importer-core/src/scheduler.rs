//! Bounded import scheduler: drives walks and pipelines until the tree is done.
//!
//! One coordinator loop owns the task queue and the [`RunStats`]. Walks and
//! pipelines run as spawned tasks and talk back over two channels:
//!   - walks send [`Discovery`] messages (new tasks, rejected names, end of walk)
//!   - pipelines send a [`TaskOutcome`] when they are done
//!
//! # Concurrency
//! At most `max_concurrent_requests` pipelines run at once: each one holds a
//! semaphore permit that the coordinator acquires before spawning it. Queued
//! tasks beyond the cap wait in the coordinator's queue.
//!
//! # Ordering
//! A folder's children are listed only after the folder's own pipeline
//! succeeded, against the remote path that pipeline returned. A failed folder
//! never gets its children listed.
//!
//! # Completion
//! The run is over when nothing is queued, no pipeline is in flight and no
//! walk is in flight. Only then is the [`RunReport`] built, so every child
//! discovered by a late walk is accounted for.
//!
//! # Shutdown
//! [`import_until`] takes a shutdown future. Once it resolves, queued and newly
//! discovered tasks are counted as not started, in-flight pipelines finish,
//! and the report is produced as usual. The abort-run folder policy takes the
//! same path.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigError, FolderFailurePolicy, ImportConfig};
use crate::contract::Repository;
use crate::pipeline::{self, PipelineError, TaskOutcome};
use crate::report::{FailureRecord, RunReport, RunStats};
use crate::walker::{self, Discovery, EntryKind, Task};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("local path {path:?} is not accessible: {source}")]
    LocalPath {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Imports `config.local_path` under `config.remote_path` and returns the report.
pub async fn import<R>(config: &ImportConfig, repository: Arc<R>) -> Result<RunReport, ImportError>
where
    R: Repository + 'static,
{
    import_until(config, repository, std::future::pending()).await
}

/// Like [`import`], but stops starting new tasks once `shutdown` resolves.
pub async fn import_until<R, F>(
    config: &ImportConfig,
    repository: Arc<R>,
    shutdown: F,
) -> Result<RunReport, ImportError>
where
    R: Repository + 'static,
    F: Future<Output = ()>,
{
    config.validate()?;
    tokio::fs::metadata(&config.local_path)
        .await
        .map_err(|source| ImportError::LocalPath {
            path: config.local_path.clone(),
            source,
        })?;

    let run_id = Uuid::new_v4();
    let span = info_span!("import", run_id = %run_id);
    let (scheduler, inbox) = Scheduler::new(config, repository, run_id);
    let report = scheduler
        .run(
            inbox,
            config.local_path.clone(),
            config.remote_path.clone(),
            shutdown,
        )
        .instrument(span)
        .await;
    Ok(report)
}

struct Scheduler<R> {
    repository: Arc<R>,
    permits: Arc<Semaphore>,
    ace_principal: Arc<str>,
    on_folder_failure: FolderFailurePolicy,
    run_id: Uuid,

    queue: VecDeque<Task>,
    in_flight: usize,
    walks_in_flight: usize,
    accepting: bool,
    aborted: bool,
    cancelled: bool,
    stats: RunStats,

    discovery_tx: UnboundedSender<Discovery>,
    outcome_tx: UnboundedSender<TaskOutcome>,
}

/// Receiving ends of the scheduler's channels, consumed by the coordinator loop.
struct Inbox {
    discoveries: UnboundedReceiver<Discovery>,
    outcomes: UnboundedReceiver<TaskOutcome>,
}

impl<R> Scheduler<R>
where
    R: Repository + 'static,
{
    fn new(config: &ImportConfig, repository: Arc<R>, run_id: Uuid) -> (Self, Inbox) {
        let (discovery_tx, discovery_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            repository,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            ace_principal: Arc::from(config.ace_principal.as_str()),
            on_folder_failure: config.on_folder_failure,
            run_id,
            queue: VecDeque::new(),
            in_flight: 0,
            walks_in_flight: 0,
            accepting: true,
            aborted: false,
            cancelled: false,
            stats: RunStats::default(),
            discovery_tx,
            outcome_tx,
        };
        let inbox = Inbox {
            discoveries: discovery_rx,
            outcomes: outcome_rx,
        };
        (scheduler, inbox)
    }

    async fn run<F>(mut self, mut inbox: Inbox, root: PathBuf, remote_path: String, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        info!(
            root = %root.display(),
            remote = %remote_path,
            max_concurrent = self.permits.available_permits(),
            "[IMPORT] Starting import"
        );

        self.spawn_walk(root, remote_path);

        tokio::pin!(shutdown);
        let mut shutdown_seen = false;

        loop {
            self.dispatch();
            if self.is_drained() {
                break;
            }

            // The scheduler keeps a sender of each channel, so neither recv()
            // yields None while the loop runs.
            tokio::select! {
                Some(discovery) = inbox.discoveries.recv() => self.on_discovery(discovery),
                Some(outcome) = inbox.outcomes.recv() => self.on_outcome(outcome),
                _ = &mut shutdown, if !shutdown_seen => {
                    shutdown_seen = true;
                    warn!(in_flight = self.in_flight, queued = self.queue.len(), "[IMPORT] Shutdown requested, letting in-flight tasks finish");
                    self.cancelled = true;
                    self.stop_accepting();
                }
                else => break,
            }
        }

        let report = RunReport {
            run_id: self.run_id,
            stats: self.stats,
            elapsed: started.elapsed(),
            aborted: self.aborted,
            cancelled: self.cancelled,
        };
        info!(
            created = report.stats.documents_created(),
            discovered = report.stats.documents_count(),
            failed = report.stats.failure_count(),
            not_started = report.stats.not_started,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "[IMPORT] Import finished"
        );
        report
    }

    fn is_drained(&self) -> bool {
        self.in_flight == 0 && self.walks_in_flight == 0 && self.queue.is_empty()
    }

    /// Starts queued tasks while permits are available.
    fn dispatch(&mut self) {
        while self.accepting && !self.queue.is_empty() {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            let Some(task) = self.queue.pop_front() else {
                break;
            };

            self.in_flight += 1;
            debug!(path = %task.local_path.display(), in_flight = self.in_flight, queued = self.queue.len(), "[IMPORT] Dispatching task");

            let repository = Arc::clone(&self.repository);
            let principal = Arc::clone(&self.ace_principal);
            let tx = self.outcome_tx.clone();
            tokio::spawn(
                async move {
                    let fallback = task.clone();
                    let outcome = match AssertUnwindSafe(pipeline::execute(repository.as_ref(), task, &principal))
                        .catch_unwind()
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!(path = %fallback.local_path.display(), %message, "[IMPORT] Pipeline panicked");
                            let kind = match tokio::fs::metadata(&fallback.local_path).await {
                                Ok(metadata) => EntryKind::of(&metadata),
                                Err(_) => EntryKind::File,
                            };
                            TaskOutcome {
                                task: fallback,
                                kind,
                                result: Err(PipelineError::Panicked(message)),
                            }
                        }
                    };
                    // Release the slot before reporting, so the coordinator sees it free.
                    drop(permit);
                    let _ = tx.send(outcome);
                }
                .in_current_span(),
            );
        }
    }

    fn spawn_walk(&mut self, local_path: PathBuf, remote_parent_path: String) {
        self.walks_in_flight += 1;
        let tx = self.discovery_tx.clone();
        tokio::spawn(walker::walk(local_path, remote_parent_path, tx).in_current_span());
    }

    fn stop_accepting(&mut self) {
        self.accepting = false;
        self.stats.not_started += self.queue.len();
        self.queue.clear();
    }

    fn on_discovery(&mut self, discovery: Discovery) {
        match discovery {
            Discovery::Task(task) => {
                if self.accepting {
                    self.queue.push_back(task);
                } else {
                    self.stats.not_started += 1;
                }
            }
            Discovery::Rejected(rejection) => {
                self.stats.record_started(rejection.kind);
                let error = PipelineError::Parse(rejection.error);
                self.stats
                    .record_failure(rejection.kind, FailureRecord::from_pipeline(rejection.path, &error));
            }
            Discovery::Finished { path, error } => {
                self.walks_in_flight -= 1;
                if let Some(error) = error {
                    // Counted apart from pipeline failures: the folder may already be created.
                    self.stats
                        .record_listing_failure(FailureRecord::listing(path, &error));
                }
            }
        }
    }

    fn on_outcome(&mut self, outcome: TaskOutcome) {
        self.in_flight -= 1;
        let TaskOutcome { task, kind, result } = outcome;
        self.stats.record_started(kind);

        match result {
            Ok(document) => {
                self.stats.record_created(kind);
                if !kind.is_folder() {
                    return;
                }
                if self.accepting {
                    debug!(path = %task.local_path.display(), remote = %document.path, "[IMPORT] Folder created, listing children");
                    self.spawn_walk(task.local_path, document.path);
                } else {
                    debug!(path = %task.local_path.display(), "[IMPORT] Folder created after stop, children not listed");
                }
            }
            Err(error) => {
                error!(
                    path = %task.local_path.display(),
                    kind = ?kind,
                    stage = error.stage(),
                    error = %error,
                    "[IMPORT] Task failed"
                );
                self.stats
                    .record_failure(kind, FailureRecord::from_pipeline(task.local_path, &error));

                if kind.is_folder() && self.on_folder_failure == FolderFailurePolicy::AbortRun && self.accepting {
                    warn!("[IMPORT] Folder failed under abort-run policy, no new tasks will start");
                    self.aborted = true;
                    self.stop_accepting();
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
