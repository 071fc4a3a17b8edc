//! Process-wide table of active runs
//!
//! Pure bookkeeping: maps a run id to its event log, the working directory of
//! its repository and its cancellation token. Entries live until a caller
//! destroys them.

use crate::error::PipelineError;
use crate::pipeline::event_log::EventLog;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Everything the registry tracks for one run
#[derive(Debug)]
pub struct PipelineEntry {
    log: EventLog,
    workdir: PathBuf,
    cancel: CancellationToken,
}

impl PipelineEntry {
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Token the run driver observes; cancelled when the entry is destroyed
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Run id to [`PipelineEntry`] table; clones share the same table
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    entries: Arc<RwLock<HashMap<String, Arc<PipelineEntry>>>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh, running event log for `run_id`
    pub async fn create(
        &self,
        run_id: &str,
        workdir: impl Into<PathBuf>,
    ) -> Result<Arc<PipelineEntry>, PipelineError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(run_id) {
            return Err(PipelineError::DuplicateRunId(run_id.to_string()));
        }

        let entry = Arc::new(PipelineEntry {
            log: EventLog::new(),
            workdir: workdir.into(),
            cancel: CancellationToken::new(),
        });
        entries.insert(run_id.to_string(), Arc::clone(&entry));

        tracing::info!("Registered run '{}'", run_id);
        Ok(entry)
    }

    pub async fn get(&self, run_id: &str) -> Option<Arc<PipelineEntry>> {
        self.entries.read().await.get(run_id).cloned()
    }

    /// Like [`PipelineRegistry::get`], but an unknown id is an error
    pub async fn require(&self, run_id: &str) -> Result<Arc<PipelineEntry>, PipelineError> {
        self.get(run_id)
            .await
            .ok_or_else(|| PipelineError::RunNotFound(run_id.to_string()))
    }

    /// Remove a run and cancel its driver if still running
    ///
    /// Returns whether an entry was removed; an unknown id is a no-op.
    /// Subscribers already holding the log keep reading what was appended.
    pub async fn destroy(&self, run_id: &str) -> bool {
        let removed = self.entries.write().await.remove(run_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!("Destroyed run '{}'", run_id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Registered run ids, sorted
    pub async fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
