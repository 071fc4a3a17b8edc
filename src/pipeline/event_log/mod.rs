//! Append-only, sequence-numbered event log for one analysis run
//!
//! One writer appends events; any number of subscribers replay from a cursor
//! and then tail the log. Every append and terminal transition bumps a
//! `watch` version counter, which wakes all waiting subscribers at once.
//! Subscribers clone the `Arc`ed events out under a short read lock and never
//! hold the lock across their own I/O, so a slow reader cannot stall the
//! writer.

use crate::error::PipelineError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Closed set of event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Log,
    MilestoneStart,
    MilestoneResult,
    MilestoneError,
    Progress,
    /// Free-form note from inside an analysis, payload `{message}`
    ProcessingUpdate,
    FinalSummary,
    Error,
    /// Terminal marker; only the log itself appends it
    End,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::MilestoneStart => "milestone_start",
            EventKind::MilestoneResult => "milestone_result",
            EventKind::MilestoneError => "milestone_error",
            EventKind::Progress => "progress",
            EventKind::ProcessingUpdate => "processing_update",
            EventKind::FinalSummary => "final_summary",
            EventKind::Error => "error",
            EventKind::End => "end",
        }
    }
}

/// A typed event with an opaque payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: Value,
}

impl PipelineEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Self::new(EventKind::Log, json!({ "message": message.into() }))
    }

    pub fn progress(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            completed * 100 / total
        };
        Self::new(
            EventKind::Progress,
            json!({ "completed": completed, "total": total, "percent": percent }),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, json!({ "msg": message.into() }))
    }

    fn end_done() -> Self {
        Self::new(EventKind::End, json!({ "status": "done" }))
    }

    fn end_error(message: &str) -> Self {
        Self::new(
            EventKind::End,
            json!({ "status": "error", "error": message }),
        )
    }

    pub fn is_end(&self) -> bool {
        self.kind == EventKind::End
    }
}

/// An event together with its 1-based sequence id
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SequencedEvent {
    pub id: u64,
    #[serde(flatten)]
    pub event: PipelineEvent,
}

/// Run state; transitions only out of `Running`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Running,
    Done,
    Errored(String),
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineStatus::Running)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PipelineStatus::Errored(message) => Some(message),
            _ => None,
        }
    }
}

struct LogState {
    events: Vec<Arc<SequencedEvent>>,
    status: PipelineStatus,
}

impl LogState {
    fn push(&mut self, event: PipelineEvent) -> u64 {
        let id = self.events.len() as u64 + 1;
        self.events.push(Arc::new(SequencedEvent { id, event }));
        id
    }
}

struct Inner {
    state: RwLock<LogState>,
    version: watch::Sender<u64>,
}

/// Shared handle on one run's event log; clones refer to the same log
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("version", &*self.inner.version.borrow())
            .finish_non_exhaustive()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(LogState {
                    events: Vec::new(),
                    status: PipelineStatus::Running,
                }),
                version,
            }),
        }
    }

    fn notify(&self) {
        self.inner.version.send_modify(|v| *v += 1);
    }

    /// Append an event and wake all subscribers; returns its sequence id
    ///
    /// Fails with `Closed` once the log is terminal. `end` events are
    /// reserved for [`EventLog::mark_done`] and [`EventLog::mark_error`].
    pub async fn append(&self, event: PipelineEvent) -> Result<u64, PipelineError> {
        if event.is_end() {
            return Err(PipelineError::ReservedEventKind(
                EventKind::End.as_str().to_string(),
            ));
        }

        let id = {
            let mut state = self.inner.state.write().await;
            if state.status.is_terminal() {
                return Err(PipelineError::Closed);
            }
            state.push(event)
        };

        self.notify();
        Ok(id)
    }

    /// Finish successfully, appending the terminal `end` event
    ///
    /// Returns `false` without changing anything if already terminal.
    pub async fn mark_done(&self) -> bool {
        self.finish(PipelineStatus::Done, PipelineEvent::end_done())
            .await
    }

    /// Finish with an error, appending the terminal `end` event
    ///
    /// Returns `false` without changing anything if already terminal.
    pub async fn mark_error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        let end = PipelineEvent::end_error(&message);
        self.finish(PipelineStatus::Errored(message), end).await
    }

    async fn finish(&self, status: PipelineStatus, end: PipelineEvent) -> bool {
        {
            let mut state = self.inner.state.write().await;
            if state.status.is_terminal() {
                return false;
            }
            state.push(end);
            state.status = status;
        }

        self.notify();
        true
    }

    /// Map a resumption token to the index of the first unread event
    ///
    /// An absent or unparsable token starts from the beginning. A token past
    /// the end clamps to the current length, so the reader simply waits.
    pub async fn cursor_to_index(&self, last_seen_id: Option<&str>) -> usize {
        let Some(id) = last_seen_id.and_then(|t| t.trim().parse::<u64>().ok()) else {
            return 0;
        };
        let len = self.inner.state.read().await.events.len();
        usize::try_from(id).map_or(len, |id| id.min(len))
    }

    /// Subscribe starting at event index `from`
    ///
    /// `wait` bounds each blocking wait; when it elapses with nothing new,
    /// [`Subscription::recv`] returns [`Recv::Idle`] so the caller can check
    /// its own liveness.
    pub fn subscribe(&self, from: usize, wait: Duration) -> Subscription {
        Subscription {
            log: self.clone(),
            rx: self.inner.version.subscribe(),
            position: from,
            wait,
            finished: false,
        }
    }

    /// Resolve a resumption token and subscribe from there
    pub async fn subscribe_after(&self, last_seen_id: Option<&str>, wait: Duration) -> Subscription {
        let from = self.cursor_to_index(last_seen_id).await;
        self.subscribe(from, wait)
    }

    pub async fn status(&self) -> PipelineStatus {
        self.inner.state.read().await.status.clone()
    }

    pub async fn is_terminal(&self) -> bool {
        self.inner.state.read().await.status.is_terminal()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every event appended so far
    pub async fn snapshot(&self) -> Vec<Arc<SequencedEvent>> {
        self.inner.state.read().await.events.clone()
    }
}

/// Outcome of one [`Subscription::recv`] call
#[derive(Debug, Clone, PartialEq)]
pub enum Recv {
    Event(Arc<SequencedEvent>),
    /// Caught up and nothing arrived within the wait bound
    Idle,
    /// The terminal event has been delivered, or the log was already drained
    Closed,
}

/// A reader's position in an [`EventLog`]
pub struct Subscription {
    log: EventLog,
    rx: watch::Receiver<u64>,
    position: usize,
    wait: Duration,
    finished: bool,
}

impl Subscription {
    /// Index of the next event this subscription will yield
    pub fn position(&self) -> usize {
        self.position
    }

    /// Next event, replaying buffered events without waiting
    pub async fn recv(&mut self) -> Recv {
        loop {
            if self.finished {
                return Recv::Closed;
            }

            // Mark the current version seen before looking, so an append
            // landing after the snapshot still wakes the wait below.
            self.rx.borrow_and_update();

            {
                let state = self.log.inner.state.read().await;
                if let Some(event) = state.events.get(self.position) {
                    let event = Arc::clone(event);
                    self.position += 1;
                    if event.event.is_end() {
                        self.finished = true;
                    }
                    return Recv::Event(event);
                }
                if state.status.is_terminal() {
                    self.finished = true;
                    return Recv::Closed;
                }
            }

            match tokio::time::timeout(self.wait, self.rx.changed()).await {
                Ok(Ok(())) => continue,
                // The sender lives as long as the log this subscription holds
                Ok(Err(_)) => {
                    self.finished = true;
                    return Recv::Closed;
                }
                Err(_) => return Recv::Idle,
            }
        }
    }

    /// Next event, waiting through idle periods; `None` once closed
    pub async fn next(&mut self) -> Option<Arc<SequencedEvent>> {
        loop {
            match self.recv().await {
                Recv::Event(event) => return Some(event),
                Recv::Idle => continue,
                Recv::Closed => return None,
            }
        }
    }

    /// Adapt into a `Stream` that ends after the terminal event
    pub fn into_stream(self) -> impl futures::Stream<Item = Arc<SequencedEvent>> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}
