// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Periodic build scheduler
//!
//! The scheduler owns a fixed set of schedule entries and, whenever an
//! entry's recurrence fires, enqueues one build per builder named by the
//! entry. It runs no test logic itself. A previous build of the same builder
//! may still be running when the next tick fires; serializing them is up to
//! the build queue.

mod recurrence;

pub use recurrence::Recurrence;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::MobciResult;

/// A named recurrence and the builders it triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub name: String,
    pub recurrence: Recurrence,
    pub builders: Vec<String>,
}

/// Dispatch phase of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Dispatching,
    Stopped,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Dispatching => write!(f, "DISPATCHING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Request for one build of one builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub builder: String,
    /// Why the build was requested, e.g. the schedule name
    pub reason: String,
    /// Initial properties of the build's fresh context
    pub properties: BTreeMap<String, String>,
}

impl BuildRequest {
    pub fn new(builder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            builder: builder.into(),
            reason: reason.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Accepts build requests
#[async_trait]
pub trait BuildQueue: Send + Sync {
    async fn enqueue(&self, request: BuildRequest) -> MobciResult<()>;
}

/// Source of the current local wall-clock time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Process-wide scheduler state
///
/// Created once at startup and shared by the timer tasks. Ticks are
/// dispatched one at a time, so the phase always describes the whole
/// scheduler.
pub struct SchedulerState {
    entries: Vec<ScheduleEntry>,
    phase: watch::Sender<SchedulerPhase>,
    dispatch: Mutex<()>,
    cancel: CancellationToken,
    clock: Clock,
}

impl SchedulerState {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        let (phase, _) = watch::channel(SchedulerPhase::Idle);
        Self {
            entries,
            phase,
            dispatch: Mutex::new(()),
            cancel: CancellationToken::new(),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Read trigger times from `clock` instead of the system clock
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.subscribe()
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub enqueued: Vec<String>,
    pub failed: Vec<String>,
}

/// Fan-out scheduler over a build queue
pub struct Scheduler<Q> {
    state: Arc<SchedulerState>,
    queue: Arc<Q>,
}

impl<Q> Clone for Scheduler<Q> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<Q: BuildQueue + 'static> Scheduler<Q> {
    pub fn new(state: Arc<SchedulerState>, queue: Arc<Q>) -> Self {
        Self { state, queue }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Enqueue one build per builder of `entry`
    ///
    /// A failed enqueue is logged and does not stop the remaining builders.
    pub async fn tick(&self, entry: &ScheduleEntry) -> DispatchReport {
        let _guard = self.state.dispatch.lock().await;
        if self.state.phase() == SchedulerPhase::Stopped {
            return DispatchReport::default();
        }

        self.state.phase.send_replace(SchedulerPhase::Dispatching);
        info!(schedule = %entry.name, builders = entry.builders.len(), "dispatching builds");

        let mut report = DispatchReport::default();
        for builder in &entry.builders {
            let request = BuildRequest::new(builder, format!("schedule '{}'", entry.name));
            match self.queue.enqueue(request).await {
                Ok(()) => {
                    debug!(schedule = %entry.name, %builder, "build enqueued");
                    report.enqueued.push(builder.clone());
                }
                Err(e) => {
                    error!(schedule = %entry.name, %builder, error = %e, "could not enqueue build");
                    report.failed.push(builder.clone());
                }
            }
        }

        self.state.phase.send_replace(SchedulerPhase::Idle);
        report
    }

    /// Dispatch every entry once
    pub async fn dispatch_all(&self) -> DispatchReport {
        let mut report = DispatchReport::default();
        for entry in &self.state.entries {
            let tick = self.tick(entry).await;
            report.enqueued.extend(tick.enqueued);
            report.failed.extend(tick.failed);
        }
        report
    }

    /// Start one timer task per entry
    pub fn start(&self) -> SchedulerHandle {
        let tasks = (0..self.state.entries.len())
            .map(|index| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.run_entry(index).await })
            })
            .collect();

        info!(entries = self.state.entries.len(), "scheduler started");
        SchedulerHandle {
            state: Arc::clone(&self.state),
            tasks,
        }
    }

    async fn run_entry(&self, index: usize) {
        let entry = &self.state.entries[index];
        loop {
            let now = (self.state.clock)();
            let next = entry.recurrence.next_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(schedule = %entry.name, %next, "waiting for next trigger");

            tokio::select! {
                _ = self.state.cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    self.tick(entry).await;
                }
            }
        }
    }
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    state: Arc<SchedulerState>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn phase(&self) -> SchedulerPhase {
        self.state.phase()
    }

    /// Cancel the timers and wait for them to finish
    ///
    /// A dispatch in progress completes before this returns.
    pub async fn stop(self) {
        self.state.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }

        let _guard = self.state.dispatch.lock().await;
        self.state.phase.send_replace(SchedulerPhase::Stopped);
        info!("scheduler stopped");
    }
}
