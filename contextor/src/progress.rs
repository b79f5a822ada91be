//! Progress reporting for the report pipeline.
//!
//! Use `NoopProgress` for servers, `IndicatifProgress` for a TTY and
//! `ChannelProgress` when snapshots are consumed by another task.

use std::fmt;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::warn;

use crate::report::Report;

/// Pipeline states.
///
/// `Idle → Fetching → Analyzing → Complete`; `Error` is reachable from
/// `Fetching` and `Analyzing`. `Analyzing` repeats while snapshots arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Fetching,
    Analyzing,
    Complete,
    Error,
}

impl AnalysisState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Analyzing)
                | (Fetching, Error)
                | (Analyzing, Analyzing)
                | (Analyzing, Complete)
                | (Analyzing, Error)
        )
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching repository",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
            Self::Error => "error",
        })
    }
}

/// Observer of one analysis. Calls arrive in production order.
pub trait Progress: Send + Sync {
    /// State transition.
    fn state(&self, _state: AnalysisState) {}
    /// Fully populated, possibly incomplete report.
    fn snapshot(&self, _report: &Report) {}
    /// Free-form status line.
    fn message(&self, _msg: &str) {}
}

/// No-op reporter for servers/headless runs.
#[derive(Default, Clone, Copy, Debug)]
pub struct NoopProgress;
impl Progress for NoopProgress {}

/// Indicatif spinner for CLI/TTY.
pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    /// Spinner (unknown total).
    pub fn spinner() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {elapsed:>3} {msg}") {
            pb.set_style(style.tick_chars("-\\|/ "));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn state(&self, state: AnalysisState) {
        match state {
            AnalysisState::Complete | AnalysisState::Error => {
                self.pb.finish_with_message(state.to_string())
            }
            _ => self.pb.set_message(state.to_string()),
        }
    }

    fn snapshot(&self, report: &Report) {
        self.pb
            .set_message(format!("analyzing ({} items)", report.item_count()));
    }

    fn message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }
}

/// Current state of one analysis, forwarded to its [`Progress`] on every
/// change. Transitions outside the table are still forwarded but logged.
pub(crate) struct StateTracker<'a> {
    progress: &'a dyn Progress,
    current: AnalysisState,
}

impl<'a> StateTracker<'a> {
    pub(crate) fn new(progress: &'a dyn Progress) -> Self {
        Self::resume(progress, AnalysisState::Idle)
    }

    /// Tracker for a run that picks up at `current`, e.g. a report retry
    /// after the fetch already happened.
    pub(crate) fn resume(progress: &'a dyn Progress, current: AnalysisState) -> Self {
        Self { progress, current }
    }

    pub(crate) fn advance(&mut self, next: AnalysisState) {
        if !self.current.can_advance_to(next) {
            warn!(from = %self.current, to = %next, "unexpected analysis state transition");
        }
        self.current = next;
        self.progress.state(next);
    }

    pub(crate) fn current(&self) -> AnalysisState {
        self.current
    }

    pub(crate) fn progress(&self) -> &'a dyn Progress {
        self.progress
    }
}

/// Event forwarded by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    State(AnalysisState),
    Snapshot(Box<Report>),
    Message(String),
}

/// Forwards states and snapshots over an unbounded tokio channel.
///
/// The channel keeps delivery order equal to production order. Events sent
/// after the receiver is dropped are discarded.
#[derive(Clone, Debug)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Progress for ChannelProgress {
    fn state(&self, state: AnalysisState) {
        let _ = self.tx.send(ProgressEvent::State(state));
    }

    fn snapshot(&self, report: &Report) {
        let _ = self.tx.send(ProgressEvent::Snapshot(Box::new(report.clone())));
    }

    fn message(&self, msg: &str) {
        let _ = self.tx.send(ProgressEvent::Message(msg.to_string()));
    }
}
