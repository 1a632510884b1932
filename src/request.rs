//! The request entity and its per-stage bookkeeping.

use serde::{Deserialize, Serialize};

use crate::types::{RequestId, RequestKind, SectionKind, Tick};

/// Lifecycle state of a request. `Completed` and `Dropped` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    InFlight,
    Completed,
    Dropped,
}

impl RequestStatus {
    /// Returns true for `Completed` and `Dropped`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::InFlight)
    }
}

/// One simulated transaction travelling along its kind's path.
///
/// The three timestamp vectors get one entry per stage attempted, so for any
/// recorded index `i`: `enter_queue_time[i] <= start_process_time[i] <=
/// end_process_time[i]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub kind: RequestKind,
    pub creation_tick: Tick,
    pub path: Vec<SectionKind>,
    /// Remaining service ticks per stage; sampled once at creation.
    pub needed_time: Vec<Tick>,
    /// Service ticks originally drawn per stage.
    pub sampled_time: Vec<Tick>,
    /// Index of the current stage in `path`.
    pub step: usize,
    pub enter_queue_time: Vec<Tick>,
    pub start_process_time: Vec<Tick>,
    pub end_process_time: Vec<Tick>,
    pub timeout: Tick,
    pub status: RequestStatus,
}

impl Request {
    /// Creates an in-flight request with its service durations already drawn.
    pub fn new(
        id: RequestId,
        kind: RequestKind,
        creation_tick: Tick,
        path: Vec<SectionKind>,
        needed_time: Vec<Tick>,
        timeout: Tick,
    ) -> Self {
        debug_assert_eq!(path.len(), needed_time.len());
        let stages = path.len();
        Self {
            id,
            kind,
            creation_tick,
            path,
            sampled_time: needed_time.clone(),
            needed_time,
            step: 0,
            enter_queue_time: Vec::with_capacity(stages),
            start_process_time: Vec::with_capacity(stages),
            end_process_time: Vec::with_capacity(stages),
            timeout,
            status: RequestStatus::InFlight,
        }
    }

    /// Section of the current stage, or `None` once the path is exhausted.
    pub fn current_section(&self) -> Option<SectionKind> {
        self.path.get(self.step).copied()
    }

    /// Whether every stage on the path has finished.
    pub fn path_complete(&self) -> bool {
        self.step == self.path.len()
    }

    /// Whether the request has outlived its budget at `tick`.
    pub fn expired(&self, tick: Tick) -> bool {
        tick.saturating_sub(self.creation_tick) > self.timeout
    }

    pub(crate) fn record_enter_queue(&mut self, tick: Tick) {
        self.enter_queue_time.push(tick);
    }

    pub(crate) fn record_start(&mut self, tick: Tick) {
        self.start_process_time.push(tick);
    }

    /// Spends one tick of service on the current stage.
    ///
    /// Returns true when the stage finished on this tick; the step cursor has
    /// then already moved on.
    pub(crate) fn work(&mut self, tick: Tick) -> bool {
        let remaining = &mut self.needed_time[self.step];
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return false;
        }
        self.end_process_time.push(tick);
        self.step += 1;
        true
    }

    pub(crate) fn mark_dropped(&mut self, tick: Tick) {
        self.end_process_time.push(tick);
        self.status = RequestStatus::Dropped;
    }

    pub(crate) fn mark_completed(&mut self) {
        self.status = RequestStatus::Completed;
    }

    /// Total ticks spent waiting in queues across all started stages.
    pub fn queueing_delay(&self) -> Tick {
        self.enter_queue_time
            .iter()
            .zip(self.start_process_time.iter())
            .map(|(&enter, &start)| start - enter)
            .sum()
    }

    /// Ticks from creation to the last recorded stage end, if any.
    pub fn latency(&self) -> Option<Tick> {
        self.end_process_time
            .last()
            .map(|&end| end - self.creation_tick)
    }
}
