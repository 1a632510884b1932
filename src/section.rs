//! Sections: queueing stations with a fixed pool of parallel servers.
//!
//! A [`Section`] owns its waiting line, its subsection pool and the set of
//! requests currently in service. Each global tick it runs a three-phase
//! protocol:
//!
//! 1. **Admission** - sample the queue length, then move queued requests into
//!    idle subsections in FIFO order.
//! 2. **Service** - for every request in service, in admission order, either
//!    drop it (timeout exceeded) or spend one tick of work on it. A request
//!    whose stage finishes either completes its path or is handed back to the
//!    engine for routing to the next section.
//! 3. **Utilization** - count the tick as busy if anything is still in service.
//!
//! The timeout check runs before the work decrement, so a request whose
//! timeout and stage completion fall on the same tick is dropped.

use tracing::trace;

use crate::config::AdmissionRule;
use crate::error::{SimError, SimResult};
use crate::queue::RequestQueue;
use crate::request::Request;
use crate::types::{RequestId, SectionKind, Tick};

/// Fungible server capacity of a section.
///
/// Subsections carry no identity, so the pool is just a busy counter checked
/// against the configured capacity.
#[derive(Clone, Debug)]
pub struct SubsectionPool {
    section: SectionKind,
    capacity: usize,
    busy: usize,
}

impl SubsectionPool {
    pub fn new(section: SectionKind, capacity: usize) -> Self {
        Self {
            section,
            capacity,
            busy: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn busy(&self) -> usize {
        self.busy
    }

    pub fn idle(&self) -> usize {
        self.capacity - self.busy
    }

    pub fn has_idle(&self) -> bool {
        self.busy < self.capacity
    }

    /// Marks one idle subsection busy.
    pub fn acquire(&mut self) -> SimResult<()> {
        if !self.has_idle() {
            return Err(SimError::PoolExhausted {
                section: self.section,
                capacity: self.capacity,
            });
        }
        self.busy += 1;
        Ok(())
    }

    /// Marks one busy subsection idle.
    pub fn release(&mut self) -> SimResult<()> {
        if self.busy == 0 {
            return Err(SimError::SubsectionAlreadyIdle {
                section: self.section,
            });
        }
        self.busy -= 1;
        Ok(())
    }
}

/// What a section's tick produced for the engine to act on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Requests whose stage finished and that must move to their next section.
    pub handoffs: Vec<RequestId>,
    /// Requests that finished their last stage on this tick.
    pub completed: Vec<RequestId>,
    /// Requests dropped for exceeding their timeout on this tick.
    pub dropped: Vec<RequestId>,
}

/// A queueing station for one [`SectionKind`].
#[derive(Clone, Debug)]
pub struct Section {
    kind: SectionKind,
    mean_service_time: f64,
    pool: SubsectionPool,
    queue: RequestQueue,
    admission: AdmissionRule,
    /// Requests occupying a subsection, in admission order.
    in_progress: Vec<RequestId>,
    /// Ticks on which at least one subsection stayed busy after service.
    busy_ticks: u64,
    stages_started: u64,
    stages_finished: u64,
    drops: u64,
}

impl Section {
    /// Creates an idle section. Capacity is validated by the configuration layer.
    pub fn new(kind: SectionKind, capacity: usize, mean_service_time: f64) -> Self {
        Self {
            kind,
            mean_service_time,
            pool: SubsectionPool::new(kind, capacity),
            queue: RequestQueue::new(kind),
            admission: AdmissionRule::default(),
            in_progress: Vec::with_capacity(capacity),
            busy_ticks: 0,
            stages_started: 0,
            stages_finished: 0,
            drops: 0,
        }
    }

    /// Sets how arriving requests treat an idle subsection.
    pub fn with_admission(mut self, admission: AdmissionRule) -> Self {
        self.admission = admission;
        self
    }

    pub fn admission(&self) -> AdmissionRule {
        self.admission
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn mean_service_time(&self) -> f64 {
        self.mean_service_time
    }

    pub fn pool(&self) -> &SubsectionPool {
        &self.pool
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn in_progress(&self) -> &[RequestId] {
        &self.in_progress
    }

    pub fn busy_ticks(&self) -> u64 {
        self.busy_ticks
    }

    pub fn stages_started(&self) -> u64 {
        self.stages_started
    }

    pub fn stages_finished(&self) -> u64 {
        self.stages_finished
    }

    pub fn drops(&self) -> u64 {
        self.drops
    }

    /// Whether nothing is queued or in service here.
    pub fn is_quiet(&self) -> bool {
        self.queue.is_empty() && self.in_progress.is_empty()
    }

    /// Accepts a request arriving for its current stage at `tick`.
    ///
    /// The request starts immediately when a subsection is idle, otherwise it
    /// joins the tail of the queue. Under [`AdmissionRule::WaitingLineFirst`]
    /// it also queues while anyone is already waiting.
    pub fn admit(&mut self, id: RequestId, tick: Tick, requests: &mut [Request]) -> SimResult<()> {
        requests[id].record_enter_queue(tick);
        let may_start = match self.admission {
            AdmissionRule::IdleSubsection => self.pool.has_idle(),
            AdmissionRule::WaitingLineFirst => self.pool.has_idle() && self.queue.is_empty(),
        };
        if may_start {
            self.start(id, tick, requests)
        } else {
            trace!(section = %self.kind, request = id, tick, "queued");
            self.queue.push(id);
            Ok(())
        }
    }

    fn start(&mut self, id: RequestId, tick: Tick, requests: &mut [Request]) -> SimResult<()> {
        self.pool.acquire()?;
        requests[id].record_start(tick);
        self.in_progress.push(id);
        self.stages_started += 1;
        trace!(section = %self.kind, request = id, tick, "started");
        Ok(())
    }

    /// Runs the three-phase protocol for `tick`.
    pub fn process_tick(&mut self, tick: Tick, requests: &mut [Request]) -> SimResult<TickOutcome> {
        self.admit_from_queue(tick, requests)?;
        let outcome = self.serve(tick, requests)?;
        if !self.in_progress.is_empty() {
            self.busy_ticks += 1;
        }
        Ok(outcome)
    }

    fn admit_from_queue(&mut self, tick: Tick, requests: &mut [Request]) -> SimResult<()> {
        self.queue.sample_length();
        while self.pool.has_idle() && !self.queue.is_empty() {
            let id = self.queue.pop_front()?;
            self.start(id, tick, requests)?;
        }
        Ok(())
    }

    fn serve(&mut self, tick: Tick, requests: &mut [Request]) -> SimResult<TickOutcome> {
        let mut outcome = TickOutcome::default();
        let serving = std::mem::take(&mut self.in_progress);
        let mut still_serving = Vec::with_capacity(serving.len());

        for id in serving {
            let request = &mut requests[id];

            if request.expired(tick) {
                self.pool.release()?;
                request.mark_dropped(tick);
                self.drops += 1;
                trace!(section = %self.kind, request = id, tick, "dropped");
                outcome.dropped.push(id);
                continue;
            }

            if !request.work(tick) {
                still_serving.push(id);
                continue;
            }

            self.pool.release()?;
            self.stages_finished += 1;
            if request.path_complete() {
                request.mark_completed();
                trace!(section = %self.kind, request = id, tick, "completed");
                outcome.completed.push(id);
            } else {
                trace!(section = %self.kind, request = id, tick, "stage finished");
                outcome.handoffs.push(id);
            }
        }

        self.in_progress = still_serving;
        Ok(outcome)
    }
}
