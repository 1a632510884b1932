//! Simulation driver.
//!
//! The `SimulationEngine` owns every piece of mutable state of a run: the tick
//! counter, the sections, the request arena and the terminal lists. Each call
//! to [`SimulationEngine::tick`] advances the whole network by one tick.
//!
//! A run goes through three phases:
//!
//! - **WarmUp** - `arrival_rate` new requests per tick for `warmup_ticks` ticks
//! - **Draining** - no arrivals; ticks continue until every admitted request
//!   has completed or been dropped. Sections run in `drain_order`, which
//!   defaults to declaration order rather than the warm-up processing order
//! - **Finished** - nothing left to do; statistics are final

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{HandoffMode, SimConfig};
use crate::error::{SimError, SimResult};
use crate::request::{Request, RequestStatus};
use crate::routing::RoutingTable;
use crate::sampler::{service_ticks, KindDistribution, RngSampler, Sampler};
use crate::section::Section;
use crate::stats::SimulationReport;
use crate::types::{RequestId, RequestKind, SectionKind, Tick};

/// Lifecycle phase of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    WarmUp,
    Draining,
    Finished,
}

/// Counters collected by the engine itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Ticks executed during warm-up
    pub warmup_ticks: u64,
    /// Ticks executed while draining
    pub drain_ticks: u64,
    /// Requests generated by the arrival process
    pub arrivals: u64,
    /// Requests admitted through `inject`
    pub injected: u64,
    /// Stage hand-offs between sections
    pub handoffs: u64,
}

/// The tick-stepped queueing-network simulation.
///
/// # Example
///
/// ```rust
/// use queuenet::{SimConfigBuilder, SimulationEngine};
///
/// let config = SimConfigBuilder::new()
///     .arrival_rate(2)
///     .warmup_ticks(20)
///     .seed(7)
///     .build()
///     .unwrap();
///
/// let mut engine = SimulationEngine::new(config).unwrap();
/// let report = engine.run().unwrap();
/// assert_eq!(report.admitted, 40);
/// assert_eq!(report.completed + report.dropped, 40);
/// ```
pub struct SimulationEngine {
    config: SimConfig,
    routing: RoutingTable,
    kinds: KindDistribution,
    sampler: Box<dyn Sampler>,
    /// Sections in processing order
    sections: Vec<Section>,
    /// Position in `sections` of each section kind, if configured
    slots: [Option<usize>; SectionKind::COUNT],
    /// Positions in `sections`, in drain order
    drain_positions: Vec<usize>,
    /// Every request ever admitted, indexed by id
    requests: Vec<Request>,
    completed: Vec<RequestId>,
    dropped: Vec<RequestId>,
    /// Hand-offs waiting for the next tick (next-tick mode only)
    inbox: Vec<RequestId>,
    current_tick: Tick,
    phase: Phase,
    stats: EngineStats,
}

impl SimulationEngine {
    /// Creates an engine with an RNG sampler seeded from the configuration.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        let sampler = RngSampler::new(config.seed);
        Self::with_sampler(config, Box::new(sampler))
    }

    /// Creates an engine drawing from the given sampler.
    pub fn with_sampler(config: SimConfig, sampler: Box<dyn Sampler>) -> SimResult<Self> {
        config.validate()?;
        let routing = config.routing_table()?;
        let kinds = config.kind_distribution()?;

        let mut slots = [None; SectionKind::COUNT];
        let mut sections = Vec::with_capacity(config.processing_order.len());
        for &kind in &config.processing_order {
            // validate() guarantees every ordered kind is configured
            if let Some(section) = config.section(kind) {
                slots[kind.index()] = Some(sections.len());
                sections.push(
                    Section::new(kind, section.capacity, section.mean_service_time)
                        .with_admission(config.admission),
                );
            }
        }
        let drain_positions = config
            .drain_order
            .iter()
            .filter_map(|kind| slots[kind.index()])
            .collect();

        debug!(
            sections = sections.len(),
            arrival_rate = config.arrival_rate,
            warmup_ticks = config.warmup_ticks,
            handoff = ?config.handoff,
            "simulation engine created"
        );

        Ok(Self {
            config,
            routing,
            kinds,
            sampler,
            sections,
            slots,
            drain_positions,
            requests: Vec::new(),
            completed: Vec::new(),
            dropped: Vec::new(),
            inbox: Vec::new(),
            current_tick: 0,
            phase: Phase::WarmUp,
            stats: EngineStats::default(),
        })
    }

    /// Returns the configuration the engine was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Returns the routing table.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Returns the current tick (also the number of ticks executed).
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the engine counters.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Sections in processing order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns a section by kind.
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.slots[kind.index()].map(|pos| &self.sections[pos])
    }

    /// Every admitted request, indexed by id.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Returns a request by id.
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    /// Ids of completed requests, in completion order.
    pub fn completed(&self) -> &[RequestId] {
        &self.completed
    }

    /// Ids of dropped requests, in drop order.
    pub fn dropped(&self) -> &[RequestId] {
        &self.dropped
    }

    /// Number of requests admitted so far.
    pub fn admitted(&self) -> usize {
        self.requests.len()
    }

    /// Whether every admitted request is terminal.
    pub fn all_terminal(&self) -> bool {
        self.completed.len() + self.dropped.len() == self.requests.len()
    }

    /// Admits an extra request of `kind` at the current tick.
    ///
    /// Used to seed a backlog before the run, independent of the arrival
    /// process. Injecting into a finished run reopens its drain phase.
    pub fn inject(&mut self, kind: RequestKind) -> SimResult<RequestId> {
        let id = self.create_request(kind)?;
        self.admit(id)?;
        self.stats.injected += 1;
        if self.phase == Phase::Finished {
            self.phase = Phase::Draining;
        }
        Ok(id)
    }

    fn create_request(&mut self, kind: RequestKind) -> SimResult<RequestId> {
        let tick = self.current_tick;
        let route = self.routing.route(kind);
        let needed_time = route
            .path
            .iter()
            .map(|&section| {
                let pos = self.slots[section.index()].ok_or_else(|| {
                    SimError::InvariantViolation {
                        tick,
                        detail: format!("{} routes through unconfigured section {}", kind, section),
                    }
                })?;
                let mean = self.sections[pos].mean_service_time();
                Ok::<Tick, SimError>(service_ticks(self.sampler.as_mut(), mean))
            })
            .collect::<SimResult<Vec<Tick>>>()?;

        let id = self.requests.len();
        self.requests.push(Request::new(
            id,
            kind,
            self.current_tick,
            route.path.clone(),
            needed_time,
            route.timeout,
        ));
        Ok(id)
    }

    /// Sends a request to the section of its current stage.
    fn admit(&mut self, id: RequestId) -> SimResult<()> {
        let tick = self.current_tick;
        let pos = self.requests[id]
            .current_section()
            .and_then(|kind| self.slots[kind.index()])
            .ok_or_else(|| SimError::InvariantViolation {
                tick,
                detail: format!("request {} has no section to visit", id),
            })?;
        self.sections[pos].admit(id, tick, &mut self.requests)
    }

    fn generate_arrivals(&mut self) -> SimResult<()> {
        for _ in 0..self.config.arrival_rate {
            let kind = self.kinds.draw(self.sampler.as_mut());
            let id = self.create_request(kind)?;
            self.admit(id)?;
            self.stats.arrivals += 1;
        }
        Ok(())
    }

    /// Advances the simulation by one tick and returns the resulting phase.
    ///
    /// Does nothing once the run is finished.
    pub fn tick(&mut self) -> SimResult<Phase> {
        if self.phase == Phase::Finished {
            return Ok(self.phase);
        }

        for id in std::mem::take(&mut self.inbox) {
            self.admit(id)?;
        }

        if self.phase == Phase::WarmUp {
            self.generate_arrivals()?;
        }

        let tick = self.current_tick;
        for i in 0..self.sections.len() {
            let pos = match self.phase {
                Phase::WarmUp => i,
                _ => self.drain_positions[i],
            };
            let outcome = self.sections[pos].process_tick(tick, &mut self.requests)?;
            self.completed.extend(outcome.completed);
            self.dropped.extend(outcome.dropped);
            self.stats.handoffs += outcome.handoffs.len() as u64;
            match self.config.handoff {
                HandoffMode::Immediate => {
                    for id in outcome.handoffs {
                        self.admit(id)?;
                    }
                }
                HandoffMode::NextTick => self.inbox.extend(outcome.handoffs),
            }
        }

        match self.phase {
            Phase::WarmUp => self.stats.warmup_ticks += 1,
            _ => self.stats.drain_ticks += 1,
        }

        debug!(
            tick,
            in_flight = self.requests.len() - self.completed.len() - self.dropped.len(),
            completed = self.completed.len(),
            dropped = self.dropped.len(),
            "tick done"
        );

        self.current_tick += 1;
        self.advance_phase()?;
        Ok(self.phase)
    }

    fn advance_phase(&mut self) -> SimResult<()> {
        if self.phase == Phase::WarmUp && self.current_tick >= self.config.warmup_ticks {
            info!(
                tick = self.current_tick,
                admitted = self.requests.len(),
                "warm-up finished, draining"
            );
            self.phase = Phase::Draining;
        }

        if self.phase == Phase::Draining {
            if self.all_terminal() && self.inbox.is_empty() {
                info!(
                    tick = self.current_tick,
                    completed = self.completed.len(),
                    dropped = self.dropped.len(),
                    "simulation finished"
                );
                self.phase = Phase::Finished;
            } else if let Some(limit) = self.config.max_drain_ticks {
                if self.stats.drain_ticks >= limit {
                    return Err(SimError::DrainLimitExceeded { limit });
                }
            }
        }
        Ok(())
    }

    /// Runs `n` ticks, stopping early if the run finishes.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<Phase> {
        for _ in 0..n {
            if self.tick()? == Phase::Finished {
                break;
            }
        }
        Ok(self.phase)
    }

    /// Runs warm-up and drain to completion and returns the final report.
    pub fn run(&mut self) -> SimResult<SimulationReport> {
        while self.phase != Phase::Finished {
            self.tick()?;
        }
        Ok(self.report())
    }

    /// Aggregates statistics over the ticks executed so far.
    pub fn report(&self) -> SimulationReport {
        SimulationReport::aggregate(self.current_tick, &self.sections, &self.requests)
    }

    /// Exports a compact JSON snapshot of the engine state.
    pub fn export_stats(&self) -> serde_json::Value {
        let mut sections = serde_json::Map::new();
        for section in &self.sections {
            sections.insert(
                section.kind().to_string(),
                serde_json::json!({
                    "capacity": section.pool().capacity(),
                    "busy": section.pool().busy(),
                    "queue_length": section.queue().len(),
                    "busy_ticks": section.busy_ticks(),
                    "stages_started": section.stages_started(),
                }),
            );
        }

        serde_json::json!({
            "engine": {
                "current_tick": self.current_tick,
                "phase": self.phase,
                "admitted": self.requests.len(),
                "completed": self.completed.len(),
                "dropped": self.dropped.len(),
                "arrivals": self.stats.arrivals,
                "injected": self.stats.injected,
                "handoffs": self.stats.handoffs,
            },
            "sections": sections,
        })
    }

    /// Verifies the structural invariants of the network.
    ///
    /// Checks that every pool agrees with its in-progress set, that each
    /// in-flight request sits in exactly one place (a queue, a subsection or
    /// the hand-off inbox) matching its current stage, that terminal requests
    /// are held nowhere, and that the terminal lists match request statuses.
    pub fn check_invariants(&self) -> SimResult<()> {
        let tick = self.current_tick;
        let violation = |detail: String| SimError::InvariantViolation { tick, detail };

        let mut seen = vec![0u32; self.requests.len()];
        for section in &self.sections {
            let pool = section.pool();
            if pool.busy() + pool.idle() != pool.capacity() || pool.busy() != section.in_progress().len() {
                return Err(violation(format!(
                    "section {} has {} busy of {} but {} in progress",
                    section.kind(),
                    pool.busy(),
                    pool.capacity(),
                    section.in_progress().len()
                )));
            }
            for id in section.queue().iter().chain(section.in_progress().iter().copied()) {
                seen[id] += 1;
                if self.requests[id].current_section() != Some(section.kind()) {
                    return Err(violation(format!(
                        "request {} held by {} but its stage is elsewhere",
                        id,
                        section.kind()
                    )));
                }
            }
        }
        for &id in &self.inbox {
            seen[id] += 1;
        }

        for (request, &count) in self.requests.iter().zip(seen.iter()) {
            let expected = if request.status.is_terminal() { 0 } else { 1 };
            if count != expected {
                return Err(violation(format!(
                    "request {} ({:?}) held in {} places",
                    request.id, request.status, count
                )));
            }
        }

        for &id in &self.completed {
            let request = &self.requests[id];
            if request.status != RequestStatus::Completed || !request.path_complete() {
                return Err(violation(format!("request {} listed as completed", id)));
            }
        }
        for &id in &self.dropped {
            let request = &self.requests[id];
            if request.status != RequestStatus::Dropped || request.path_complete() {
                return Err(violation(format!("request {} listed as dropped", id)));
            }
        }
        let terminal = self.requests.iter().filter(|r| r.status.is_terminal()).count();
        if terminal != self.completed.len() + self.dropped.len() {
            return Err(violation(format!(
                "{} terminal requests but {} listed",
                terminal,
                self.completed.len() + self.dropped.len()
            )));
        }

        Ok(())
    }
}
