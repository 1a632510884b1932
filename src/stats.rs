//! Statistics aggregation and export.
//!
//! [`SimulationReport`] is a post-hoc reduction over the request arena and
//! the per-section counters. It can be exported to JSON or CSV, or rendered
//! as a human-readable summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::request::{Request, RequestStatus};
use crate::section::Section;
use crate::types::{RequestKind, SectionKind, Tick};

/// Steady-state figures for one section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    pub kind: Option<SectionKind>,
    pub capacity: usize,
    pub mean_service_time: f64,
    /// Queue length averaged over all elapsed ticks
    pub avg_queue_length: f64,
    /// Longest queue observed at a sampling point
    pub peak_queue_length: usize,
    /// Fraction of ticks with at least one busy subsection
    pub utilization: f64,
    pub busy_ticks: u64,
    pub stages_started: u64,
    pub stages_finished: u64,
    /// Requests dropped while in service here
    pub drops: u64,
}

/// Outcome figures for one request kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KindReport {
    pub kind: Option<RequestKind>,
    pub admitted: u64,
    pub completed: u64,
    pub dropped: u64,
    pub completion_rate: f64,
    pub drop_rate: f64,
    /// Mean total queueing delay over terminal requests of this kind
    pub avg_queueing_delay: f64,
    /// Mean creation-to-finish latency over completed requests of this kind
    pub avg_completion_latency: f64,
}

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Ticks elapsed; denominator of every time average
    pub total_ticks: Tick,
    pub admitted: u64,
    pub completed: u64,
    pub dropped: u64,
    /// Requests not yet terminal (zero once a run has finished)
    pub in_flight: u64,
    pub completion_rate: f64,
    pub drop_rate: f64,
    /// Mean over sections of their average queue length
    pub avg_queue_length: f64,
    /// Mean total queueing delay over all terminal requests
    pub avg_queueing_delay: f64,
    /// Per-section figures, in processing order
    pub sections: Vec<SectionReport>,
    /// Per-kind figures, in kind order
    pub kinds: Vec<KindReport>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[derive(Default)]
struct KindTally {
    admitted: u64,
    completed: u64,
    dropped: u64,
    delay_sum: u64,
    latency_sum: u64,
}

impl KindTally {
    fn add(&mut self, request: &Request) {
        self.admitted += 1;
        match request.status {
            RequestStatus::InFlight => return,
            RequestStatus::Completed => {
                self.completed += 1;
                self.latency_sum += request.latency().unwrap_or(0);
            }
            RequestStatus::Dropped => self.dropped += 1,
        }
        self.delay_sum += request.queueing_delay();
    }

    fn terminal(&self) -> u64 {
        self.completed + self.dropped
    }
}

impl SimulationReport {
    /// Reduces section counters and request histories into a report.
    ///
    /// Queueing delay only counts terminal requests; in-flight requests are
    /// reported separately.
    pub fn aggregate(total_ticks: Tick, sections: &[Section], requests: &[Request]) -> Self {
        let section_reports: Vec<SectionReport> = sections
            .iter()
            .map(|section| SectionReport {
                kind: Some(section.kind()),
                capacity: section.pool().capacity(),
                mean_service_time: section.mean_service_time(),
                avg_queue_length: section.queue().average_length(total_ticks),
                peak_queue_length: section.queue().peak_length(),
                utilization: ratio(section.busy_ticks() as f64, total_ticks as f64),
                busy_ticks: section.busy_ticks(),
                stages_started: section.stages_started(),
                stages_finished: section.stages_finished(),
                drops: section.drops(),
            })
            .collect();

        let mut tallies: Vec<KindTally> = RequestKind::ALL.iter().map(|_| KindTally::default()).collect();
        for request in requests {
            tallies[request.kind.index()].add(request);
        }

        let kinds: Vec<KindReport> = RequestKind::ALL
            .iter()
            .zip(tallies.iter())
            .map(|(&kind, t)| KindReport {
                kind: Some(kind),
                admitted: t.admitted,
                completed: t.completed,
                dropped: t.dropped,
                completion_rate: ratio(t.completed as f64, t.admitted as f64),
                drop_rate: ratio(t.dropped as f64, t.admitted as f64),
                avg_queueing_delay: ratio(t.delay_sum as f64, t.terminal() as f64),
                avg_completion_latency: ratio(t.latency_sum as f64, t.completed as f64),
            })
            .collect();

        let admitted: u64 = tallies.iter().map(|t| t.admitted).sum();
        let completed: u64 = tallies.iter().map(|t| t.completed).sum();
        let dropped: u64 = tallies.iter().map(|t| t.dropped).sum();
        let delay_sum: u64 = tallies.iter().map(|t| t.delay_sum).sum();
        let queue_sum: f64 = section_reports.iter().map(|s| s.avg_queue_length).sum();

        Self {
            total_ticks,
            admitted,
            completed,
            dropped,
            in_flight: admitted - completed - dropped,
            completion_rate: ratio(completed as f64, admitted as f64),
            drop_rate: ratio(dropped as f64, admitted as f64),
            avg_queue_length: ratio(queue_sum, section_reports.len() as f64),
            avg_queueing_delay: ratio(delay_sum as f64, (completed + dropped) as f64),
            sections: section_reports,
            kinds,
        }
    }

    /// Returns the report for a section kind.
    pub fn section(&self, kind: SectionKind) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.kind == Some(kind))
    }

    /// Returns the report for a request kind.
    pub fn kind(&self, kind: RequestKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == Some(kind))
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self.to_json().map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("metric,value\n");
        csv.push_str(&format!("total_ticks,{}\n", self.total_ticks));
        csv.push_str(&format!("admitted,{}\n", self.admitted));
        csv.push_str(&format!("completed,{}\n", self.completed));
        csv.push_str(&format!("dropped,{}\n", self.dropped));
        csv.push_str(&format!("in_flight,{}\n", self.in_flight));
        csv.push_str(&format!("completion_rate,{:.4}\n", self.completion_rate));
        csv.push_str(&format!("drop_rate,{:.4}\n", self.drop_rate));
        csv.push_str(&format!("avg_queue_length,{:.4}\n", self.avg_queue_length));
        csv.push_str(&format!("avg_queueing_delay,{:.4}\n", self.avg_queueing_delay));

        csv
    }

    /// Exports summary statistics to CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Exports per-section statistics to CSV.
    pub fn sections_to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("section,capacity,avg_queue_length,peak_queue_length,utilization,busy_ticks,stages_started,drops\n");

        for s in &self.sections {
            csv.push_str(&format!(
                "{},{},{:.4},{},{:.4},{},{},{}\n",
                s.kind.map(|k| k.to_string()).unwrap_or_default(),
                s.capacity,
                s.avg_queue_length,
                s.peak_queue_length,
                s.utilization,
                s.busy_ticks,
                s.stages_started,
                s.drops,
            ));
        }

        csv
    }

    /// Exports per-kind statistics to CSV.
    pub fn kinds_to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("kind,admitted,completed,dropped,completion_rate,drop_rate,avg_queueing_delay\n");

        for k in &self.kinds {
            csv.push_str(&format!(
                "{},{},{},{},{:.4},{:.4},{:.4}\n",
                k.kind.map(|k| k.to_string()).unwrap_or_default(),
                k.admitted,
                k.completed,
                k.dropped,
                k.completion_rate,
                k.drop_rate,
                k.avg_queueing_delay,
            ));
        }

        csv
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        write!(w, "{}", self)
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, w: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(w, "=== Simulation Statistics ===")?;
        writeln!(w)?;
        writeln!(w, "Total ticks: {}", self.total_ticks)?;
        writeln!(w, "Admitted: {}", self.admitted)?;
        writeln!(
            w,
            "Completed: {} ({:.2}%)",
            self.completed,
            self.completion_rate * 100.0
        )?;
        writeln!(w, "Dropped: {} ({:.2}%)", self.dropped, self.drop_rate * 100.0)?;
        if self.in_flight > 0 {
            writeln!(w, "In flight: {}", self.in_flight)?;
        }
        writeln!(w, "Average queue length: {:.3}", self.avg_queue_length)?;
        writeln!(w, "Average queueing delay: {:.3}", self.avg_queueing_delay)?;
        writeln!(w)?;

        writeln!(w, "--- Sections ---")?;
        for s in &self.sections {
            let name = s.kind.map(|k| k.to_string()).unwrap_or_default();
            writeln!(w, "{} (capacity {}):", name, s.capacity)?;
            writeln!(
                w,
                "  Queue: avg {:.3}, peak {}",
                s.avg_queue_length, s.peak_queue_length
            )?;
            writeln!(w, "  Utilization: {:.2}%", s.utilization * 100.0)?;
            writeln!(w, "  Stages: {} started, {} dropped", s.stages_started, s.drops)?;
        }
        writeln!(w)?;

        writeln!(w, "--- Request kinds ---")?;
        for k in &self.kinds {
            let name = k.kind.map(|k| k.to_string()).unwrap_or_default();
            writeln!(
                w,
                "{}: {} admitted, {} completed, {} dropped, avg delay {:.3}",
                name, k.admitted, k.completed, k.dropped, k.avg_queueing_delay
            )?;
        }

        Ok(())
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}
