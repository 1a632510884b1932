//! FIFO waiting line of a section, with time-average instrumentation.

use std::collections::VecDeque;

use crate::error::{SimError, SimResult};
use crate::types::{RequestId, SectionKind, Tick};

/// Requests waiting for a subsection, served strictly in arrival order.
#[derive(Clone, Debug)]
pub struct RequestQueue {
    section: SectionKind,
    waiting: VecDeque<RequestId>,
    /// Sum of the queue length sampled once per tick.
    length_sum: u64,
    /// Longest length ever observed at a sampling point.
    peak_length: usize,
}

impl RequestQueue {
    pub fn new(section: SectionKind) -> Self {
        Self {
            section,
            waiting: VecDeque::new(),
            length_sum: 0,
            peak_length: 0,
        }
    }

    /// Appends a request to the tail.
    pub fn push(&mut self, id: RequestId) {
        self.waiting.push_back(id);
    }

    /// Removes and returns the head.
    pub fn pop_front(&mut self) -> SimResult<RequestId> {
        self.waiting.pop_front().ok_or(SimError::EmptyQueue {
            section: self.section,
        })
    }

    /// Accumulates the current length. Called once per tick, before any pop.
    pub fn sample_length(&mut self) {
        let len = self.waiting.len();
        self.length_sum += len as u64;
        self.peak_length = self.peak_length.max(len);
    }

    /// Time-averaged length over `ticks` ticks.
    pub fn average_length(&self, ticks: Tick) -> f64 {
        if ticks == 0 {
            0.0
        } else {
            self.length_sum as f64 / ticks as f64
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn length_sum(&self) -> u64 {
        self.length_sum
    }

    pub fn peak_length(&self) -> usize {
        self.peak_length
    }

    /// Waiting requests, head first.
    pub fn iter(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.waiting.iter().copied()
    }
}
