//! # queuenet
//!
//! A tick-stepped simulator for microservice request processing, modelled as
//! a closed network of queueing stations.
//!
//! ## Model
//!
//! - **Sections** are stations (payment, order management, API gateways...)
//!   with a fixed pool of identical parallel servers called subsections.
//! - **Requests** arrive at a fixed rate per tick, draw a kind, and visit the
//!   kind's path of sections in order. Service durations are exponential,
//!   rounded up to whole ticks, and sampled once when the request is created.
//! - A request still in service after its kind's timeout is **dropped**;
//!   otherwise it **completes** once its last stage finishes.
//!
//! Every tick, each section samples its queue length, admits queued requests
//! into idle subsections, spends one tick of service on (or drops) each
//! request in service, and counts itself busy if anything is still in
//! service. Sections run in a configured order, which decides whether a
//! request handed off mid-tick is served again on that same tick.
//!
//! ## Features
//!
//! - `parallel` - Run independent replications on a rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use queuenet::{SimConfigBuilder, SimulationEngine};
//!
//! let config = SimConfigBuilder::new()
//!     .arrival_rate(3)
//!     .warmup_ticks(100)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let mut engine = SimulationEngine::new(config).unwrap();
//! let report = engine.run().unwrap();
//!
//! assert_eq!(report.completed + report.dropped, report.admitted);
//! println!("{}", report.summary());
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use queuenet::SimConfig;
//!
//! let config = SimConfig::from_file("reference.yaml")?;
//! let report = queuenet::SimulationEngine::new(config)?.run()?;
//! ```

pub mod types;
pub mod error;
pub mod sampler;
pub mod routing;
pub mod request;
pub mod queue;
pub mod section;
pub mod engine;
pub mod config;
pub mod stats;
pub mod parallel;

// Re-export commonly used types
pub use types::{RequestId, RequestKind, SectionKind, Tick};
pub use error::{SimError, SimResult};
pub use sampler::{KindDistribution, RngSampler, Sampler, ScriptedSampler};
pub use routing::{Route, RoutingTable};
pub use request::{Request, RequestStatus};
pub use queue::RequestQueue;
pub use section::{Section, SubsectionPool, TickOutcome};
pub use engine::{EngineStats, Phase, SimulationEngine};
pub use config::{AdmissionRule, ConfigError, HandoffMode, SimConfig, SimConfigBuilder};
pub use stats::{KindReport, SectionReport, SimulationReport, Timer};
pub use parallel::{Estimate, ReplicationRunner, ReplicationSummary};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging. `RUST_LOG`
/// takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// queuenet::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
