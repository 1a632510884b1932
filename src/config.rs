//! Configuration system for the simulator.
//!
//! A [`SimConfig`] carries every tunable of a run: arrival rate, warm-up
//! length, section capacities and service times, routes, the request-kind
//! distribution and the section processing order. It can be loaded from YAML
//! or JSON; any field left out falls back to the reference system.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! arrival_rate: 30
//! warmup_ticks: 2880
//! seed: 42
//! handoff: immediate
//! processing_order: [ContactDelivery, Payment, RestaurantManagement,
//!                    CustomersManagement, OrdersManagement, MobileApiGate, WebGate]
//!
//! sections:
//!   - kind: Payment
//!     capacity: 1
//!     mean_service_time: 12.0
//!
//! routes:
//!   - kind: Type1
//!     path: [MobileApiGate, OrdersManagement, Payment]
//!     timeout: 25
//!
//! kind_thresholds: [0.2, 0.3, 0.35, 0.6, 0.75, 0.95, 1.0]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::routing::RoutingTable;
use crate::sampler::KindDistribution;
use crate::types::{RequestKind, SectionKind, Tick};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// When a request that finished a stage becomes visible to its next section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffMode {
    /// Admitted to the next section within the same tick, right after the
    /// finishing section's protocol. A section later in the processing order
    /// can then serve it on that same tick.
    #[default]
    Immediate,
    /// Buffered and admitted at the start of the next tick, before arrivals.
    /// Results no longer depend on the processing order.
    NextTick,
}

/// Whether a request arriving at a section may take an idle subsection while
/// others are still waiting in its queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRule {
    /// Start on any idle subsection; queue only when all are busy.
    #[default]
    IdleSubsection,
    /// Also queue behind anyone already waiting, keeping service strictly
    /// first-come first-served.
    WaitingLineFirst,
}

/// Server pool and service time of one section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub kind: SectionKind,
    /// Number of parallel subsections.
    pub capacity: usize,
    /// Mean of the exponential service time, in ticks.
    pub mean_service_time: f64,
}

/// Path and timeout of one request kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub kind: RequestKind,
    pub path: Vec<SectionKind>,
    /// End-to-end budget in ticks from creation.
    pub timeout: Tick,
}

/// Complete simulation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimConfig {
    /// Requests generated per warm-up tick
    #[serde(default = "default_arrival_rate")]
    pub arrival_rate: u64,

    /// Number of ticks during which new requests arrive
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: Tick,

    /// RNG seed; `None` seeds from entropy
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,

    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,

    /// Cumulative probability thresholds, one per request kind
    #[serde(default = "default_kind_thresholds")]
    pub kind_thresholds: Vec<f64>,

    /// Order in which sections run their tick protocol
    #[serde(default = "default_processing_order")]
    pub processing_order: Vec<SectionKind>,

    /// Order in which sections run their tick protocol while draining
    #[serde(default = "default_drain_order")]
    pub drain_order: Vec<SectionKind>,

    #[serde(default)]
    pub handoff: HandoffMode,

    #[serde(default)]
    pub admission: AdmissionRule,

    /// Abort the drain phase after this many ticks
    #[serde(default)]
    pub max_drain_ticks: Option<Tick>,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_arrival_rate() -> u64 {
    30
}

fn default_warmup_ticks() -> Tick {
    2880
}

fn default_sections() -> Vec<SectionConfig> {
    use SectionKind::*;
    [
        (RestaurantManagement, 2, 8.0),
        (CustomersManagement, 1, 5.0),
        (OrdersManagement, 1, 6.0),
        (ContactDelivery, 1, 9.0),
        (Payment, 1, 12.0),
        (MobileApiGate, 1, 2.0),
        (WebGate, 1, 3.0),
    ]
    .into_iter()
    .map(|(kind, capacity, mean_service_time)| SectionConfig {
        kind,
        capacity,
        mean_service_time,
    })
    .collect()
}

fn default_routes() -> Vec<RouteConfig> {
    use RequestKind::*;
    use SectionKind::*;
    [
        (Type1, vec![MobileApiGate, OrdersManagement, Payment], 25),
        (Type2, vec![WebGate, OrdersManagement, Payment], 30),
        (Type3, vec![MobileApiGate, CustomersManagement, ContactDelivery], 25),
        (Type4, vec![MobileApiGate, RestaurantManagement], 30),
        (Type5, vec![WebGate, RestaurantManagement], 30),
        (Type6, vec![WebGate, RestaurantManagement, ContactDelivery], 40),
        (Type7, vec![MobileApiGate, OrdersManagement], 20),
    ]
    .into_iter()
    .map(|(kind, path, timeout)| RouteConfig { kind, path, timeout })
    .collect()
}

fn default_kind_thresholds() -> Vec<f64> {
    vec![0.2, 0.3, 0.35, 0.6, 0.75, 0.95, 1.0]
}

/// Downstream sections first, gateways last.
fn default_processing_order() -> Vec<SectionKind> {
    use SectionKind::*;
    vec![
        ContactDelivery,
        Payment,
        RestaurantManagement,
        CustomersManagement,
        OrdersManagement,
        MobileApiGate,
        WebGate,
    ]
}

/// Declaration order.
fn default_drain_order() -> Vec<SectionKind> {
    SectionKind::ALL.to_vec()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arrival_rate: default_arrival_rate(),
            warmup_ticks: default_warmup_ticks(),
            seed: None,
            sections: default_sections(),
            routes: default_routes(),
            kind_thresholds: default_kind_thresholds(),
            processing_order: default_processing_order(),
            drain_order: default_drain_order(),
            handoff: HandoffMode::default(),
            admission: AdmissionRule::default(),
            max_drain_ticks: None,
            log_level: default_log_level(),
        }
    }
}

/// Checks that `order` lists every defined section exactly once.
fn check_order(
    name: &str,
    order: &[SectionKind],
    defined: &[bool; SectionKind::COUNT],
) -> ConfigResult<()> {
    let mut ordered = [false; SectionKind::COUNT];
    for &kind in order {
        if !defined[kind.index()] {
            return Err(ConfigError::Validation(format!(
                "{} references undefined section: {}",
                name, kind
            )));
        }
        if std::mem::replace(&mut ordered[kind.index()], true) {
            return Err(ConfigError::Validation(format!(
                "Section {} appears twice in the {}",
                kind, name
            )));
        }
    }
    if let Some(kind) = SectionKind::ALL
        .iter()
        .find(|k| defined[k.index()] && !ordered[k.index()])
    {
        return Err(ConfigError::Validation(format!(
            "Section {} is missing from the {}",
            kind, name
        )));
    }
    Ok(())
}

impl SimConfig {
    /// The reference food-delivery system.
    pub fn reference() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.warmup_ticks == 0 {
            return Err(ConfigError::Validation(
                "warmup_ticks must be positive".to_string(),
            ));
        }
        if self.arrival_rate == 0 {
            tracing::warn!("arrival_rate is 0; only injected requests will be simulated");
        }

        let mut defined = [false; SectionKind::COUNT];
        for section in &self.sections {
            if std::mem::replace(&mut defined[section.kind.index()], true) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate section: {}",
                    section.kind
                )));
            }
            if section.capacity == 0 {
                return Err(ConfigError::Validation(format!(
                    "Section {} needs a positive capacity",
                    section.kind
                )));
            }
            if !(section.mean_service_time.is_finite() && section.mean_service_time > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "Section {} needs a positive mean service time, got {}",
                    section.kind, section.mean_service_time
                )));
            }
        }

        check_order("processing order", &self.processing_order, &defined)?;
        check_order("drain order", &self.drain_order, &defined)?;

        self.routing_table()?;
        self.kind_distribution()?;
        Ok(())
    }

    /// Builds the validated routing table.
    pub fn routing_table(&self) -> ConfigResult<RoutingTable> {
        RoutingTable::new(&self.routes, |kind| self.section(kind).is_some())
    }

    /// Builds the validated request-kind distribution.
    pub fn kind_distribution(&self) -> ConfigResult<KindDistribution> {
        KindDistribution::new(&self.kind_thresholds)
    }

    /// Finds a section configuration by kind.
    pub fn section(&self, kind: SectionKind) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Finds a route configuration by request kind.
    pub fn route(&self, kind: RequestKind) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.kind == kind)
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating SimConfig programmatically.
///
/// Starts from the reference system; every setter overrides one piece.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of arrivals per warm-up tick.
    pub fn arrival_rate(mut self, rate: u64) -> Self {
        self.config.arrival_rate = rate;
        self
    }

    /// Sets the warm-up length.
    pub fn warmup_ticks(mut self, ticks: Tick) -> Self {
        self.config.warmup_ticks = ticks;
        self
    }

    /// Sets the RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Defines or replaces a section.
    pub fn section(mut self, kind: SectionKind, capacity: usize, mean_service_time: f64) -> Self {
        let entry = SectionConfig {
            kind,
            capacity,
            mean_service_time,
        };
        match self.config.sections.iter_mut().find(|s| s.kind == kind) {
            Some(existing) => *existing = entry,
            None => self.config.sections.push(entry),
        }
        self
    }

    /// Removes a section from the configuration and both section orders.
    pub fn without_section(mut self, kind: SectionKind) -> Self {
        self.config.sections.retain(|s| s.kind != kind);
        self.config.processing_order.retain(|&k| k != kind);
        self.config.drain_order.retain(|&k| k != kind);
        self
    }

    /// Defines or replaces the route of a request kind.
    pub fn route(mut self, kind: RequestKind, path: Vec<SectionKind>, timeout: Tick) -> Self {
        let entry = RouteConfig { kind, path, timeout };
        match self.config.routes.iter_mut().find(|r| r.kind == kind) {
            Some(existing) => *existing = entry,
            None => self.config.routes.push(entry),
        }
        self
    }

    /// Sets the cumulative request-kind thresholds.
    pub fn kind_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.config.kind_thresholds = thresholds;
        self
    }

    /// Makes every arrival the given kind.
    pub fn only_kind(self, kind: RequestKind) -> Self {
        let thresholds = RequestKind::ALL
            .iter()
            .map(|k| if k.index() >= kind.index() { 1.0 } else { 0.0 })
            .collect();
        self.kind_thresholds(thresholds)
    }

    /// Sets the section processing order.
    pub fn processing_order(mut self, order: Vec<SectionKind>) -> Self {
        self.config.processing_order = order;
        self
    }

    /// Sets the section order used while draining.
    pub fn drain_order(mut self, order: Vec<SectionKind>) -> Self {
        self.config.drain_order = order;
        self
    }

    /// Sets the admission rule of every section.
    pub fn admission(mut self, rule: AdmissionRule) -> Self {
        self.config.admission = rule;
        self
    }

    /// Sets the hand-off mode.
    pub fn handoff(mut self, mode: HandoffMode) -> Self {
        self.config.handoff = mode;
        self
    }

    /// Caps the drain phase.
    pub fn max_drain_ticks(mut self, ticks: Tick) -> Self {
        self.config.max_drain_ticks = Some(ticks);
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
