//! Static routing table: request kind → ordered section path + timeout.

use crate::config::{ConfigError, ConfigResult, RouteConfig};
use crate::types::{RequestKind, SectionKind, Tick};

/// One entry of the routing table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// Sections visited, in order. Never empty.
    pub path: Vec<SectionKind>,
    /// End-to-end budget in ticks, counted from request creation.
    pub timeout: Tick,
}

/// Immutable lookup from every [`RequestKind`] to its [`Route`].
#[derive(Clone, Debug)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Builds the table, requiring exactly one route per request kind.
    ///
    /// `defined` reports whether a section kind is configured; a path that
    /// references an unconfigured section is rejected.
    pub fn new(
        routes: &[RouteConfig],
        defined: impl Fn(SectionKind) -> bool,
    ) -> ConfigResult<Self> {
        let mut slots: Vec<Option<Route>> = vec![None; RequestKind::COUNT];

        for route in routes {
            if route.path.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "route for {} has an empty path",
                    route.kind
                )));
            }
            if route.timeout == 0 {
                return Err(ConfigError::Validation(format!(
                    "route for {} needs a positive timeout",
                    route.kind
                )));
            }
            if let Some(missing) = route.path.iter().find(|&&s| !defined(s)) {
                return Err(ConfigError::Validation(format!(
                    "route for {} references undefined section {}",
                    route.kind, missing
                )));
            }

            let slot = &mut slots[route.kind.index()];
            if slot.is_some() {
                return Err(ConfigError::Validation(format!(
                    "duplicate route for {}",
                    route.kind
                )));
            }
            *slot = Some(Route {
                path: route.path.clone(),
                timeout: route.timeout,
            });
        }

        let routes = slots
            .into_iter()
            .zip(RequestKind::ALL)
            .map(|(slot, kind)| {
                slot.ok_or_else(|| ConfigError::Validation(format!("no route for {}", kind)))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self { routes })
    }

    /// Returns the route for a request kind.
    pub fn route(&self, kind: RequestKind) -> &Route {
        &self.routes[kind.index()]
    }

    /// Returns the path for a request kind.
    pub fn path(&self, kind: RequestKind) -> &[SectionKind] {
        &self.route(kind).path
    }

    /// Returns the timeout for a request kind.
    pub fn timeout(&self, kind: RequestKind) -> Tick {
        self.route(kind).timeout
    }
}
