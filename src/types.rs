//! Core type definitions for the simulator.
//!
//! This module defines the time unit, identifiers and the two fixed tag sets
//! (section kinds and request kinds) used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation time unit: one discrete tick.
///
/// All admissions, service decrements and timeouts are resolved at tick
/// granularity.
pub type Tick = u64;

/// Index of a request in the engine's request arena.
///
/// Ids are assigned in creation order, so a lower id was created no later
/// than a higher one.
pub type RequestId = usize;

/// The architectural component a section represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    RestaurantManagement,
    CustomersManagement,
    OrdersManagement,
    ContactDelivery,
    Payment,
    MobileApiGate,
    WebGate,
}

impl SectionKind {
    /// Number of section kinds.
    pub const COUNT: usize = 7;

    /// All section kinds in declaration order.
    pub const ALL: [SectionKind; Self::COUNT] = [
        SectionKind::RestaurantManagement,
        SectionKind::CustomersManagement,
        SectionKind::OrdersManagement,
        SectionKind::ContactDelivery,
        SectionKind::Payment,
        SectionKind::MobileApiGate,
        SectionKind::WebGate,
    ];

    /// Dense index of this kind, usable for table lookups.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            SectionKind::RestaurantManagement => "restaurant_management",
            SectionKind::CustomersManagement => "customers_management",
            SectionKind::OrdersManagement => "orders_management",
            SectionKind::ContactDelivery => "contact_delivery",
            SectionKind::Payment => "payment",
            SectionKind::MobileApiGate => "mobile_api_gate",
            SectionKind::WebGate => "web_gate",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of a simulated request; determines its path and timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestKind {
    Type1,
    Type2,
    Type3,
    Type4,
    Type5,
    Type6,
    Type7,
}

impl RequestKind {
    /// Number of request kinds.
    pub const COUNT: usize = 7;

    /// All request kinds in declaration order.
    pub const ALL: [RequestKind; Self::COUNT] = [
        RequestKind::Type1,
        RequestKind::Type2,
        RequestKind::Type3,
        RequestKind::Type4,
        RequestKind::Type5,
        RequestKind::Type6,
        RequestKind::Type7,
    ];

    /// Dense index of this kind, usable for table lookups.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Type1 => "type1",
            RequestKind::Type2 => "type2",
            RequestKind::Type3 => "type3",
            RequestKind::Type4 => "type4",
            RequestKind::Type5 => "type5",
            RequestKind::Type6 => "type6",
            RequestKind::Type7 => "type7",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_declaration_order() {
        for (i, kind) in SectionKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        for (i, kind) in RequestKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(SectionKind::MobileApiGate.to_string(), "mobile_api_gate");
        assert_eq!(RequestKind::Type4.to_string(), "type4");
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let yaml = serde_yaml::to_string(&SectionKind::ContactDelivery).unwrap();
        assert_eq!(yaml.trim(), "ContactDelivery");
        let kind: RequestKind = serde_yaml::from_str("Type6").unwrap();
        assert_eq!(kind, RequestKind::Type6);
    }
}
