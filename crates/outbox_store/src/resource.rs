//! Mapping from remote resource names to cache collections.

use crate::collection::Collection;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remote resource kind the store knows how to cache.
///
/// Parsing is case-insensitive and accepts singular and plural aliases.
/// Names outside the set are rejected with [`StoreError::UnknownResource`]
/// so nothing is silently dropped from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `property` / `properties`
    #[serde(rename = "properties")]
    Property,
    /// `contract` / `contracts`
    #[serde(rename = "contracts")]
    Contract,
    /// `payment` / `payments`
    #[serde(rename = "payments")]
    Payment,
    /// `maintenance`
    #[serde(rename = "maintenance")]
    Maintenance,
    /// `notification` / `notifications`
    #[serde(rename = "notifications")]
    Notification,
    /// `delivery` / `deliveries` / `runner`
    #[serde(rename = "deliveries")]
    Delivery,
    /// `ticket` / `tickets` / `support`
    #[serde(rename = "tickets")]
    SupportTicket,
    /// `service` / `services`
    #[serde(rename = "services")]
    MaintenanceService,
}

impl ResourceKind {
    /// Every resource kind.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Property,
        ResourceKind::Contract,
        ResourceKind::Payment,
        ResourceKind::Maintenance,
        ResourceKind::Notification,
        ResourceKind::Delivery,
        ResourceKind::SupportTicket,
        ResourceKind::MaintenanceService,
    ];

    /// The collection this kind is cached in.
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            ResourceKind::Property => Collection::Properties,
            ResourceKind::Contract => Collection::Contracts,
            ResourceKind::Payment => Collection::Payments,
            ResourceKind::Maintenance => Collection::Maintenance,
            ResourceKind::Notification => Collection::Notifications,
            ResourceKind::Delivery => Collection::RunnerDeliveries,
            ResourceKind::SupportTicket => Collection::SupportTickets,
            ResourceKind::MaintenanceService => Collection::MaintenanceServices,
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::Property => "properties",
            ResourceKind::Contract => "contracts",
            ResourceKind::Payment => "payments",
            ResourceKind::Maintenance => "maintenance",
            ResourceKind::Notification => "notifications",
            ResourceKind::Delivery => "deliveries",
            ResourceKind::SupportTicket => "tickets",
            ResourceKind::MaintenanceService => "services",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.to_ascii_lowercase().as_str() {
            "property" | "properties" => ResourceKind::Property,
            "contract" | "contracts" => ResourceKind::Contract,
            "payment" | "payments" => ResourceKind::Payment,
            "maintenance" => ResourceKind::Maintenance,
            "notification" | "notifications" => ResourceKind::Notification,
            "delivery" | "deliveries" | "runner" => ResourceKind::Delivery,
            "ticket" | "tickets" | "support" => ResourceKind::SupportTicket,
            "service" | "services" => ResourceKind::MaintenanceService,
            _ => return Err(StoreError::UnknownResource(s.to_string())),
        };
        Ok(kind)
    }
}
