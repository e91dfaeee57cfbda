//! The fixed set of collections in a store.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named collection in the local store.
///
/// The set is closed: one collection per cached resource kind, the
/// pending-mutation queue, and two small auxiliary collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Cached properties.
    #[serde(rename = "properties")]
    Properties,
    /// Cached contracts.
    #[serde(rename = "contracts")]
    Contracts,
    /// Cached payments.
    #[serde(rename = "payments")]
    Payments,
    /// Cached maintenance requests.
    #[serde(rename = "maintenance")]
    Maintenance,
    /// Cached notifications. The record flag means "read".
    #[serde(rename = "notifications")]
    Notifications,
    /// Cached runner deliveries.
    #[serde(rename = "runner-deliveries")]
    RunnerDeliveries,
    /// Cached support tickets.
    #[serde(rename = "support-tickets")]
    SupportTickets,
    /// Cached maintenance services.
    #[serde(rename = "maintenance-services")]
    MaintenanceServices,
    /// Pending mutations awaiting delivery.
    #[serde(rename = "offline-queue")]
    OfflineQueue,
    /// The current user snapshot.
    #[serde(rename = "user")]
    User,
    /// Key/value settings.
    #[serde(rename = "settings")]
    Settings,
}

impl Collection {
    /// Every collection, in a stable order.
    pub const ALL: [Collection; 11] = [
        Collection::Properties,
        Collection::Contracts,
        Collection::Payments,
        Collection::Maintenance,
        Collection::Notifications,
        Collection::RunnerDeliveries,
        Collection::SupportTickets,
        Collection::MaintenanceServices,
        Collection::OfflineQueue,
        Collection::User,
        Collection::Settings,
    ];

    /// Returns the persisted name of the collection.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Collection::Properties => "properties",
            Collection::Contracts => "contracts",
            Collection::Payments => "payments",
            Collection::Maintenance => "maintenance",
            Collection::Notifications => "notifications",
            Collection::RunnerDeliveries => "runner-deliveries",
            Collection::SupportTickets => "support-tickets",
            Collection::MaintenanceServices => "maintenance-services",
            Collection::OfflineQueue => "offline-queue",
            Collection::User => "user",
            Collection::Settings => "settings",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}
