//! Entity kinds known to the sync layer.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical collection in the remote document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Employees,
    Clients,
    Materials,
    Vendors,
    MaterialOrders,
    Attendance,
}

impl EntityKind {
    /// Every kind, in dispatch-table order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Employees,
        EntityKind::Clients,
        EntityKind::Materials,
        EntityKind::Vendors,
        EntityKind::MaterialOrders,
        EntityKind::Attendance,
    ];

    /// Collection name as used in queued operations and storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Employees => "employees",
            EntityKind::Clients => "clients",
            EntityKind::Materials => "materials",
            EntityKind::Vendors => "vendors",
            EntityKind::MaterialOrders => "materialOrders",
            EntityKind::Attendance => "attendance",
        }
    }

    /// Whether operations on this kind are replayed against a remote service.
    ///
    /// Attendance replay is not wired yet; its operations stay queued.
    pub fn has_remote(&self) -> bool {
        !matches!(self, EntityKind::Attendance)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownCollection(s.to_string()))
    }
}
