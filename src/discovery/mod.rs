//! Service discovery results
//!
//! Discovery output is plain text; the classifier turns it into a
//! [`ServiceCatalog`] that decides which test phases have work to do.

pub mod classifier;

pub use classifier::{service_name_for_port, ServiceClassifier};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed protocol categories a discovered port can fall into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Web,
    Ssh,
    Ftp,
    Db,
    Other,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 5] = [
        ServiceCategory::Web,
        ServiceCategory::Ssh,
        ServiceCategory::Ftp,
        ServiceCategory::Db,
        ServiceCategory::Other,
    ];

    /// Map a service name to its category. Unknown names land in `Other`.
    pub fn from_service(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "http" | "https" => ServiceCategory::Web,
            "ssh" => ServiceCategory::Ssh,
            "ftp" => ServiceCategory::Ftp,
            "mysql" | "postgresql" | "mongodb" => ServiceCategory::Db,
            _ => ServiceCategory::Other,
        }
    }

    fn index(self) -> usize {
        match self {
            ServiceCategory::Web => 0,
            ServiceCategory::Ssh => 1,
            ServiceCategory::Ftp => 2,
            ServiceCategory::Db => 3,
            ServiceCategory::Other => 4,
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceCategory::Web => "web",
            ServiceCategory::Ssh => "ssh",
            ServiceCategory::Ftp => "ftp",
            ServiceCategory::Db => "db",
            ServiceCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// Discovered ports grouped by category, in encounter order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    buckets: [Vec<u16>; 5],
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a port under a category. Duplicates are kept.
    pub fn push(&mut self, category: ServiceCategory, port: u16) {
        self.buckets[category.index()].push(port);
    }

    pub fn ports(&self, category: ServiceCategory) -> &[u16] {
        &self.buckets[category.index()]
    }

    pub fn len(&self, category: ServiceCategory) -> usize {
        self.buckets[category.index()].len()
    }

    /// Total port entries across all categories
    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
