//! Store metric names and recording helpers.

use metrics::counter;

/// Metric names.
pub mod names {
    /// CAS writes rejected on version mismatch.
    pub const CAS_CONFLICTS: &str = "shotflow_store_cas_conflicts_total";
    /// Versioned saves that went through.
    pub const SAVES: &str = "shotflow_store_saves_total";
}

/// Record a CAS conflict for a collection.
pub fn record_conflict(collection: &str) {
    counter!(names::CAS_CONFLICTS, "collection" => collection.to_string()).increment(1);
}

/// Record a successful save for a collection.
pub fn record_save(collection: &str) {
    counter!(names::SAVES, "collection" => collection.to_string()).increment(1);
}
