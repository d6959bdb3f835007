//! Occupancy statistics for table analysis.
//!
//! Available with the `stats` feature. Every table variant exposes a
//! `debug_stats()` method returning a [`TableStats`] snapshot.

/// Snapshot of a table's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Number of slots in the backing array
    pub capacity: usize,
    /// Number of elements currently in the table
    pub stuffed: usize,
    /// Number of slots holding at least one element
    pub occupied_slots: usize,
    /// Number of tombstoned slots (always 0 outside open addressing)
    pub tombstones: usize,
    /// Longest collision chain, or longest probe walk to a stored element
    pub longest_chain: usize,
}

impl TableStats {
    /// Load factor (stuffed / capacity).
    pub fn load_factor(&self) -> f64 {
        self.stuffed as f64 / self.capacity as f64
    }

    /// Slot utilization (occupied_slots / capacity).
    pub fn slot_utilization(&self) -> f64 {
        self.occupied_slots as f64 / self.capacity as f64
    }

    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.stuffed,
            self.capacity,
            self.load_factor() * 100.0
        );
        println!(
            "Slot Usage: {}/{} ({:.2}% utilization)",
            self.occupied_slots,
            self.capacity,
            self.slot_utilization() * 100.0
        );
        println!("Tombstones: {}", self.tombstones);
        println!("Longest Chain: {}", self.longest_chain);
    }
}
