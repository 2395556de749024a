use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Indexing counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub listings_served: Arc<AtomicU64>,
    pub no_change_hits: Arc<AtomicU64>,
    pub cold_misses: Arc<AtomicU64>,
    pub stub_seeds: Arc<AtomicU64>,
    pub stale_rescans: Arc<AtomicU64>,
    pub lazy_refreshes: Arc<AtomicU64>,
    pub syncs_completed: Arc<AtomicU64>,
    pub syncs_failed: Arc<AtomicU64>,
    pub rows_written: Arc<AtomicU64>,
    pub tasks_dispatched: Arc<AtomicU64>,
    pub tasks_failed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            listings_served: Arc::new(AtomicU64::new(0)),
            no_change_hits: Arc::new(AtomicU64::new(0)),
            cold_misses: Arc::new(AtomicU64::new(0)),
            stub_seeds: Arc::new(AtomicU64::new(0)),
            stale_rescans: Arc::new(AtomicU64::new(0)),
            lazy_refreshes: Arc::new(AtomicU64::new(0)),
            syncs_completed: Arc::new(AtomicU64::new(0)),
            syncs_failed: Arc::new(AtomicU64::new(0)),
            rows_written: Arc::new(AtomicU64::new(0)),
            tasks_dispatched: Arc::new(AtomicU64::new(0)),
            tasks_failed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_listings_served(&self) {
        self.listings_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_no_change_hits(&self) {
        self.no_change_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cold_misses(&self) {
        self.cold_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stub_seeds(&self) {
        self.stub_seeds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_rescans(&self) {
        self.stale_rescans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lazy_refreshes(&self) {
        self.lazy_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_syncs_completed(&self) {
        self.syncs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_syncs_failed(&self) {
        self.syncs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_written(&self, count: u64) {
        self.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_tasks_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            listings_served: self.listings_served.load(Ordering::Relaxed),
            no_change_hits: self.no_change_hits.load(Ordering::Relaxed),
            cold_misses: self.cold_misses.load(Ordering::Relaxed),
            stub_seeds: self.stub_seeds.load(Ordering::Relaxed),
            stale_rescans: self.stale_rescans.load(Ordering::Relaxed),
            lazy_refreshes: self.lazy_refreshes.load(Ordering::Relaxed),
            syncs_completed: self.syncs_completed.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub listings_served: u64,
    pub no_change_hits: u64,
    pub cold_misses: u64,
    pub stub_seeds: u64,
    pub stale_rescans: u64,
    pub lazy_refreshes: u64,
    pub syncs_completed: u64,
    pub syncs_failed: u64,
    pub rows_written: u64,
    pub tasks_dispatched: u64,
    pub tasks_failed: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition of the counters.
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, u64); 11] = [
            ("listings_served", "Directory listings served", self.listings_served),
            ("no_change_hits", "Listings answered as unchanged", self.no_change_hits),
            ("cold_misses", "Listings of directories missing from the catalog", self.cold_misses),
            ("stub_seeds", "First full scans of stub directories", self.stub_seeds),
            ("stale_rescans", "Foreground rescans after a filesystem change", self.stale_rescans),
            ("lazy_refreshes", "Background rescans scheduled", self.lazy_refreshes),
            ("syncs_completed", "Catalog syncs committed", self.syncs_completed),
            ("syncs_failed", "Catalog syncs rolled back", self.syncs_failed),
            ("rows_written", "Catalog rows inserted, updated or deleted", self.rows_written),
            ("tasks_dispatched", "Worker tasks dispatched", self.tasks_dispatched),
            ("tasks_failed", "Worker tasks answered with an error or lost", self.tasks_failed),
        ];
        let mut body = String::new();
        for (name, help, value) in counters {
            body.push_str(&format!(
                "# HELP bilderwald_{name} {help}\n# TYPE bilderwald_{name} counter\nbilderwald_{name} {value}\n"
            ));
        }
        body.push_str(&format!(
            "# HELP bilderwald_uptime_seconds Uptime seconds\n# TYPE bilderwald_uptime_seconds gauge\nbilderwald_uptime_seconds {}\n",
            self.uptime_seconds
        ));
        body
    }
}
