use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub cycles_completed: u64,
    pub steps: StepMetrics,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepMetrics {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub total_duration_ms: u64,
    pub avg_step_duration_ms: f64,
    pub min_step_duration_ms: u64,
    pub max_step_duration_ms: u64,
}

/// Step outcome counters. Owned by the scheduler and passed by reference;
/// there is no process-wide instance.
#[derive(Debug)]
pub struct MetricsCollector {
    steps_total: AtomicU64,
    steps_success: AtomicU64,
    steps_failed: AtomicU64,
    step_duration_sum_ms: AtomicU64,
    step_min_duration_ms: AtomicU64,
    step_max_duration_ms: AtomicU64,
    cycles_completed: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            steps_total: AtomicU64::new(0),
            steps_success: AtomicU64::new(0),
            steps_failed: AtomicU64::new(0),
            step_duration_sum_ms: AtomicU64::new(0),
            step_min_duration_ms: AtomicU64::new(u64::MAX),
            step_max_duration_ms: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&self, duration: Duration, success: bool) {
        self.steps_total.fetch_add(1, Ordering::SeqCst);

        let duration_ms = duration.as_millis() as u64;
        self.step_duration_sum_ms
            .fetch_add(duration_ms, Ordering::SeqCst);
        self.step_min_duration_ms
            .fetch_min(duration_ms, Ordering::SeqCst);
        self.step_max_duration_ms
            .fetch_max(duration_ms, Ordering::SeqCst);

        if success {
            self.steps_success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.steps_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_cycle(&self) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.steps_total.load(Ordering::SeqCst);
        let success = self.steps_success.load(Ordering::SeqCst);
        let total_duration = self.step_duration_sum_ms.load(Ordering::SeqCst);
        let min_duration = self.step_min_duration_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.uptime().as_secs(),
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            steps: StepMetrics {
                total,
                success,
                failed: self.steps_failed.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    success as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            },
            performance: PerformanceMetrics {
                total_duration_ms: total_duration,
                avg_step_duration_ms: if total > 0 {
                    total_duration as f64 / total as f64
                } else {
                    0.0
                },
                min_step_duration_ms: if min_duration == u64::MAX {
                    0
                } else {
                    min_duration
                },
                max_step_duration_ms: self.step_max_duration_ms.load(Ordering::SeqCst),
            },
        }
    }

    /// One-line summary for the end-of-cycle log.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Cycles: {} | Steps: {} | Success: {} | Failed: {} | Success Rate: {:.2}% | Avg Step: {:.1}s",
            s.cycles_completed,
            s.steps.total,
            s.steps.success,
            s.steps.failed,
            s.steps.success_rate,
            s.performance.avg_step_duration_ms / 1000.0
        )
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn steps_total(&self) -> u64 {
        self.steps_total.load(Ordering::SeqCst)
    }

    pub fn steps_success(&self) -> u64 {
        self.steps_success.load(Ordering::SeqCst)
    }

    pub fn steps_failed(&self) -> u64 {
        self.steps_failed.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
