//! Memory-adaptive dispatch of crawl jobs
//!
//! Jobs are admitted through a semaphore and held back while system memory
//! usage is above a threshold. Every job gets timing and process-memory stats.

use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Semaphore;

use crate::error::{GenError, GenResult};
use crate::parser::types::DispatchStats;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Hold new jobs while system memory usage is above this percentage
    pub memory_threshold_percent: f64,
    /// Delay between memory checks while waiting
    pub check_interval_ms: u64,
    /// Give up on a job that waited this long for memory
    pub memory_wait_timeout_ms: u64,
    /// Maximum concurrently running jobs
    pub max_session_permit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 90.0,
            check_interval_ms: 1000,
            memory_wait_timeout_ms: 600_000,
            max_session_permit: 20,
        }
    }
}

/// Source of memory readings
pub trait MemoryProbe: Send + Sync {
    /// System-wide memory usage in percent
    fn system_usage_percent(&self) -> f64;

    /// Resident memory of this process in MB
    fn process_memory_mb(&self) -> f64;
}

/// [`MemoryProbe`] backed by `sysinfo`
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn system_usage_percent(&self) -> f64 {
        let Ok(mut sys) = self.system.lock() else {
            return 0.0;
        };
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        sys.used_memory() as f64 / total as f64 * 100.0
    }

    fn process_memory_mb(&self) -> f64 {
        let (Ok(mut sys), Some(pid)) = (self.system.lock(), self.pid) else {
            return 0.0;
        };
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid)
            .map(|p| p.memory() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }
}

/// Bounded, memory-aware job dispatcher shared by all modules of an attempt
pub struct MemoryAdaptiveDispatcher {
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
    probe: Box<dyn MemoryProbe>,
    peak_mb: Mutex<f64>,
}

impl MemoryAdaptiveDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self::with_probe(config, Box::new(SysinfoProbe::new()))
    }

    pub fn with_probe(config: DispatcherConfig, probe: Box<dyn MemoryProbe>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_session_permit.max(1)));
        Self {
            config,
            permits,
            probe,
            peak_mb: Mutex::new(0.0),
        }
    }

    /// Forget the peak memory seen so far
    pub fn reset_peak(&self) {
        if let Ok(mut peak) = self.peak_mb.lock() {
            *peak = 0.0;
        }
    }

    /// Run `job` for `url` once memory and a session permit allow it
    pub async fn dispatch<F, Fut, T>(&self, url: &str, job: F) -> GenResult<(T, DispatchStats)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.wait_for_memory(url).await?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GenError::crawl(url, "dispatcher closed"))?;

        let start_time = Local::now();
        let start_mb = self.probe.process_memory_mb();

        let output = job().await;

        let end_mb = self.probe.process_memory_mb();
        let end_time = Local::now();
        let peak_mb = self.record_peak(start_mb.max(end_mb));

        let stats = DispatchStats {
            memory_usage_mb: end_mb - start_mb,
            peak_memory_mb: peak_mb,
            start_time: iso_timestamp(&start_time),
            end_time: iso_timestamp(&end_time),
            duration_seconds: (end_time - start_time).num_microseconds().unwrap_or(0) as f64
                / 1_000_000.0,
        };
        log::debug!(
            "Dispatched {} in {:.3}s (memory delta {:.1}MB, peak {:.1}MB)",
            url,
            stats.duration_seconds,
            stats.memory_usage_mb,
            stats.peak_memory_mb
        );

        Ok((output, stats))
    }

    async fn wait_for_memory(&self, url: &str) -> GenResult<()> {
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.memory_wait_timeout_ms);
        let mut warned = false;

        loop {
            let usage = self.probe.system_usage_percent();
            if usage <= self.config.memory_threshold_percent {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(GenError::crawl(
                    url,
                    format!(
                        "memory usage stayed at {:.1}% (threshold {:.1}%) for {:?}",
                        usage, self.config.memory_threshold_percent, timeout
                    ),
                ));
            }
            if !warned {
                log::warn!(
                    "Memory usage {:.1}% above {:.1}%, holding crawl of {}",
                    usage,
                    self.config.memory_threshold_percent,
                    url
                );
                warned = true;
            }
            tokio::time::sleep(Duration::from_millis(self.config.check_interval_ms)).await;
        }
    }

    fn record_peak(&self, observed: f64) -> f64 {
        match self.peak_mb.lock() {
            Ok(mut peak) => {
                if observed > *peak {
                    *peak = observed;
                }
                *peak
            }
            Err(_) => observed,
        }
    }
}

/// ISO-8601 local time with microseconds, no offset
fn iso_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports high memory for the first `busy_checks` readings
    struct FakeProbe {
        busy_checks: usize,
        checks: AtomicUsize,
        process_mb: f64,
    }

    impl MemoryProbe for FakeProbe {
        fn system_usage_percent(&self) -> f64 {
            let n = self.checks.fetch_add(1, Ordering::SeqCst);
            if n < self.busy_checks {
                99.0
            } else {
                40.0
            }
        }

        fn process_memory_mb(&self) -> f64 {
            self.process_mb
        }
    }

    fn dispatcher(busy_checks: usize, wait_timeout_ms: u64) -> MemoryAdaptiveDispatcher {
        MemoryAdaptiveDispatcher::with_probe(
            DispatcherConfig {
                memory_threshold_percent: 90.0,
                check_interval_ms: 5,
                memory_wait_timeout_ms: wait_timeout_ms,
                max_session_permit: 2,
            },
            Box::new(FakeProbe {
                busy_checks,
                checks: AtomicUsize::new(0),
                process_mb: 256.0,
            }),
        )
    }

    #[tokio::test]
    async fn test_dispatch_records_stats() {
        let d = dispatcher(0, 1000);
        let (value, stats) = d.dispatch("https://a.test", || async { 42 }).await.unwrap();

        assert_eq!(value, 42);
        assert_eq!(stats.memory_usage_mb, 0.0);
        assert_eq!(stats.peak_memory_mb, 256.0);
        assert!(stats.duration_seconds >= 0.0);
        assert!(stats.start_time <= stats.end_time);
        assert_eq!(stats.start_time.len(), "2024-01-01T10:00:00.000000".len());
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_memory() {
        let d = dispatcher(3, 10_000);
        let (value, _) = d.dispatch("https://a.test", || async { "ok" }).await.unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test]
    async fn test_dispatch_gives_up_under_pressure() {
        let d = dispatcher(usize::MAX, 20);
        let err = d
            .dispatch("https://a.test", || async { () })
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::CrawlFailure { .. }));
    }

    #[test]
    fn test_peak_reset() {
        let d = dispatcher(0, 10);
        assert_eq!(d.record_peak(10.0), 10.0);
        assert_eq!(d.record_peak(5.0), 10.0);
        d.reset_peak();
        assert_eq!(d.record_peak(5.0), 5.0);
    }
}
