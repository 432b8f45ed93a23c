use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

/// Best-effort sampler for the current process.
///
/// Refreshes at most once per `min_interval`; between refreshes the last
/// reading is returned. Any failure to read process stats yields zeros.
pub struct ResourceSampler {
    system: System,
    pid: Option<Pid>,
    min_interval: Duration,
    last_refresh: Option<Instant>,
    last: ResourceUsage,
}

impl ResourceSampler {
    pub fn new(min_interval: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::debug!("Resource sampling disabled: {}", e);
                None
            }
        };

        Self {
            system: System::new(),
            pid,
            min_interval,
            last_refresh: None,
            last: ResourceUsage::default(),
        }
    }

    pub fn sample(&mut self) -> ResourceUsage {
        let Some(pid) = self.pid else {
            return self.last;
        };

        let fresh = self
            .last_refresh
            .map(|at| at.elapsed() < self.min_interval)
            .unwrap_or(false);
        if fresh {
            return self.last;
        }

        if self.system.refresh_process(pid) {
            if let Some(process) = self.system.process(pid) {
                self.last = ResourceUsage {
                    memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
                    cpu_percent: process.cpu_usage() as f64,
                };
            }
        }
        self.last_refresh = Some(Instant::now());

        self.last
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
