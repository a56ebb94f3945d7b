//! Host resource sampling.
//!
//! Samples system-wide CPU usage and the resident memory of this process
//! once per interval and publishes each sample as a
//! [`GatewayEvent::SystemStats`] plus a watch channel for on-demand reads.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use localgate_core::{EventSink, GatewayEvent};

/// Default time between samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// One resource usage sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemStats {
    /// System-wide CPU usage, 0 to 100.
    pub cpu_percent: f32,
    /// Resident memory of the current process, in bytes.
    pub memory_bytes: u64,
}

impl From<SystemStats> for GatewayEvent {
    fn from(stats: SystemStats) -> Self {
        Self::system_stats(stats.cpu_percent, stats.memory_bytes)
    }
}

/// Stateful sampler; CPU usage is measured between consecutive samples,
/// so the first one reports 0.
pub struct SystemMonitor {
    system: System,
    pid: Option<Pid>,
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMonitor {
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug!("Process memory unavailable: {e}");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Refresh counters and return the current usage.
    pub fn sample(&mut self) -> SystemStats {
        self.system.refresh_cpu_usage();
        let cpu = self.system.global_cpu_usage();
        let cpu_percent = if cpu.is_finite() { cpu.clamp(0.0, 100.0) } else { 0.0 };

        let memory_bytes = self.pid.map_or(0, |pid| {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            self.system.process(pid).map_or(0, sysinfo::Process::memory)
        });

        SystemStats {
            cpu_percent,
            memory_bytes,
        }
    }
}

/// Handle to a running sampling task.
pub struct MonitorHandle {
    latest: watch::Receiver<SystemStats>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Most recent sample.
    pub fn latest(&self) -> SystemStats {
        *self.latest.borrow()
    }

    /// Stop sampling and wait for the task to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            debug!("System monitor task ended abnormally: {e}");
        }
    }
}

/// Start sampling every `interval`, emitting each sample to `sink`.
pub fn spawn_monitor(sink: Arc<dyn EventSink>, interval: Duration) -> MonitorHandle {
    let (latest_tx, latest) = watch::channel(SystemStats::default());
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut monitor = SystemMonitor::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = monitor.sample();
                    latest_tx.send_replace(stats);
                    sink.emit(stats.into());
                }
            }
        }
        debug!("System monitor stopped");
    });

    MonitorHandle {
        latest,
        cancel,
        task,
    }
}
