//! Periodic autosave task.
//!
//! The pulse runs a save callback once right away and then on a fixed interval,
//! on its own tokio task. Stopping is cooperative: [AutosavePulse::stop] raises
//! a flag, wakes the task, and waits for it to finish. A tick that is already
//! running completes; the task checks the flag before every tick body and exits
//! once it sees it. A tick that panics is counted as a failure and the
//! schedule carries on.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PulseError {
    #[error("autosave is already running")]
    AlreadyRunning,
    #[error("autosave interval must be greater than zero")]
    ZeroInterval,
}

/// Counters for status output and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseStats {
    pub completed: u64,
    /// Ticks that returned an error or panicked.
    pub failed: u64,
    /// Subset of `failed` that panicked.
    pub panicked: u64,
    /// A wake-up found the stop flag raised and skipped its tick body.
    pub skipped_after_stop: bool,
}

#[derive(Debug, Default)]
struct PulseCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    skipped_after_stop: AtomicBool,
}

struct RunningPulse {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
    interval: Duration,
}

#[derive(Default)]
pub struct AutosavePulse {
    running: Option<RunningPulse>,
    counters: Arc<PulseCounters>,
}

impl AutosavePulse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the schedule. Must be called from inside a tokio runtime.
    ///
    /// Refused while a previous schedule is still running; callers check
    /// [is_running](Self::is_running) first.
    pub fn start<F>(&mut self, interval: Duration, on_tick: F) -> Result<(), PulseError>
    where
        F: Fn() -> anyhow::Result<()> + Send + 'static,
    {
        if self.is_running() {
            return Err(PulseError::AlreadyRunning);
        }
        if interval.is_zero() {
            return Err(PulseError::ZeroInterval);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        self.counters = Arc::new(PulseCounters::default());

        let task = tokio::spawn(run_schedule(
            interval,
            on_tick,
            stop.clone(),
            wake.clone(),
            self.counters.clone(),
        ));
        info!("Autosave started (every {}s)", interval.as_secs());
        self.running = Some(RunningPulse {
            stop,
            wake,
            task,
            interval,
        });
        Ok(())
    }

    /// Raise the stop flag and wake the task without waiting for it.
    pub fn request_stop(&self) {
        if let Some(running) = &self.running {
            running.stop.store(true, Ordering::SeqCst);
            running.wake.notify_one();
        }
    }

    /// Stop the schedule and wait until the task has ended. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop.store(true, Ordering::SeqCst);
        running.wake.notify_one();
        if let Err(e) = running.task.await {
            error!(target: "autosave", "autosave task ended abnormally: {}", e);
        }
        info!("Autosave stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map_or(false, |r| !r.task.is_finished())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.as_ref().map(|r| r.interval)
    }

    pub fn stats(&self) -> PulseStats {
        PulseStats {
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
            skipped_after_stop: self.counters.skipped_after_stop.load(Ordering::SeqCst),
        }
    }
}

impl Drop for AutosavePulse {
    fn drop(&mut self) {
        self.request_stop();
    }
}

async fn run_schedule<F>(
    interval: Duration,
    on_tick: F,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    counters: Arc<PulseCounters>,
) where
    F: Fn() -> anyhow::Result<()> + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => {}
        }
        if stop.load(Ordering::SeqCst) {
            counters.skipped_after_stop.store(true, Ordering::SeqCst);
            break;
        }
        match catch_unwind(AssertUnwindSafe(|| on_tick())) {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::SeqCst);
                debug!(target: "autosave", "autosave tick complete");
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(target: "autosave", "autosave failed: {:#}", e);
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                counters.panicked.fetch_add(1, Ordering::SeqCst);
                error!(target: "autosave", "autosave tick panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: Arc<AtomicUsize>) -> impl Fn() -> anyhow::Result<()> + Send + 'static {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_before_first_tick_runs_nothing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut pulse = AutosavePulse::new();
        pulse.start(Duration::from_secs(60), counting(runs.clone())).unwrap();
        pulse.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!pulse.is_running());
        let stats = pulse.stats();
        assert_eq!(stats.completed, 0);
        assert!(stats.skipped_after_stop);
    }

    #[tokio::test]
    async fn double_start_is_refused() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut pulse = AutosavePulse::new();
        pulse.start(Duration::from_secs(60), counting(runs.clone())).unwrap();
        assert_eq!(
            pulse.start(Duration::from_secs(60), counting(runs.clone())),
            Err(PulseError::AlreadyRunning)
        );
        pulse.stop().await;
        pulse.stop().await;
        assert!(pulse.start(Duration::from_secs(60), counting(runs)).is_ok());
        pulse.stop().await;
    }

    #[tokio::test]
    async fn zero_interval_is_refused() {
        let mut pulse = AutosavePulse::new();
        assert_eq!(
            pulse.start(Duration::ZERO, || Ok(())),
            Err(PulseError::ZeroInterval)
        );
        assert!(!pulse.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failures_do_not_stop_the_schedule() {
        let mut pulse = AutosavePulse::new();
        pulse
            .start(Duration::from_millis(5), || Err(anyhow::anyhow!("disk full")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(pulse.is_running());
        pulse.stop().await;

        let stats = pulse.stats();
        assert!(stats.failed >= 2, "expected repeated failures, got {:?}", stats);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.panicked, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_ticks_are_counted_and_the_schedule_continues() {
        let mut pulse = AutosavePulse::new();
        pulse
            .start(Duration::from_millis(5), || panic!("save exploded"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(pulse.is_running());
        pulse.stop().await;

        let stats = pulse.stats();
        assert!(stats.panicked >= 2, "expected repeated panics, got {:?}", stats);
        assert_eq!(stats.failed, stats.panicked);
        assert_eq!(stats.completed, 0);
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
