use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::RefreshRunner;

/// Background refresh scheduler. Owns the recurring task that drives one
/// refresh cycle per interval; the runner's own cycle lock keeps a manual
/// refresh and a timer tick from overlapping.
#[derive(Clone)]
pub struct RefreshScheduler {
    runner: Arc<RefreshRunner>,
    tasks: Arc<RwLock<Vec<JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(runner: Arc<RefreshRunner>) -> Self {
        Self {
            runner,
            tasks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Start the recurring refresh task.
    pub async fn start(&self, interval_secs: u64) {
        log::info!(
            "Starting refresh scheduler - interval: {}s",
            interval_secs
        );
        self.spawn_refresh_task(interval_secs).await;
    }

    /// Restart the recurring task with a new interval (settings change).
    pub async fn reload(&self, interval_secs: u64) {
        log::info!("Reloading refresh scheduler - interval: {}s", interval_secs);
        self.stop_all_tasks().await;
        self.spawn_refresh_task(interval_secs).await;
    }

    async fn spawn_refresh_task(&self, interval_secs: u64) {
        let runner = self.runner.clone();

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            // A tick that lands while a cycle is still running is dropped
            // rather than queued
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match runner.run_cycle().await {
                    Ok(report) => {
                        if report.triggered > 0 || report.exited > 0 {
                            log::info!(
                                "Scheduled refresh: {} activated, {} closed",
                                report.triggered,
                                report.exited
                            );
                        }
                    }
                    Err(e) => {
                        log::error!("Scheduled refresh failed: {}", e);
                    }
                }
            }
        });

        let mut tasks = self.tasks.write().await;
        tasks.push(handle);
    }

    async fn stop_all_tasks(&self) {
        let mut tasks = self.tasks.write().await;
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    /// Stop the scheduler.
    pub async fn stop(&self) {
        log::info!("Stopping refresh scheduler");
        self.stop_all_tasks().await;
    }
}
