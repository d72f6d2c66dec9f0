use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use transit_core::repository::{ExpiredHoldSweeper, SweepReport};

type ReportHook = Arc<dyn Fn(&SweepReport) + Send + Sync>;

/// Periodically reclaims seats from expired holds.
pub struct CleanupScheduler {
    sweeper: Arc<dyn ExpiredHoldSweeper>,
    interval: Duration,
    on_report: Option<ReportHook>,
}

/// Owned by whoever started the scheduler; `stop` ends the loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupScheduler {
    pub fn new(sweeper: Arc<dyn ExpiredHoldSweeper>, interval: Duration) -> Self {
        Self { sweeper, interval, on_report: None }
    }

    /// Called after every successful sweep, e.g. to feed metrics.
    pub fn on_report(mut self, hook: impl Fn(&SweepReport) + Send + Sync + 'static) -> Self {
        self.on_report = Some(Arc::new(hook));
        self
    }

    pub fn start(self) -> SchedulerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let CleanupScheduler { sweeper, interval, on_report } = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow sweep delays the next tick instead of bunching them up.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "cleanup scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sweeper.sweep_expired(Utc::now()).await {
                            Ok(report) => {
                                if report.holds_reclaimed > 0 {
                                    info!(holds = report.holds_reclaimed, trips = report.trips_touched, "reclaimed expired holds");
                                } else {
                                    debug!("no expired holds");
                                }
                                if let Some(hook) = &on_report {
                                    hook(&report);
                                }
                            }
                            Err(e) => error!(error = %e, code = e.code(), "hold cleanup failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("cleanup scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

impl SchedulerHandle {
    /// Signals the loop and waits for it. An in-flight sweep finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "cleanup scheduler task panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
