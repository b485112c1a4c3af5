use parse_display::Display;
use thiserror::Error;
use tokio::{
    select,
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{link::Link, models, universe::FrameReceiver};

mod retry;
pub use retry::*;


#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Health of the link, as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum LinkStatus {
    #[display("healthy")]
    Healthy,
    #[display("retrying ({failures} consecutive failures)")]
    Retrying { failures: u32 },
    #[display("degraded ({failures} consecutive failures): {last_error}")]
    Degraded { failures: u32, last_error: String },
    #[display("stopped")]
    Stopped,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::Healthy
    }
}

impl LinkStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Counters returned when the scheduler stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[display("{frames_sent} frames sent, {failures} failures")]
pub struct SchedulerStats {
    pub frames_sent: u64,
    pub failures: u64,
}

/// Periodic transmission of the latest published frame
pub struct Scheduler {
    link: Link,
    frames: FrameReceiver,
    period: time::Duration,
    retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(config: &models::Scheduler, link: Link, frames: FrameReceiver) -> Self {
        let period = config.period();
        if period < link.frame_time() {
            warn!(
                link = %link.name(),
                period = ?period,
                frame_time = ?link.frame_time(),
                "refresh rate is higher than the link can sustain"
            );
        }

        Self {
            link,
            frames,
            period,
            retry: RetryPolicy::from(config),
        }
    }

    /// Start the transmission task
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());

        let join_handle = tokio::spawn(self.run(stop_rx, status_tx));

        SchedulerHandle {
            stop_tx,
            join_handle,
            status: status_rx,
        }
    }

    #[instrument(skip_all, fields(link = %self.link.name()))]
    async fn run(
        mut self,
        mut stop_rx: oneshot::Receiver<()>,
        status_tx: watch::Sender<LinkStatus>,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut failures = 0u32;

        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?self.period, "starting transmission");

        loop {
            // A dropped handle also stops the loop
            select! {
                biased;
                _ = &mut stop_rx => break,
                _ = interval.tick() => {},
            }

            // The latest committed frame, never a partial one
            let frame = self.frames.borrow_and_update().clone();

            match self.link.send(&frame).await {
                Ok(()) => {
                    stats.frames_sent += 1;

                    if failures > 0 {
                        info!(failures = %failures, "link recovered");
                        failures = 0;
                        status_tx.send_replace(LinkStatus::Healthy);
                    }
                }
                Err(error) => {
                    stats.failures += 1;
                    failures = failures.saturating_add(1);

                    if self.retry.is_degraded(failures) {
                        if failures == self.retry.max_consecutive_failures() {
                            error!(error = %error, failures = %failures, "link degraded");
                        } else {
                            debug!(error = %error, failures = %failures, "send failed");
                        }

                        status_tx.send_replace(LinkStatus::Degraded {
                            failures,
                            last_error: error.to_string(),
                        });
                    } else {
                        warn!(error = %error, failures = %failures, "send failed");
                        status_tx.send_replace(LinkStatus::Retrying { failures });
                    }

                    let delay = self.retry.delay(failures);
                    select! {
                        biased;
                        _ = &mut stop_rx => break,
                        _ = time::sleep(delay) => {},
                    }

                    interval.reset_immediately();
                }
            }
        }

        if let Err(error) = self.link.close().await {
            warn!(error = %error, "failed to close link");
        }

        status_tx.send_replace(LinkStatus::Stopped);
        info!(stats = %stats, "stopped transmission");

        stats
    }
}

/// Control side of a running [Scheduler]
///
/// Dropping the handle stops the transmission task.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<SchedulerStats>,
    status: watch::Receiver<LinkStatus>,
}

impl SchedulerHandle {
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Stop transmission and wait for the link to be closed
    pub async fn stop(self) -> Result<SchedulerStats, SchedulerError> {
        // ok: the task may have already exited
        self.stop_tx.send(()).ok();

        Ok(self.join_handle.await?)
    }
}
