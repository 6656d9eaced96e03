use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use ramble_core::TaskPriority;
use ramble_queue::TaskQueueRunner;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct ScheduledJob {
    name: &'static str,
    task_type: &'static str,
    schedule: Schedule,
}

/// Fires `decay_claims` and `run_observer` tasks onto the queue on a cron
/// schedule, enqueuing a task type rather than running a prompt directly.
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    queue: Arc<TaskQueueRunner>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(decay_interval_secs: u64, observer_interval_secs: u64, queue: Arc<TaskQueueRunner>, cancel: CancellationToken) -> Self {
        let mut jobs = Vec::new();
        for (name, task_type, secs) in [
            ("decay", "decay_claims", decay_interval_secs),
            ("observers", "run_observer", observer_interval_secs),
        ] {
            let expr = interval_to_cron_expr(secs);
            match Schedule::from_str(&expr) {
                Ok(schedule) => {
                    jobs.push(ScheduledJob { name, task_type, schedule });
                    info!(job = name, expr = %expr, "scheduled job registered");
                }
                Err(e) => warn!(job = name, expr = %expr, error = %e, "invalid cron expression, job disabled"),
            }
        }
        Self { jobs, queue, cancel }
    }

    /// Runs until cancelled, always sleeping until the single
    /// soonest-firing job across the whole set.
    pub async fn run(&self) {
        if self.jobs.is_empty() {
            self.cancel.cancelled().await;
            return;
        }
        info!(count = self.jobs.len(), "scheduler started");
        loop {
            let now = Utc::now();
            let mut next_fire: Option<(chrono::DateTime<Utc>, &ScheduledJob)> = None;
            for job in &self.jobs {
                if let Some(next) = job.schedule.upcoming(Utc).next() {
                    let sooner = next_fire.as_ref().map(|(t, _)| next < *t).unwrap_or(true);
                    if sooner {
                        next_fire = Some((next, job));
                    }
                }
            }
            let Some((fire_at, job)) = next_fire else {
                self.cancel.cancelled().await;
                break;
            };
            let delay = (fire_at - now).to_std().unwrap_or(Duration::from_secs(1));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    info!(job = job.name, "firing scheduled task");
                    let payload = if job.task_type == "run_observer" {
                        json!({ "session_id": null })
                    } else {
                        json!({})
                    };
                    if let Err(e) = self.queue.enqueue(job.task_type, payload, TaskPriority::Low, None) {
                        warn!(job = job.name, error = %e, "failed to enqueue scheduled task");
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }
}

/// Picks the coarsest cron field that divides `secs` evenly, falling back
/// to hourly for values that don't fit cleanly into seconds/minutes/hours
/// step syntax.
pub fn interval_to_cron_expr(secs: u64) -> String {
    let secs = secs.max(1);
    if secs < 60 {
        format!("*/{secs} * * * * *")
    } else if secs % 3600 == 0 {
        format!("0 0 */{} * * *", secs / 3600)
    } else if secs % 60 == 0 && secs / 60 < 60 {
        format!("0 */{} * * * *", secs / 60)
    } else {
        "0 0 * * * *".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_interval_becomes_top_of_hour_expr() {
        assert_eq!(interval_to_cron_expr(3600), "0 0 */1 * * *");
    }

    #[test]
    fn sub_minute_interval_uses_seconds_step() {
        assert_eq!(interval_to_cron_expr(15), "*/15 * * * * *");
    }

    #[test]
    fn odd_interval_falls_back_to_hourly() {
        assert_eq!(interval_to_cron_expr(97), "0 0 * * * *");
    }
}
