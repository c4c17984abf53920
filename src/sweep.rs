//! Periodic job that rejects reports stuck in Revisado: if an operator
//! reviewed a report but nobody accepted or declined it within the
//! threshold, the sweep declines it. Owned by main as an explicit handle
//! rather than a process-wide timer, with an injectable clock for tests.

use crate::error::CoreError;
use crate::models::report::Report;

use chrono::Utc;
use mongodb::bson::DateTime;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub struct StalenessSweep {
    pub interval: Duration,
    pub threshold: chrono::Duration,
}

pub struct SweepHandle {
    handle: actix_web::rt::task::JoinHandle<()>,
}

impl Default for StalenessSweep {
    fn default() -> Self {
        StalenessSweep {
            interval: Duration::from_secs(3600),
            threshold: chrono::Duration::hours(24),
        }
    }
}

impl StalenessSweep {
    /// Reports whose `updated_at` is at or before this instant are stale.
    pub fn cutoff(&self, now: chrono::DateTime<Utc>) -> DateTime {
        DateTime::from_millis((now - self.threshold).timestamp_millis())
    }
    /// One sweep pass. Selection is by current status, so a second pass in
    /// the same interval matches nothing.
    pub async fn run_once(&self, now: chrono::DateTime<Utc>) -> Result<u64, CoreError> {
        let rejected = Report::reject_stale(self.cutoff(now)).await?;
        if rejected > 0 {
            info!(rejected, "auto-rejected stale reviewed reports");
        }
        Ok(rejected)
    }
    pub fn spawn(self) -> SweepHandle {
        let handle = actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once(Utc::now()).await {
                    warn!(error = %err, "staleness sweep pass failed");
                }
            }
        });
        SweepHandle { handle }
    }
}

impl SweepHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn defaults_are_hourly_with_a_day_threshold() {
        let sweep = StalenessSweep::default();
        assert_eq!(sweep.interval, Duration::from_secs(3600));
        assert_eq!(sweep.threshold, chrono::Duration::hours(24));
    }

    #[test]
    fn cutoff_is_threshold_before_now() {
        let sweep = StalenessSweep::default();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let cutoff = sweep.cutoff(now);
        assert_eq!(
            cutoff.timestamp_millis(),
            (now - chrono::Duration::hours(24)).timestamp_millis()
        );
    }

    #[test]
    fn shorter_threshold_moves_cutoff_forward() {
        let strict = StalenessSweep {
            interval: Duration::from_secs(60),
            threshold: chrono::Duration::hours(2),
        };
        let lax = StalenessSweep::default();
        let now = Utc::now();
        assert!(strict.cutoff(now).timestamp_millis() > lax.cutoff(now).timestamp_millis());
    }
}
