//! Minute ticker driving crontab skills.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use sprocket_core::Event;
use sprocket_framework::Dispatcher;

/// Emits a timer event at the start of every minute.
///
/// Each tick runs on its own task so a slow crontab cannot delay the next
/// minute; the dispatcher guarantees a skill fires at most once per tick.
pub struct CronTicker {
    dispatcher: Arc<Dispatcher>,
}

impl CronTicker {
    /// Creates a ticker feeding `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// The first minute boundary strictly after `now`.
    pub fn next_minute(now: DateTime<Utc>) -> DateTime<Utc> {
        let minute = TimeDelta::minutes(1);
        now.duration_trunc(minute).unwrap_or(now) + minute
    }

    /// Dispatches one tick at `fire_time`.
    pub async fn tick(&self, fire_time: DateTime<Utc>) {
        let report = self.dispatcher.run(Event::timer(fire_time)).await;
        trace!(
            fire_time = %fire_time,
            fired = report.invocations.len(),
            "Cron tick dispatched"
        );
    }

    /// Ticks forever.
    pub async fn run(self) {
        let this = Arc::new(self);
        loop {
            let now = Utc::now();
            let next = Self::next_minute(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            debug!(fire_time = %next, "Cron tick");
            let ticker = Arc::clone(&this);
            tokio::spawn(async move { ticker.tick(next).await });
        }
    }

    /// Runs the ticker on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sprocket_core::SkillConfig;
    use sprocket_framework::{ExecutionSupervisor, InMemoryStats, Registrar, SkillRegistry};

    #[test]
    fn test_next_minute() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap();
        assert_eq!(
            CronTicker::next_minute(now),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 31, 0).unwrap()
        );

        let boundary = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        assert_eq!(
            CronTicker::next_minute(boundary),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_tick_fires_matching_crontabs() {
        async fn noop() {}

        let registry = Arc::new(SkillRegistry::new());
        let mut registrar = Registrar::new(registry.builder(), SkillConfig::new("ops"));
        registrar.crontab("30 12 * * *", noop);
        registrar.crontab("0 0 * * *", noop);
        registry.clear_and_rebuild(registrar.finish());

        let stats = Arc::new(InMemoryStats::new());
        let dispatcher = Dispatcher::new(registry, ExecutionSupervisor::new(stats.clone()));
        let ticker = CronTicker::new(Arc::new(dispatcher));

        let noon = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        ticker.tick(noon).await;
        ticker.tick(noon).await;
        assert_eq!(stats.get("crontabs_called"), 1);
    }
}
