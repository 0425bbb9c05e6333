//! Daily scheduled message.
//!
//! Wakes once a minute, and when the wall-clock time in the configured
//! timezone is exactly `hour:minute` sends one message to one group, then
//! sleeps until the same wall-clock time on the next calendar day. A minute
//! missed while the process was suspended is skipped, not caught up.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Days, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::DailyConfig, domain::Jid, messaging::port::SessionClient, Error, Result,
};

pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Source of the current instant (swapped out in tests).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct DailyScheduler {
    hour: u32,
    minute: u32,
    timezone: Tz,
    group: Jid,
    message: String,
    client: Arc<dyn SessionClient>,
    clock: Arc<dyn Clock>,
}

impl DailyScheduler {
    pub fn new(
        cfg: &DailyConfig,
        client: Arc<dyn SessionClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let timezone: Tz = cfg
            .timezone
            .parse()
            .map_err(|e| Error::Config(format!("unknown timezone {:?}: {e}", cfg.timezone)))?;
        let group = Jid::parse(&cfg.group)?;
        if cfg.hour > 23 || cfg.minute > 59 {
            return Err(Error::Config(format!(
                "invalid daily time {:02}:{:02}",
                cfg.hour, cfg.minute
            )));
        }

        Ok(Self {
            hour: cfg.hour,
            minute: cfg.minute,
            timezone,
            group,
            message: cfg.message.clone(),
            client,
            clock,
        })
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(
            at = %format!("{:02}:{:02}", self.hour, self.minute),
            timezone = %self.timezone,
            group = %self.group,
            "daily scheduler started"
        );
        loop {
            let wait = self.tick().await;
            tokio::select! {
              _ = cancel.cancelled() => break,
              _ = sleep(wait) => {}
            }
        }
        info!("daily scheduler stopped");
    }

    /// One check. Sends if the current minute matches and returns how long to
    /// sleep before the next check.
    pub async fn tick(&self) -> Duration {
        let now = self.clock.now().with_timezone(&self.timezone);
        if now.hour() != self.hour || now.minute() != self.minute {
            return CHECK_INTERVAL;
        }

        match self.client.send_text(&self.group, &self.message).await {
            Ok(()) => info!(group = %self.group, "daily message sent"),
            Err(e) => error!(group = %self.group, "daily message failed: {e}"),
        }

        let next = next_day_at(now, self.hour, self.minute);
        let wait = (next - now).to_std().unwrap_or(CHECK_INTERVAL);
        info!(next = %next, "waiting {}s until the next daily message", wait.as_secs());
        wait
    }
}

/// `hour:minute` on the calendar day after `now`, in `now`'s timezone.
///
/// If that wall-clock time does not exist (DST gap) the first valid instant
/// after it is used; if it is ambiguous the earlier one wins.
pub fn next_day_at(now: DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let Some(date) = now.date_naive().checked_add_days(Days::new(1)) else {
        return now + chrono::Duration::days(1);
    };
    let naive = date.and_time(time);

    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }
    // Skipped by a DST jump: step forward until the local time exists.
    (1..=180)
        .filter_map(|m| {
            tz.from_local_datetime(&(naive + chrono::Duration::minutes(m)))
                .earliest()
        })
        .next()
        .unwrap_or(now + chrono::Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingClient;
    use std::sync::Mutex;

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Arc<Self> {
            let local = tz.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap();
            Arc::new(Self(Mutex::new(local.with_timezone(&Utc))))
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn scheduler(
        cfg: &DailyConfig,
        clock: Arc<FixedClock>,
    ) -> (DailyScheduler, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::new());
        let s = DailyScheduler::new(cfg, client.clone(), clock).unwrap();
        (s, client)
    }

    #[tokio::test]
    async fn match_sends_once_and_waits_a_full_day() {
        let cfg = DailyConfig::default();
        let clock = FixedClock::at(chrono_tz::America::Sao_Paulo, 2026, 3, 10, 10, 15, 0);
        let (s, client) = scheduler(&cfg, clock.clone());

        let wait = s.tick().await;

        assert_eq!(
            client.sent(),
            vec![(cfg.group.clone(), cfg.message.clone())]
        );
        assert_eq!(wait, Duration::from_secs(24 * 3600));

        let wake = (clock.now() + chrono::Duration::from_std(wait).unwrap())
            .with_timezone(&chrono_tz::America::Sao_Paulo);
        assert_eq!((wake.hour(), wake.minute(), wake.second()), (10, 15, 0));
        assert_eq!(wake.date_naive().to_string(), "2026-03-11");
    }

    #[tokio::test]
    async fn mid_minute_match_wakes_at_the_top_of_tomorrows_minute() {
        let cfg = DailyConfig::default();
        let clock = FixedClock::at(chrono_tz::America::Sao_Paulo, 2026, 3, 10, 10, 15, 42);
        let (s, client) = scheduler(&cfg, clock);

        let wait = s.tick().await;

        assert_eq!(client.calls(), 1);
        assert_eq!(wait, Duration::from_secs(24 * 3600 - 42));
    }

    #[tokio::test]
    async fn other_minutes_only_recheck() {
        let cfg = DailyConfig::default();
        for (h, m) in [(10, 14), (10, 16), (22, 15)] {
            let clock = FixedClock::at(chrono_tz::America::Sao_Paulo, 2026, 3, 10, h, m, 0);
            let (s, client) = scheduler(&cfg, clock);
            assert_eq!(s.tick().await, CHECK_INTERVAL);
            assert_eq!(client.calls(), 0);
        }
    }

    #[tokio::test]
    async fn send_failure_is_not_retried() {
        let cfg = DailyConfig::default();
        let clock = FixedClock::at(chrono_tz::America::Sao_Paulo, 2026, 3, 10, 10, 15, 0);
        let client = Arc::new(RecordingClient::failing_every(1));
        let s = DailyScheduler::new(&cfg, client.clone(), clock).unwrap();

        assert_eq!(s.tick().await, Duration::from_secs(24 * 3600));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sends_once_then_stops_promptly_on_cancel() {
        let cfg = DailyConfig::default();
        let clock = FixedClock::at(chrono_tz::America::Sao_Paulo, 2026, 3, 10, 10, 15, 0);
        let (s, client) = scheduler(&cfg, clock);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(s.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn next_day_keeps_wall_clock_across_dst() {
        let tz = chrono_tz::America::New_York;
        // 2026-03-08 is the spring-forward day in New York.
        let now = tz.with_ymd_and_hms(2026, 3, 7, 10, 15, 0).unwrap();
        let next = next_day_at(now, 10, 15);
        assert_eq!((next.hour(), next.minute()), (10, 15));
        assert_eq!(next - now, chrono::Duration::hours(23));
    }

    #[test]
    fn next_day_skips_nonexistent_local_time() {
        let tz = chrono_tz::America::New_York;
        let now = tz.with_ymd_and_hms(2026, 3, 7, 2, 30, 0).unwrap();
        let next = next_day_at(now, 2, 30);
        assert_eq!(next.date_naive().to_string(), "2026-03-08");
        assert_eq!((next.hour(), next.minute()), (3, 0));
    }

    #[test]
    fn unknown_timezone_fails_only_construction() {
        let cfg = DailyConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..DailyConfig::default()
        };
        let client = Arc::new(RecordingClient::new());
        let err = DailyScheduler::new(&cfg, client, Arc::new(SystemClock))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
