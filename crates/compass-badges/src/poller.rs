// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic badge refresh.
//!
//! The poller is a single task: a pass starts only after the previous one
//! finished and the delay elapsed, so passes never overlap. Failed passes
//! leave the published counts untouched and stretch the delay.

use std::sync::Arc;
use std::time::Duration;

use compass_config::model::BadgesConfig;
use compass_core::types::{BadgeCounts, Viewer};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::aggregator::BadgeAggregator;

/// Timing of the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub jitter: Duration,
    pub max_backoff: Duration,
}

impl PollerSettings {
    /// Delay before the next pass after `failures` consecutive failed passes,
    /// without jitter. Doubles per failure, capped at `max_backoff`.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 2u32.saturating_pow(failures);
        self.interval
            .saturating_mul(factor)
            .min(self.max_backoff.max(self.interval))
    }

    fn next_delay(&self, failures: u32) -> Duration {
        let base = self.backoff(failures);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

impl From<&BadgesConfig> for PollerSettings {
    fn from(config: &BadgesConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Spawns refresh loops for a viewer.
pub struct BadgePoller {
    aggregator: Arc<BadgeAggregator>,
    settings: PollerSettings,
}

impl BadgePoller {
    pub fn new(aggregator: Arc<BadgeAggregator>, settings: PollerSettings) -> Self {
        Self {
            aggregator,
            settings,
        }
    }

    /// Starts refreshing badges for `viewer`.
    ///
    /// The first pass runs immediately. The loop stops when `cancel` is
    /// cancelled or the returned handle is dropped.
    pub fn spawn(&self, viewer: Viewer, cancel: &CancellationToken) -> BadgeHandle {
        let (tx, rx) = watch::channel(BadgeCounts::new());
        let token = cancel.child_token();
        let task = tokio::spawn(run(
            Arc::clone(&self.aggregator),
            self.settings,
            viewer,
            tx,
            token.clone(),
        ));
        BadgeHandle {
            counts: rx,
            task,
            guard: token.drop_guard(),
        }
    }
}

/// Live badge counts of one running poller.
pub struct BadgeHandle {
    counts: watch::Receiver<BadgeCounts>,
    task: JoinHandle<()>,
    guard: DropGuard,
}

impl BadgeHandle {
    /// Latest published counts.
    pub fn current(&self) -> BadgeCounts {
        self.counts.borrow().clone()
    }

    /// A receiver that wakes whenever the published counts change.
    pub fn subscribe(&self) -> watch::Receiver<BadgeCounts> {
        self.counts.clone()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        let BadgeHandle { task, guard, .. } = self;
        drop(guard);
        if let Err(e) = task.await {
            warn!(error = %e, "badge poller task ended abnormally");
        }
    }
}

async fn run(
    aggregator: Arc<BadgeAggregator>,
    settings: PollerSettings,
    viewer: Viewer,
    tx: watch::Sender<BadgeCounts>,
    cancel: CancellationToken,
) {
    info!(user_id = %viewer.user_id, role = %viewer.role, "badge poller started");
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = aggregator.compute(&viewer) => match result {
                Ok(counts) => {
                    failures = 0;
                    tx.send_if_modified(|current| {
                        if *current == counts {
                            false
                        } else {
                            *current = counts;
                            true
                        }
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        error = %e,
                        failures,
                        "badge refresh failed, keeping last known counts"
                    );
                }
            },
        }

        let delay = settings.next_delay(failures);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(user_id = %viewer.user_id, "badge poller stopped");
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use compass_core::types::{Counterpart, NavDestination, Role, UserId};
    use compass_test_utils::InMemoryBadgeSource;
    use tracing_test::traced_test;

    use super::*;

    fn settings() -> PollerSettings {
        PollerSettings {
            interval: Duration::from_secs(5),
            jitter: Duration::ZERO,
            max_backoff: Duration::from_secs(60),
        }
    }

    async fn seeded_source() -> (Arc<InMemoryBadgeSource>, Viewer) {
        let source = Arc::new(InMemoryBadgeSource::new());
        let (stu, coach) = (UserId::new("stu"), UserId::new("coach"));
        source
            .add_counterpart(
                &stu,
                Counterpart {
                    user_id: coach.clone(),
                    role: Role::Counselor,
                },
            )
            .await;
        source
            .send(
                &coach,
                Role::Counselor,
                &stu,
                "see me",
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            )
            .await;
        (source, Viewer::new(stu, Role::Student, None))
    }

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let s = settings();
        assert_eq!(s.backoff(0), Duration::from_secs(5));
        assert_eq!(s.backoff(1), Duration::from_secs(10));
        assert_eq!(s.backoff(3), Duration::from_secs(40));
        assert_eq!(s.backoff(4), Duration::from_secs(60));
        assert_eq!(s.backoff(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let s = PollerSettings {
            jitter: Duration::from_millis(500),
            ..settings()
        };
        for _ in 0..50 {
            let d = s.next_delay(0);
            assert!(d >= Duration::from_secs(5));
            assert!(d <= Duration::from_millis(5_500));
        }
    }

    #[test]
    fn settings_from_config() {
        let s = PollerSettings::from(&BadgesConfig::default());
        assert_eq!(s.interval, Duration::from_millis(5_000));
        assert_eq!(s.max_backoff, Duration::from_millis(60_000));
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_first_pass() {
        let (source, viewer) = seeded_source().await;
        let poller = BadgePoller::new(Arc::new(BadgeAggregator::new(source)), settings());
        let cancel = CancellationToken::new();
        let handle = poller.spawn(viewer, &cancel);

        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(handle.current().get(NavDestination::Messages), Some(1));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn failure_keeps_last_known_good() {
        let (source, viewer) = seeded_source().await;
        let poller = BadgePoller::new(
            Arc::new(BadgeAggregator::new(source.clone())),
            settings(),
        );
        let cancel = CancellationToken::new();
        let handle = poller.spawn(viewer, &cancel);
        handle.subscribe().changed().await.unwrap();

        source.fail_with("backend down").await;
        let before = source.passes();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(source.passes() > before);
        assert_eq!(handle.current().get(NavDestination::Messages), Some(1));
        assert!(logs_contain("badge refresh failed"));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancel_stops_loop() {
        let (source, viewer) = seeded_source().await;
        let poller = BadgePoller::new(
            Arc::new(BadgeAggregator::new(source.clone())),
            settings(),
        );
        let cancel = CancellationToken::new();
        let handle = poller.spawn(viewer, &cancel);
        handle.subscribe().changed().await.unwrap();

        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let passes = source.passes();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.passes(), passes);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_loop() {
        let (source, viewer) = seeded_source().await;
        let poller = BadgePoller::new(
            Arc::new(BadgeAggregator::new(source.clone())),
            settings(),
        );
        let cancel = CancellationToken::new();
        let handle = poller.spawn(viewer, &cancel);
        handle.subscribe().changed().await.unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let passes = source.passes();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.passes(), passes);
        assert!(!cancel.is_cancelled());
    }
}
