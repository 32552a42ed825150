// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `compass badges`: navigation badge counts for one user.

use std::sync::Arc;

use compass_badges::{BadgeAggregator, BadgePoller, PollerSettings};
use compass_config::CompassConfig;
use compass_core::{BadgeCounts, CompassError, PluginAdapter, UserId, Viewer};
use compass_storage::SqliteStore;
use compass_storage::queries::directory;

use crate::shutdown::install_signal_handler;

/// Looks `user` up in the directory and builds their viewer identity.
async fn viewer_for(store: &SqliteStore, user: &str) -> Result<Viewer, CompassError> {
    let record = directory::get_user(store.database(), &UserId::new(user))
        .await?
        .ok_or_else(|| CompassError::InvalidInput(format!("unknown user: {user}")))?;
    Ok(Viewer::new(record.id, record.role, record.school_id))
}

fn print_counts(counts: &BadgeCounts) -> Result<(), CompassError> {
    let json = serde_json::to_string(counts)
        .map_err(|e| CompassError::Internal(format!("failed to encode badge counts: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Prints the user's badge counts as JSON. With `watch`, keeps polling and
/// prints a new line whenever the counts change, until interrupted.
pub async fn run_badges(config: &CompassConfig, user: &str, watch: bool) -> Result<(), CompassError> {
    let store = SqliteStore::open(&config.storage).await?;
    let viewer = viewer_for(&store, user).await?;
    let aggregator = Arc::new(BadgeAggregator::from_config(
        Arc::new(store.clone()),
        &config.badges,
    ));

    let mut last = aggregator.compute(&viewer).await?;
    print_counts(&last)?;

    if watch {
        let shutdown = install_signal_handler();
        let poller = BadgePoller::new(aggregator, PollerSettings::from(&config.badges));
        let handle = poller.spawn(viewer, &shutdown);
        let mut updates = handle.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let counts = updates.borrow_and_update().clone();
                    if counts != last {
                        print_counts(&counts)?;
                        last = counts;
                    }
                }
            }
        }
        handle.shutdown().await;
    }

    store.shutdown().await
}
