// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Navigation badges for Compass.
//!
//! [`BadgeAggregator`] computes one pass of unread-message and pending-work
//! counts for a viewer. [`BadgePoller`] repeats that pass on a jittered
//! interval and publishes the latest good result through a watch channel.

pub mod aggregator;
pub mod poller;

pub use aggregator::{BadgeAggregator, count_unread, pending_filters};
pub use poller::{BadgeHandle, BadgePoller, PollerSettings};
