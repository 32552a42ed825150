// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One aggregation pass over the badge data source.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use compass_config::model::BadgesConfig;
use compass_core::types::{
    BadgeCounts, ChatMessage, ConversationKey, NavDestination, PendingFilter, ReadMarker, Role,
    UserId, Viewer,
};
use compass_core::{BadgeSource, CompassError};
use tracing::debug;

/// Computes badge counts for a viewer from a [`BadgeSource`].
///
/// A pass is all-or-nothing: the first failing query aborts it and the error
/// is returned unchanged.
pub struct BadgeAggregator {
    source: Arc<dyn BadgeSource>,
    read_marker_roles: HashSet<Role>,
}

impl BadgeAggregator {
    /// Aggregator where every role honours read markers.
    pub fn new(source: Arc<dyn BadgeSource>) -> Self {
        Self {
            source,
            read_marker_roles: [Role::Student, Role::Counselor, Role::Teacher, Role::Parent]
                .into_iter()
                .collect(),
        }
    }

    pub fn from_config(source: Arc<dyn BadgeSource>, config: &BadgesConfig) -> Self {
        Self::new(source).with_read_marker_roles(config.read_marker_roles.iter().copied())
    }

    /// Restricts read-marker lookups to `roles`. Viewers with other roles fall
    /// back to the trailing-edge rule.
    pub fn with_read_marker_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.read_marker_roles = roles.into_iter().collect();
        self
    }

    /// Runs one full pass: unread messages plus every pending destination.
    pub async fn compute(&self, viewer: &Viewer) -> Result<BadgeCounts, CompassError> {
        let mut counts = self.pending_counts(viewer).await?;
        counts.set(NavDestination::Messages, self.unread_messages(viewer).await?);
        debug!(
            user_id = %viewer.user_id,
            role = %viewer.role,
            total = counts.total(),
            "badge pass complete"
        );
        Ok(counts)
    }

    /// Total unread counterpart messages across the viewer's threads.
    pub async fn unread_messages(&self, viewer: &Viewer) -> Result<u32, CompassError> {
        let counterparts = self.source.counterparts(viewer).await?;
        let keys: Vec<ConversationKey> = counterparts
            .iter()
            .map(|c| ConversationKey::new(&viewer.user_id, &c.user_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let messages = self.source.messages_for(&keys).await?;
        let markers = if self.read_marker_roles.contains(&viewer.role) {
            self.source.read_markers(&viewer.user_id, &keys).await?
        } else {
            Default::default()
        };

        let mut total = 0u32;
        for key in &keys {
            let thread: Vec<&ChatMessage> = messages
                .iter()
                .filter(|m| &m.conversation_key == key)
                .collect();
            total = total.saturating_add(count_unread(
                &viewer.user_id,
                &thread,
                markers.get(key),
            ));
        }
        Ok(total)
    }

    /// Counts for every pending-work destination of the viewer's role.
    pub async fn pending_counts(&self, viewer: &Viewer) -> Result<BadgeCounts, CompassError> {
        let mut counts = BadgeCounts::new();
        for (destination, filters) in pending_filters(viewer) {
            let mut sum = 0u32;
            for filter in &filters {
                sum = sum.saturating_add(self.source.count_pending(filter).await?);
            }
            counts.set(destination, sum);
        }
        Ok(counts)
    }
}

/// Unread counterpart messages in one thread.
///
/// With a read marker, counterpart messages newer than the marker are unread.
/// Without one, counterpart messages strictly after the reader's latest own
/// message are unread; if the reader never wrote, all of them are.
pub fn count_unread(
    reader: &UserId,
    thread: &[&ChatMessage],
    marker: Option<&ReadMarker>,
) -> u32 {
    let cutoff = match marker {
        Some(marker) => Some(marker.last_read_at),
        None => thread
            .iter()
            .filter(|m| &m.sender_id == reader)
            .map(|m| m.created_at)
            .max(),
    };

    let unread = thread
        .iter()
        .filter(|m| &m.sender_id != reader)
        .filter(|m| cutoff.is_none_or(|c| m.created_at > c))
        .count();
    u32::try_from(unread).unwrap_or(u32::MAX)
}

/// Pending-work queries per destination for the viewer's role.
///
/// School-scoped destinations are skipped when the viewer has no school.
pub fn pending_filters(viewer: &Viewer) -> Vec<(NavDestination, Vec<PendingFilter>)> {
    let me = viewer.user_id.clone();
    let mut out = Vec::new();
    match viewer.role {
        Role::Counselor => {
            if let Some(school) = &viewer.school_id {
                out.push((
                    NavDestination::Approvals,
                    vec![
                        PendingFilter::UserApprovals {
                            school_id: school.clone(),
                            role: Role::Student,
                        },
                        PendingFilter::UserApprovals {
                            school_id: school.clone(),
                            role: Role::Parent,
                        },
                    ],
                ));
            }
            out.push((
                NavDestination::Tasks,
                vec![PendingFilter::AssignedTasks {
                    assignee_id: me.clone(),
                }],
            ));
            if let Some(school) = &viewer.school_id {
                out.push((
                    NavDestination::Referrals,
                    vec![PendingFilter::SchoolReferrals {
                        school_id: school.clone(),
                    }],
                ));
            }
            out.push((
                NavDestination::Meetings,
                vec![PendingFilter::MeetingRequests { counselor_id: me }],
            ));
        }
        Role::Teacher => out.push((
            NavDestination::Referrals,
            vec![PendingFilter::SubmittedReferrals { submitted_by: me }],
        )),
        Role::Student => out.push((
            NavDestination::Meetings,
            vec![PendingFilter::MeetingResponses { student_id: me }],
        )),
        Role::Parent => {}
    }
    out
}
