// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tasks, referrals and meeting requests, plus pending-status counts.

use compass_core::{CompassError, PendingFilter, UserId};
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::models::{
    MeetingRequestRecord, MeetingStatus, ReferralRecord, ReferralStatus, TaskRecord, TaskStatus,
};

pub async fn insert_task(db: &Database, task: &TaskRecord) -> Result<(), CompassError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, assignee_id, title, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task.id,
                    task.assignee_id.as_str(),
                    task.title,
                    task.status.to_string(),
                    task.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_task_status(
    db: &Database,
    id: &str,
    status: TaskStatus,
) -> Result<bool, CompassError> {
    update_status(db, "tasks", id, status.to_string()).await
}

pub async fn insert_referral(db: &Database, referral: &ReferralRecord) -> Result<(), CompassError> {
    let referral = referral.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO referrals (id, school_id, submitted_by, student_id, reason, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    referral.id,
                    referral.school_id.as_str(),
                    referral.submitted_by.as_str(),
                    referral.student_id.as_str(),
                    referral.reason,
                    referral.status.to_string(),
                    referral.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_referral_status(
    db: &Database,
    id: &str,
    status: ReferralStatus,
) -> Result<bool, CompassError> {
    update_status(db, "referrals", id, status.to_string()).await
}

pub async fn insert_meeting_request(
    db: &Database,
    meeting: &MeetingRequestRecord,
) -> Result<(), CompassError> {
    let meeting = meeting.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO meeting_requests (id, student_id, counselor_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    meeting.id,
                    meeting.student_id.as_str(),
                    meeting.counselor_id.as_str(),
                    meeting.status.to_string(),
                    meeting.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_meeting_status(
    db: &Database,
    id: &str,
    status: MeetingStatus,
) -> Result<bool, CompassError> {
    update_status(db, "meeting_requests", id, status.to_string()).await
}

/// `table` is always one of this module's constants, never caller input.
async fn update_status(
    db: &Database,
    table: &'static str,
    id: &str,
    status: String,
) -> Result<bool, CompassError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!("UPDATE {table} SET status = ?1 WHERE id = ?2"),
                params![status, id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// SQL and bound values for a pending-count filter.
fn count_query(filter: &PendingFilter) -> (&'static str, Vec<String>) {
    match filter {
        PendingFilter::UserApprovals { school_id, role } => (
            "SELECT COUNT(*) FROM users
             WHERE school_id = ?1 AND role = ?2 AND approval_status = 'pending'",
            vec![school_id.as_str().to_string(), role.to_string()],
        ),
        PendingFilter::AssignedTasks { assignee_id } => (
            "SELECT COUNT(*) FROM tasks WHERE assignee_id = ?1 AND status = 'pending'",
            vec![assignee_id.as_str().to_string()],
        ),
        PendingFilter::SchoolReferrals { school_id } => (
            "SELECT COUNT(*) FROM referrals WHERE school_id = ?1 AND status = 'pending'",
            vec![school_id.as_str().to_string()],
        ),
        PendingFilter::SubmittedReferrals { submitted_by } => (
            "SELECT COUNT(*) FROM referrals WHERE submitted_by = ?1 AND status = 'pending'",
            vec![submitted_by.as_str().to_string()],
        ),
        PendingFilter::MeetingRequests { counselor_id } => (
            "SELECT COUNT(*) FROM meeting_requests
             WHERE counselor_id = ?1 AND status = 'requested'",
            vec![counselor_id.as_str().to_string()],
        ),
        PendingFilter::MeetingResponses { student_id } => (
            "SELECT COUNT(*) FROM meeting_requests
             WHERE student_id = ?1 AND status = 'proposed'",
            vec![student_id.as_str().to_string()],
        ),
    }
}

/// Number of rows matching `filter`.
pub async fn count_pending(db: &Database, filter: &PendingFilter) -> Result<u32, CompassError> {
    let (sql, values) = count_query(filter);
    db.connection()
        .call(move |conn| {
            let count: u32 = conn.query_row(
                sql,
                rusqlite::params_from_iter(values.iter()),
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Pending tasks of one assignee, oldest first.
pub async fn pending_tasks(db: &Database, assignee: &UserId) -> Result<Vec<TaskRecord>, CompassError> {
    let assignee = assignee.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at FROM tasks
                 WHERE assignee_id = ?1 AND status = 'pending'
                 ORDER BY created_at ASC",
            )?;
            let tasks = stmt
                .query_map(params![assignee.as_str()], |row| {
                    Ok(TaskRecord {
                        id: row.get(0)?,
                        assignee_id: assignee.clone(),
                        title: row.get(1)?,
                        status: TaskStatus::Pending,
                        created_at: super::ts_from_ms(2, row.get(2)?)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}
