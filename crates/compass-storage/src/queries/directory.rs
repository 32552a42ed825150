// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Users, approvals and counselor assignments.

use chrono::Utc;
use compass_core::{CompassError, Counterpart, Role, SchoolId, UserId, Viewer};
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_text, ts_from_ms};
use crate::database::{map_tr_err, Database};
use crate::models::{ApprovalStatus, AssignmentStatus, UserRecord};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(1)?;
    let status: String = row.get(4)?;
    Ok(UserRecord {
        id: UserId::new(row.get::<_, String>(0)?),
        role: parse_text(1, &role)?,
        school_id: row.get::<_, Option<String>>(2)?.map(SchoolId::new),
        display_name: row.get(3)?,
        approval_status: parse_text(4, &status)?,
        created_at: ts_from_ms(5, row.get(5)?)?,
    })
}

/// Insert a user, or replace every field of an existing one.
pub async fn upsert_user(db: &Database, user: &UserRecord) -> Result<(), CompassError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, role, school_id, display_name, approval_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     role = excluded.role,
                     school_id = excluded.school_id,
                     display_name = excluded.display_name,
                     approval_status = excluded.approval_status",
                params![
                    user.id.as_str(),
                    user.role.to_string(),
                    user.school_id.as_ref().map(SchoolId::as_str),
                    user.display_name,
                    user.approval_status.to_string(),
                    user.created_at.timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_user(db: &Database, id: &UserId) -> Result<Option<UserRecord>, CompassError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, role, school_id, display_name, approval_status, created_at
                 FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Set a user's approval status. Returns whether the user exists.
pub async fn set_approval(
    db: &Database,
    id: &UserId,
    status: ApprovalStatus,
) -> Result<bool, CompassError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET approval_status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Link a student to a counselor, or update the link's status.
pub async fn assign_counselor(
    db: &Database,
    student_id: &UserId,
    counselor_id: &UserId,
    status: AssignmentStatus,
) -> Result<(), CompassError> {
    let student_id = student_id.as_str().to_string();
    let counselor_id = counselor_id.as_str().to_string();
    let now = Utc::now().timestamp_millis();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO counselor_assignments (student_id, counselor_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(student_id, counselor_id) DO UPDATE SET status = excluded.status",
                params![student_id, counselor_id, status.to_string(), now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Message counterparts of `viewer`.
///
/// Students see their approved assigned counselors. Parents and teachers see
/// approved counselors at their school. Counselors see approved students and
/// parents at their school. A viewer without a school sees no school-scoped
/// counterparts.
pub async fn counterparts(db: &Database, viewer: &Viewer) -> Result<Vec<Counterpart>, CompassError> {
    let viewer = viewer.clone();
    db.connection()
        .call(move |conn| {
            let school = viewer.school_id.as_ref().map(|s| s.as_str().to_string());
            let rows: Vec<(String, String)> = match (viewer.role, school) {
                (Role::Student, _) => {
                    let mut stmt = conn.prepare(
                        "SELECT u.id, u.role FROM counselor_assignments a
                         JOIN users u ON u.id = a.counselor_id
                         WHERE a.student_id = ?1 AND a.status = 'approved'
                           AND u.role = 'counselor' AND u.approval_status = 'approved'
                         ORDER BY u.id",
                    )?;
                    stmt.query_map(params![viewer.user_id.as_str()], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<_, _>>()?
                }
                (Role::Parent | Role::Teacher, Some(school)) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, role FROM users
                         WHERE school_id = ?1 AND role = 'counselor'
                           AND approval_status = 'approved'
                         ORDER BY id",
                    )?;
                    stmt.query_map(params![school], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<Result<_, _>>()?
                }
                (Role::Counselor, Some(school)) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, role FROM users
                         WHERE school_id = ?1 AND role IN ('student', 'parent')
                           AND approval_status = 'approved'
                         ORDER BY id",
                    )?;
                    stmt.query_map(params![school], |row| Ok((row.get(0)?, row.get(1)?)))?
                        .collect::<Result<_, _>>()?
                }
                (_, None) => Vec::new(),
            };

            rows.into_iter()
                .map(|(id, role)| {
                    Ok(Counterpart {
                        user_id: UserId::new(id),
                        role: parse_text(1, &role)?,
                    })
                })
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}
