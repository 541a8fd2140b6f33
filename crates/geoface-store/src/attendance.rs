//! Attendance ledger persistence.
//!
//! Both transitions are single conditional statements executed inside one
//! connection call: check-in is an insert guarded by the `(user_id, date)`
//! unique key, check-out an update guarded by `status = 'checked_in'`. Of
//! two racing calls for the same key exactly one changes a row.

use chrono::{DateTime, NaiveDate, Utc};
use geoface_core::{AttendanceRecord, AttendanceStatus, GeoPoint, RecordFilter};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::{
    parse_date, parse_enum, parse_opt_timestamp, parse_timestamp, parse_uuid, Store, DATE_FORMAT,
    UNICODE_LOWER,
};
use crate::error::Result;

/// A verified check-in ready to be booked.
#[derive(Debug, Clone)]
pub struct CheckIn {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub time: DateTime<Utc>,
    pub location: GeoPoint,
    pub face_match_score: f64,
}

#[derive(Debug, Clone)]
pub struct CheckOut {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub time: DateTime<Utc>,
    pub location: GeoPoint,
}

/// Outcome of a conditional state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The row was written; carries the record as committed.
    Applied(AttendanceRecord),
    /// The guard failed; carries the status observed at that moment.
    Rejected(AttendanceStatus),
}

const RECORD_SELECT: &str = "SELECT a.id, a.user_id, u.name, u.email, a.date, a.status,
            a.check_in_time, a.check_out_time,
            a.check_in_lat, a.check_in_lon, a.check_out_lat, a.check_out_lon,
            a.face_match_score, a.created_at
     FROM attendance a
     JOIN users u ON u.id = a.user_id";

impl Store {
    pub async fn attendance_for(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let record = self
            .conn()
            .call(move |conn| Ok(select_record(conn, user_id, date)?))
            .await?;
        Ok(record)
    }

    /// Create today's record as `checked_in` unless one already exists.
    pub async fn record_check_in(&self, check_in: CheckIn) -> Result<Transition> {
        let outcome = self
            .conn()
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO attendance
                        (id, user_id, date, status, check_in_time, check_in_lat, check_in_lon,
                         face_match_score, created_at)
                     VALUES (?1, ?2, ?3, 'checked_in', ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(user_id, date) DO NOTHING",
                    params![
                        Uuid::new_v4().to_string(),
                        check_in.user_id.to_string(),
                        check_in.date.format(DATE_FORMAT).to_string(),
                        check_in.time.to_rfc3339(),
                        check_in.location.latitude,
                        check_in.location.longitude,
                        check_in.face_match_score,
                        check_in.time.to_rfc3339(),
                    ],
                )?;
                let current = select_record(conn, check_in.user_id, check_in.date)?;
                Ok(resolve(inserted, current))
            })
            .await?;
        Ok(outcome)
    }

    /// Advance today's record from `checked_in` to `checked_out`.
    pub async fn record_check_out(&self, check_out: CheckOut) -> Result<Transition> {
        let outcome = self
            .conn()
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE attendance
                     SET status = 'checked_out',
                         check_out_time = ?1,
                         check_out_lat = ?2,
                         check_out_lon = ?3
                     WHERE user_id = ?4 AND date = ?5 AND status = 'checked_in'",
                    params![
                        check_out.time.to_rfc3339(),
                        check_out.location.latitude,
                        check_out.location.longitude,
                        check_out.user_id.to_string(),
                        check_out.date.format(DATE_FORMAT).to_string(),
                    ],
                )?;
                let current = select_record(conn, check_out.user_id, check_out.date)?;
                Ok(resolve(updated, current))
            })
            .await?;
        Ok(outcome)
    }

    /// A user's own records, newest date first.
    pub async fn history(&self, user_id: Uuid, limit: u32) -> Result<Vec<AttendanceRecord>> {
        let records = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{RECORD_SELECT} WHERE a.user_id = ?1 ORDER BY a.date DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![user_id.to_string(), limit], row_to_record)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(records)
    }

    /// Records across all users, optionally narrowed by case-insensitive
    /// name substring and exact date.
    pub async fn all_records(
        &self,
        filter: RecordFilter,
        limit: u32,
    ) -> Result<Vec<AttendanceRecord>> {
        let name = filter
            .user_name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());
        let date = filter.date.map(|d| d.format(DATE_FORMAT).to_string());

        let records = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{RECORD_SELECT}
                     WHERE (?1 IS NULL OR instr({UNICODE_LOWER}(u.name), ?1) > 0)
                       AND (?2 IS NULL OR a.date = ?2)
                     ORDER BY a.date DESC, a.check_in_time ASC
                     LIMIT ?3"
                ))?;
                let rows = stmt.query_map(params![name, date, limit], row_to_record)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(records)
    }
}

fn resolve(changed: usize, current: Option<AttendanceRecord>) -> Transition {
    match current {
        Some(record) if changed == 1 => Transition::Applied(record),
        Some(record) => Transition::Rejected(record.status),
        None => Transition::Rejected(AttendanceStatus::NotCheckedIn),
    }
}

fn select_record(
    conn: &Connection,
    user_id: Uuid,
    date: NaiveDate,
) -> rusqlite::Result<Option<AttendanceRecord>> {
    conn.query_row(
        &format!("{RECORD_SELECT} WHERE a.user_id = ?1 AND a.date = ?2"),
        params![user_id.to_string(), date.format(DATE_FORMAT).to_string()],
        row_to_record,
    )
    .optional()
}

fn point(lat: Option<f64>, lon: Option<f64>) -> Option<GeoPoint> {
    match (lat, lon) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
        _ => None,
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let date: String = row.get(4)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(13)?;

    Ok(AttendanceRecord {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        user_name: row.get(2)?,
        user_email: row.get(3)?,
        date: parse_date(4, &date)?,
        status: parse_enum(5, &status)?,
        check_in_time: parse_opt_timestamp(6, row.get(6)?)?,
        check_out_time: parse_opt_timestamp(7, row.get(7)?)?,
        check_in_location: point(row.get(8)?, row.get(9)?),
        check_out_location: point(row.get(10)?, row.get(11)?),
        face_match_score: row.get(12)?,
        created_at: parse_timestamp(13, &created_at)?,
    })
}
