//! Per-user, per-day attendance ledger types.
//!
//! Status only ever advances `NotCheckedIn -> CheckedIn -> CheckedOut`.
//! `NotCheckedIn` is never persisted: it is the implicit state of a
//! (user, date) pair that has no record yet.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::geofence::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::NotCheckedIn => "not_checked_in",
            AttendanceStatus::CheckedIn => "checked_in",
            AttendanceStatus::CheckedOut => "checked_out",
        }
    }

    /// The only state this one may advance to.
    pub fn successor(self) -> Option<Self> {
        match self {
            AttendanceStatus::NotCheckedIn => Some(AttendanceStatus::CheckedIn),
            AttendanceStatus::CheckedIn => Some(AttendanceStatus::CheckedOut),
            AttendanceStatus::CheckedOut => None,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_checked_in" => Ok(AttendanceStatus::NotCheckedIn),
            "checked_in" => Ok(AttendanceStatus::CheckedIn),
            "checked_out" => Ok(AttendanceStatus::CheckedOut),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// One row of the attendance ledger, keyed by (user_id, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_in_location: Option<GeoPoint>,
    pub check_out_location: Option<GeoPoint>,
    /// Match percentage recorded at check-in.
    pub face_match_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Today's state for one user: the record if one exists, otherwise the
/// implicit `not_checked_in` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStatus {
    pub status: AttendanceStatus,
    pub attendance: Option<AttendanceRecord>,
}

impl TodayStatus {
    pub fn from_record(record: Option<AttendanceRecord>) -> Self {
        match record {
            Some(r) => Self {
                status: r.status,
                attendance: Some(r),
            },
            None => Self {
                status: AttendanceStatus::NotCheckedIn,
                attendance: None,
            },
        }
    }
}

/// Administrative filters for listing all records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
    /// Case-insensitive substring of the user's name.
    pub user_name: Option<String>,
    /// Exact calendar date.
    pub date: Option<NaiveDate>,
}

/// Calendar date (UTC) that an instant is booked under.
pub fn attendance_date(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_is_monotonic() {
        use AttendanceStatus::*;
        assert_eq!(NotCheckedIn.successor(), Some(CheckedIn));
        assert_eq!(CheckedIn.successor(), Some(CheckedOut));
        assert_eq!(CheckedOut.successor(), None);
    }

    #[test]
    fn test_status_str_round_trip() {
        use AttendanceStatus::*;
        for s in [NotCheckedIn, CheckedIn, CheckedOut] {
            assert_eq!(s.as_str().parse::<AttendanceStatus>().unwrap(), s);
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{}\"", s.as_str()));
        }
        assert!("late".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn test_today_status_sentinel() {
        let t = TodayStatus::from_record(None);
        assert_eq!(t.status, AttendanceStatus::NotCheckedIn);
        assert!(t.attendance.is_none());
    }

    #[test]
    fn test_attendance_date_is_utc() {
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        assert_eq!(attendance_date(late), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            parse_date("01/01/2024"),
            Err(ValidationError::InvalidDate("01/01/2024".into()))
        );
    }
}
