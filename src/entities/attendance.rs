//! Attendance record - one check-in of a student to a course. Append-only.

use super::{ids, timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(deserialize_with = "ids::one")]
    pub student_id: i64,
    #[serde(deserialize_with = "ids::one")]
    pub course_id: i64,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
}
