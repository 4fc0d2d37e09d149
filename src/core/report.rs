//! Report output - CSV export of the attendance and finance logs, and plain
//! text student ID cards.
//!
//! CSV is written as a header row followed by one row per record in log order,
//! UTF-8, fields quoted only when they contain a comma, quote or line break.

use crate::entities::{AttendanceRecord, PaymentRecord, timestamp};
use crate::errors::{Error, Result};
use crate::storage::ensure_parent_dir;
use chrono::NaiveDateTime;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const FINANCE_HEADERS: [&str; 4] = ["student_id", "amount", "method", "timestamp"];
pub const ATTENDANCE_HEADERS: [&str; 3] = ["student_id", "course_id", "timestamp"];

/// Which log a report is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Finance,
    Attendance,
}

impl ReportKind {
    #[must_use]
    pub const fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Finance => &FINANCE_HEADERS,
            Self::Attendance => &ATTENDANCE_HEADERS,
        }
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "finance" => Ok(Self::Finance),
            "attendance" => Ok(Self::Attendance),
            _ => Err(Error::validation(
                "Unknown report type. Use 'finance' or 'attendance'.",
            )),
        }
    }
}

fn csv_quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line = fields
        .iter()
        .map(|f| csv_quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

/// Shortest text that reads back as exactly `amount`, written the way the
/// data file writes it (`120.0`, `0.001`).
fn amount_text(amount: f64) -> String {
    serde_json::Number::from_f64(amount).map_or_else(|| amount.to_string(), |n| n.to_string())
}

#[must_use]
pub fn finance_row(record: &PaymentRecord) -> [String; 4] {
    [
        record.student_id.to_string(),
        amount_text(record.amount),
        record.method.clone(),
        timestamp::format(&record.timestamp),
    ]
}

#[must_use]
pub fn attendance_row(record: &AttendanceRecord) -> [String; 3] {
    [
        record.student_id.to_string(),
        record.course_id.to_string(),
        timestamp::format(&record.timestamp),
    ]
}

/// Writes `headers` and `rows` to `dest`, replacing any existing file.
/// Returns the number of data rows written.
pub fn write_csv<R, S>(dest: &Path, headers: &[&str], rows: R) -> Result<usize>
where
    R: IntoIterator,
    R::Item: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut out = String::new();
    push_row(&mut out, headers);
    let mut count = 0;
    for row in rows {
        push_row(&mut out, row.as_ref());
        count += 1;
    }
    ensure_parent_dir(dest)?;
    std::fs::write(dest, out)?;
    Ok(count)
}

/// Writes `student_<id>_card.txt` into `folder` and returns its path.
pub fn write_student_card(
    folder: &Path,
    student_id: i64,
    name: &str,
    course_names: &[String],
    generated_at: NaiveDateTime,
) -> Result<PathBuf> {
    std::fs::create_dir_all(folder)?;
    let path = folder.join(format!("student_{student_id}_card.txt"));

    let courses = if course_names.is_empty() {
        "-".to_string()
    } else {
        course_names.join(", ")
    };
    let mut card = String::from("MSMS Student ID Card\n");
    // Writing to a String cannot fail.
    let _ = writeln!(card, "ID: {student_id}");
    let _ = writeln!(card, "Name: {name}");
    let _ = writeln!(card, "Courses: {courses}");
    let _ = write!(card, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));

    std::fs::write(&path, card)?;
    Ok(path)
}
