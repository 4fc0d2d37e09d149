//! Course entity - a named class, its optional instrument, a weak reference to
//! the teaching teacher, and the roster of enrolled students.
//!
//! `teacher_id` is never an ownership link: removing the teacher nulls it and
//! the course survives.

use super::{Identified, ids, push_unique, remove_id};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "ids::one")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "ids::optional")]
    pub teacher_id: Option<i64>,
    #[serde(default)]
    pub instrument: Option<String>,
    /// Enrolled student IDs in enrolment order, never repeated.
    #[serde(default, deserialize_with = "ids::list")]
    enrolled_student_ids: Vec<i64>,
}

impl Course {
    #[must_use]
    pub fn new(id: i64, name: &str, instrument: Option<&str>, teacher_id: Option<i64>) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            teacher_id,
            instrument: instrument
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            enrolled_student_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn enrolled_student_ids(&self) -> &[i64] {
        &self.enrolled_student_ids
    }

    #[must_use]
    pub fn has_student(&self, student_id: i64) -> bool {
        self.enrolled_student_ids.contains(&student_id)
    }

    pub fn enroll_student(&mut self, student_id: i64) -> bool {
        push_unique(&mut self.enrolled_student_ids, student_id)
    }

    pub fn remove_student(&mut self, student_id: i64) -> bool {
        remove_id(&mut self.enrolled_student_ids, student_id)
    }
}

impl Identified for Course {
    fn id(&self) -> i64 {
        self.id
    }
}
