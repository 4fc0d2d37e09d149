//! Student entity - a named person plus the courses they are enrolled in.
//!
//! Stored as `{ "user_id", "name", "enrolled_course_ids" }`; `id` is accepted in
//! place of `user_id` when reading older files.

use super::{Identified, NamedEntity, PersonName, dedup_ids, ids, push_unique, remove_id};
use crate::errors::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "user_id", alias = "id", deserialize_with = "ids::one")]
    id: i64,
    name: PersonName,
    /// Enrolled course IDs in enrolment order, never repeated.
    #[serde(default, deserialize_with = "ids::list")]
    enrolled_course_ids: Vec<i64>,
}

impl Student {
    /// Creates a student, validating the name and dropping repeated course IDs.
    pub fn new(id: i64, name: &str, enrolled_course_ids: impl IntoIterator<Item = i64>) -> Result<Self> {
        Ok(Self {
            id,
            name: PersonName::parse(name)?,
            enrolled_course_ids: dedup_ids(enrolled_course_ids),
        })
    }

    #[must_use]
    pub fn enrolled_course_ids(&self) -> &[i64] {
        &self.enrolled_course_ids
    }

    #[must_use]
    pub fn is_enrolled_in(&self, course_id: i64) -> bool {
        self.enrolled_course_ids.contains(&course_id)
    }

    /// Adds a course unless already enrolled. Returns whether anything changed.
    pub fn enroll_course(&mut self, course_id: i64) -> bool {
        push_unique(&mut self.enrolled_course_ids, course_id)
    }

    /// Removes a course if enrolled. Returns whether anything changed.
    pub fn drop_course(&mut self, course_id: i64) -> bool {
        remove_id(&mut self.enrolled_course_ids, course_id)
    }
}

impl Identified for Student {
    fn id(&self) -> i64 {
        self.id
    }
}

impl NamedEntity for Student {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn set_name(&mut self, name: PersonName) {
        self.name = name;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use serde_json::json;

    #[test]
    fn test_new_student_validates_and_dedups() {
        let student = Student::new(1, " Alice ", [3, 1, 3]).unwrap();
        assert_eq!(student.name(), "Alice");
        assert_eq!(student.enrolled_course_ids(), &[3, 1]);

        let err = Student::new(2, "4lice", []).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_enroll_and_drop_are_idempotent() {
        let mut student = Student::new(1, "Alice", []).unwrap();
        assert!(student.enroll_course(5));
        assert!(!student.enroll_course(5));
        assert!(student.is_enrolled_in(5));
        assert!(student.drop_course(5));
        assert!(!student.drop_course(5));
        assert!(student.enrolled_course_ids().is_empty());
    }

    #[test]
    fn test_rename_keeps_old_name_on_failure() {
        let mut student = Student::new(1, "Alice", []).unwrap();
        assert!(student.rename("Al1ce").is_err());
        assert_eq!(student.name(), "Alice");
        student.rename("Alicia").unwrap();
        assert_eq!(student.name(), "Alicia");
    }

    #[test]
    fn test_serialized_layout_and_id_alias() {
        let student = Student::new(4, "Dan", [2]).unwrap();
        let value = serde_json::to_value(&student).unwrap();
        assert_eq!(
            value,
            json!({"user_id": 4, "name": "Dan", "enrolled_course_ids": [2]})
        );

        let legacy: Student =
            serde_json::from_value(json!({"id": "4", "name": "Dan"})).unwrap();
        assert_eq!(legacy.id(), 4);
        assert!(legacy.enrolled_course_ids().is_empty());
    }
}
