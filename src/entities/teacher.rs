//! Teacher entity - a named person with a speciality, the courses they teach,
//! and the time of their last change.

use super::{Identified, NamedEntity, PersonName, dedup_ids, ids, push_unique, remove_id, timestamp};
use crate::errors::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(deserialize_with = "ids::one")]
    id: i64,
    name: PersonName,
    speciality: String,
    #[serde(default, deserialize_with = "ids::list")]
    course_ids: Vec<i64>,
    /// `None` only for records read from files that predate the field.
    #[serde(default, with = "timestamp::option")]
    last_updated: Option<NaiveDateTime>,
}

fn validate_speciality(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Speciality cannot be empty."));
    }
    Ok(trimmed.to_string())
}

impl Teacher {
    pub fn new(id: i64, name: &str, speciality: &str, now: NaiveDateTime) -> Result<Self> {
        Ok(Self {
            id,
            name: PersonName::parse(name)?,
            speciality: validate_speciality(speciality)?,
            course_ids: Vec::new(),
            last_updated: Some(now),
        })
    }

    #[must_use]
    pub fn speciality(&self) -> &str {
        &self.speciality
    }

    #[must_use]
    pub fn course_ids(&self) -> &[i64] {
        &self.course_ids
    }

    #[must_use]
    pub const fn last_updated(&self) -> Option<NaiveDateTime> {
        self.last_updated
    }

    pub fn update_speciality(&mut self, raw: &str, now: NaiveDateTime) -> Result<()> {
        self.speciality = validate_speciality(raw)?;
        self.touch(now);
        Ok(())
    }

    /// Records a course as taught by this teacher.
    pub fn assign_course(&mut self, course_id: i64, now: NaiveDateTime) -> bool {
        let changed = push_unique(&mut self.course_ids, course_id);
        if changed {
            self.touch(now);
        }
        changed
    }

    pub fn remove_course(&mut self, course_id: i64, now: NaiveDateTime) -> bool {
        let changed = remove_id(&mut self.course_ids, course_id);
        if changed {
            self.touch(now);
        }
        changed
    }

    /// Marks the teacher as modified at `now`.
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.last_updated = Some(now);
    }

    /// Replaces the taught-course list wholesale, used when healing loaded data.
    pub(crate) fn set_course_ids(&mut self, course_ids: impl IntoIterator<Item = i64>) {
        self.course_ids = dedup_ids(course_ids);
    }
}

impl Identified for Teacher {
    fn id(&self) -> i64 {
        self.id
    }
}

impl NamedEntity for Teacher {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn set_name(&mut self, name: PersonName) {
        self.name = name;
    }
}
