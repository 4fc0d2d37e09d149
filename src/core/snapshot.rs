//! Persisted layout of the schedule data and the repairs applied on load.
//!
//! One JSON object with the keys `students`, `teachers`, `courses`,
//! `attendance`, `finance`, `next_student_id`, `next_teacher_id` and
//! `next_course_id`. Missing keys are back-filled with their defaults.

use crate::entities::{
    AttendanceRecord, Course, Identified, PaymentRecord, Student, Teacher,
};
use crate::errors::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub courses: Vec<Course>,
    pub attendance: Vec<AttendanceRecord>,
    pub finance: Vec<PaymentRecord>,
    pub next_student_id: i64,
    pub next_teacher_id: i64,
    pub next_course_id: i64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            students: Vec::new(),
            teachers: Vec::new(),
            courses: Vec::new(),
            attendance: Vec::new(),
            finance: Vec::new(),
            next_student_id: 1,
            next_teacher_id: 1,
            next_course_id: 1,
        }
    }
}

/// The smallest counter value at or above `counter` that no item uses, or
/// `None` when the largest ID leaves no room after it.
fn next_free_id<T: Identified>(counter: i64, items: &[T]) -> Option<i64> {
    let after_max = match items.iter().map(Identified::id).max() {
        Some(max) => max.checked_add(1)?,
        None => 1,
    };
    Some(counter.max(after_max).max(1))
}

impl Snapshot {
    /// Restores the relation invariants on data read from disk.
    ///
    /// - counters never point at an ID already in use
    /// - enrolments referencing missing students or courses are dropped
    /// - student/course membership is made symmetric (union of both sides)
    /// - course `teacher_id`s pointing at missing teachers are nulled
    /// - each teacher's `course_ids` is rebuilt from the courses' `teacher_id`
    /// - teachers without `last_updated` are stamped with `now()`, which is
    ///   only called when such a teacher exists
    ///
    /// Returns the number of individual repairs made.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] without changing anything if an entity holds
    /// `i64::MAX` as its ID, since no counter can then be placed past it.
    pub fn heal(&mut self, now: impl FnOnce() -> NaiveDateTime) -> Result<usize> {
        let mut repairs = 0;

        let exhausted = |kind: &str| Error::Storage {
            message: format!("{kind} ID space is exhausted; no ID can follow the largest one"),
        };
        let targets = [
            next_free_id(self.next_student_id, &self.students).ok_or_else(|| exhausted("student"))?,
            next_free_id(self.next_teacher_id, &self.teachers).ok_or_else(|| exhausted("teacher"))?,
            next_free_id(self.next_course_id, &self.courses).ok_or_else(|| exhausted("course"))?,
        ];
        let counters = [
            &mut self.next_student_id,
            &mut self.next_teacher_id,
            &mut self.next_course_id,
        ];
        for (counter, next) in counters.into_iter().zip(targets) {
            if *counter != next {
                *counter = next;
                repairs += 1;
            }
        }

        let student_ids: BTreeSet<i64> = self.students.iter().map(Identified::id).collect();
        let course_ids: BTreeSet<i64> = self.courses.iter().map(Identified::id).collect();
        let teacher_ids: BTreeSet<i64> = self.teachers.iter().map(Identified::id).collect();

        for student in &mut self.students {
            let dangling: Vec<i64> = student
                .enrolled_course_ids()
                .iter()
                .copied()
                .filter(|id| !course_ids.contains(id))
                .collect();
            for id in dangling {
                student.drop_course(id);
                repairs += 1;
            }
        }
        for course in &mut self.courses {
            let dangling: Vec<i64> = course
                .enrolled_student_ids()
                .iter()
                .copied()
                .filter(|id| !student_ids.contains(id))
                .collect();
            for id in dangling {
                course.remove_student(id);
                repairs += 1;
            }
            if course.teacher_id.is_some_and(|id| !teacher_ids.contains(&id)) {
                course.teacher_id = None;
                repairs += 1;
            }
        }

        for student in &mut self.students {
            for course in &mut self.courses {
                let forward = student.is_enrolled_in(course.id);
                let backward = course.has_student(student.id());
                if forward && !backward {
                    course.enroll_student(student.id());
                    repairs += 1;
                } else if backward && !forward {
                    student.enroll_course(course.id);
                    repairs += 1;
                }
            }
        }

        for teacher in &mut self.teachers {
            let taught: Vec<i64> = self
                .courses
                .iter()
                .filter(|c| c.teacher_id == Some(teacher.id()))
                .map(|c| c.id)
                .collect();
            let current: BTreeSet<i64> = teacher.course_ids().iter().copied().collect();
            if current != taught.iter().copied().collect::<BTreeSet<i64>>() {
                // keep the teacher's own order for courses that are still theirs
                let kept = teacher
                    .course_ids()
                    .iter()
                    .copied()
                    .filter(|id| taught.contains(id));
                let missing = taught.iter().copied().filter(|id| !current.contains(id));
                let rebuilt: Vec<i64> = kept.chain(missing).collect();
                teacher.set_course_ids(rebuilt);
                repairs += 1;
            }
        }

        let mut unstamped = self
            .teachers
            .iter_mut()
            .filter(|t| t.last_updated().is_none())
            .peekable();
        if unstamped.peek().is_some() {
            let now = now();
            for teacher in unstamped {
                teacher.touch(now);
                repairs += 1;
            }
        }

        if repairs > 0 {
            warn!("Repaired {} inconsistencies in loaded schedule data", repairs);
        }
        Ok(repairs)
    }
}
