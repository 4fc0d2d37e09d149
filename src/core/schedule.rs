//! Schedule manager - the single owner of students, teachers, courses and the
//! attendance and finance logs.
//!
//! Every mutating operation changes the in-memory collections and then writes
//! the full snapshot back through the [`JsonStore`], replacing the previous
//! file. Storage failures are logged and absorbed; they never surface to
//! callers. Lookups are linear scans over IDs, which is fine at the record
//! counts this targets.
//!
//! Relations kept in step on every mutation:
//! - `c.id ∈ s.enrolled_course_ids ⇔ s.id ∈ c.enrolled_student_ids`
//! - removing a course strips it from every student and from its teacher
//! - removing a teacher nulls `teacher_id` on its courses (courses survive)

use super::clock::{Clock, SystemClock};
use super::report::{self, ReportKind};
use super::snapshot::Snapshot;
use crate::config::StorageConfig;
use crate::entities::{
    AttendanceRecord, Course, Identified, NamedEntity, PaymentRecord, Student, Teacher,
    check_amount,
};
use crate::errors::{Error, Result};
use crate::storage::{EncryptedStore, JsonStore, LoadOutcome, PlainJsonStore};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

fn find<T: Identified>(items: &[T], id: i64) -> Option<&T> {
    items.iter().find(|item| item.id() == id)
}

fn find_mut<T: Identified>(items: &mut [T], id: i64) -> Option<&mut T> {
    items.iter_mut().find(|item| item.id() == id)
}

/// The counter value after `current`, or a validation error once the ID space
/// is used up.
fn advance(current: i64, kind: &str) -> Result<i64> {
    current
        .checked_add(1)
        .ok_or_else(|| Error::validation(format!("No more {kind} IDs are available.")))
}

fn decode_snapshot(value: Value, source: &Path) -> Snapshot {
    if !value.is_object() {
        warn!("Store {:?} does not hold a JSON object; using defaults", source);
        return Snapshot::default();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        error!("Deserialization error in {:?}; resetting to defaults: {}", source, e);
        Snapshot::default()
    })
}

pub struct ScheduleManager {
    data_path: PathBuf,
    store: Box<dyn JsonStore>,
    clock: Box<dyn Clock>,
    legacy_plain_path: Option<PathBuf>,
    state: Snapshot,
}

impl fmt::Debug for ScheduleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleManager")
            .field("data_path", &self.data_path)
            .field("students", &self.state.students.len())
            .field("teachers", &self.state.teachers.len())
            .field("courses", &self.state.courses.len())
            .finish_non_exhaustive()
    }
}

impl ScheduleManager {
    /// Opens the data at `data_path` through `store`, using the system clock.
    ///
    /// Never fails: a missing, empty or malformed file yields an empty
    /// schedule, and the cleaned-up state is written straight back.
    pub fn open(data_path: impl Into<PathBuf>, store: Box<dyn JsonStore>) -> Self {
        Self::open_with(data_path, store, Box::new(SystemClock), None)
    }

    /// Like [`ScheduleManager::open`] with an explicit clock and an optional
    /// plaintext predecessor file to migrate from when `data_path` is absent.
    pub fn open_with(
        data_path: impl Into<PathBuf>,
        store: Box<dyn JsonStore>,
        clock: Box<dyn Clock>,
        legacy_plain_path: Option<PathBuf>,
    ) -> Self {
        let mut manager = Self {
            data_path: data_path.into(),
            store,
            clock,
            legacy_plain_path,
            state: Snapshot::default(),
        };
        manager.load();
        manager
    }

    /// Opens the schedule described by the storage configuration, encrypted or
    /// plain.
    ///
    /// # Errors
    /// Fails only if encryption is enabled and the key cannot be loaded or
    /// created.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Box<dyn JsonStore> = if config.encrypt {
            Box::new(EncryptedStore::open(&config.key_path)?)
        } else {
            Box::new(PlainJsonStore)
        };
        let legacy = if config.encrypt {
            config.legacy_plain_path.clone()
        } else {
            None
        };
        Ok(Self::open_with(
            &config.data_path,
            store,
            Box::new(SystemClock),
            legacy,
        ))
    }

    // ---------- persistence ----------

    #[instrument(skip(self), fields(path = ?self.data_path))]
    fn load(&mut self) {
        let mut snapshot = match self.store.read(&self.data_path) {
            LoadOutcome::Loaded(value) => decode_snapshot(value, &self.data_path),
            LoadOutcome::Absent => self.read_legacy().unwrap_or_default(),
            LoadOutcome::Corrupt(reason) => {
                warn!("Store {:?} is unreadable ({}); using defaults", self.data_path, reason);
                Snapshot::default()
            }
        };
        self.state = match snapshot.heal(|| self.clock.now()) {
            Ok(_) => snapshot,
            Err(e) => {
                warn!("Store {:?} is unusable ({}); using defaults", self.data_path, e);
                Snapshot::default()
            }
        };

        // Write back so a corrupt or partial file is replaced by a clean one.
        if let Err(e) = self.save() {
            warn!("Save after load (healing) failed: {}", e);
        }
        info!(
            "Loaded {} students, {} teachers, {} courses from {:?}",
            self.state.students.len(),
            self.state.teachers.len(),
            self.state.courses.len(),
            self.data_path
        );
    }

    fn read_legacy(&self) -> Option<Snapshot> {
        let legacy = self.legacy_plain_path.as_ref()?;
        if legacy == &self.data_path {
            return None;
        }
        match PlainJsonStore.read(legacy) {
            LoadOutcome::Loaded(value) => {
                info!("Migrating plaintext {:?} -> {:?}", legacy, self.data_path);
                Some(decode_snapshot(value, legacy))
            }
            LoadOutcome::Absent => None,
            LoadOutcome::Corrupt(reason) => {
                warn!("Migration read failed from {:?}: {}", legacy, reason);
                None
            }
        }
    }

    fn save(&self) -> Result<()> {
        let value = serde_json::to_value(&self.state)?;
        self.store.write(&self.data_path, &value)?;
        debug!("Persisted schedule snapshot to {:?}", self.data_path);
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("Failed to persist schedule data to {:?}: {}", self.data_path, e);
        }
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    // ---------- accessors ----------

    #[must_use]
    pub fn students(&self) -> &[Student] {
        &self.state.students
    }

    #[must_use]
    pub fn teachers(&self) -> &[Teacher] {
        &self.state.teachers
    }

    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.state.courses
    }

    #[must_use]
    pub fn attendance(&self) -> &[AttendanceRecord] {
        &self.state.attendance
    }

    #[must_use]
    pub fn finance(&self) -> &[PaymentRecord] {
        &self.state.finance
    }

    #[must_use]
    pub fn find_student_by_id(&self, student_id: i64) -> Option<&Student> {
        find(&self.state.students, student_id)
    }

    #[must_use]
    pub fn find_teacher_by_id(&self, teacher_id: i64) -> Option<&Teacher> {
        find(&self.state.teachers, teacher_id)
    }

    #[must_use]
    pub fn find_course_by_id(&self, course_id: i64) -> Option<&Course> {
        find(&self.state.courses, course_id)
    }

    /// Case-insensitive substring search over student names.
    #[must_use]
    pub fn find_students_by_name(&self, needle: &str) -> Vec<&Student> {
        let needle = needle.trim().to_lowercase();
        self.state
            .students
            .iter()
            .filter(|s| s.name().to_lowercase().contains(&needle))
            .collect()
    }

    /// Case-insensitive substring search over teacher names and specialities.
    #[must_use]
    pub fn find_teachers_by_name_or_speciality(&self, keyword: &str) -> Vec<&Teacher> {
        let keyword = keyword.trim().to_lowercase();
        self.state
            .teachers
            .iter()
            .filter(|t| {
                t.name().to_lowercase().contains(&keyword)
                    || t.speciality().to_lowercase().contains(&keyword)
            })
            .collect()
    }

    // ---------- creation / deletion ----------

    /// Registers a student and enrols them in `course_ids` in one step.
    ///
    /// Nothing is stored unless the name and every course ID are valid.
    ///
    /// # Errors
    /// [`Error::Validation`] for an invalid name, an unknown course ID or when
    /// no student ID is left to hand out.
    #[instrument(skip(self))]
    pub fn add_student(&mut self, name: &str, course_ids: &[i64]) -> Result<i64> {
        let next = advance(self.state.next_student_id, "student")?;
        let student = Student::new(self.state.next_student_id, name, course_ids.iter().copied())?;
        if let Some(missing) = student
            .enrolled_course_ids()
            .iter()
            .find(|&&cid| self.find_course_by_id(cid).is_none())
        {
            return Err(Error::validation(format!(
                "Course id {missing} does not exist."
            )));
        }

        let student_id = student.id();
        for &course_id in student.enrolled_course_ids() {
            if let Some(course) = find_mut(&mut self.state.courses, course_id) {
                course.enroll_student(student_id);
            }
        }
        self.state.students.push(student);
        self.state.next_student_id = next;
        self.persist();
        info!("Student added: id={}, name={}", student_id, name.trim());
        Ok(student_id)
    }

    #[instrument(skip(self))]
    pub fn remove_student(&mut self, student_id: i64) -> bool {
        if self.find_student_by_id(student_id).is_none() {
            return false;
        }
        for course in &mut self.state.courses {
            course.remove_student(student_id);
        }
        self.state.students.retain(|s| s.id() != student_id);
        self.persist();
        info!("Student removed: id={}", student_id);
        true
    }

    /// # Errors
    /// [`Error::Validation`] for an invalid name, an empty speciality or when
    /// no teacher ID is left to hand out.
    #[instrument(skip(self))]
    pub fn add_teacher(&mut self, name: &str, speciality: &str) -> Result<i64> {
        let next = advance(self.state.next_teacher_id, "teacher")?;
        let teacher = Teacher::new(
            self.state.next_teacher_id,
            name,
            speciality,
            self.clock.now(),
        )?;
        let teacher_id = teacher.id();
        self.state.teachers.push(teacher);
        self.state.next_teacher_id = next;
        self.persist();
        info!(
            "Teacher added: id={}, name={}, speciality={}",
            teacher_id,
            name.trim(),
            speciality.trim()
        );
        Ok(teacher_id)
    }

    /// Removes a teacher. Their courses stay, with `teacher_id` cleared.
    #[instrument(skip(self))]
    pub fn remove_teacher(&mut self, teacher_id: i64) -> bool {
        if self.find_teacher_by_id(teacher_id).is_none() {
            return false;
        }
        for course in &mut self.state.courses {
            if course.teacher_id == Some(teacher_id) {
                course.teacher_id = None;
            }
        }
        self.state.teachers.retain(|t| t.id() != teacher_id);
        self.persist();
        info!("Teacher removed: id={}", teacher_id);
        true
    }

    /// Creates a course. A `teacher_id` that names no teacher is dropped, since
    /// a course may only point at an existing teacher or at none.
    ///
    /// # Errors
    /// [`Error::Validation`] when no course ID is left to hand out.
    #[instrument(skip(self))]
    pub fn add_course(
        &mut self,
        name: &str,
        instrument: Option<&str>,
        teacher_id: Option<i64>,
    ) -> Result<i64> {
        let next = advance(self.state.next_course_id, "course")?;
        let course_id = self.state.next_course_id;
        let now = self.clock.now();
        let teacher_id = teacher_id.filter(|&tid| {
            let found = find_mut(&mut self.state.teachers, tid).map(|t| t.assign_course(course_id, now));
            if found.is_none() {
                warn!("Course {} references unknown teacher {}; leaving it unassigned", course_id, tid);
            }
            found.is_some()
        });

        self.state
            .courses
            .push(Course::new(course_id, name, instrument, teacher_id));
        self.state.next_course_id = next;
        self.persist();
        info!(
            "Course added: id={}, name={}, instrument={:?}, teacher_id={:?}",
            course_id,
            name.trim(),
            instrument,
            teacher_id
        );
        Ok(course_id)
    }

    /// Removes a course, stripping it from every student's enrolments and from
    /// its teacher.
    #[instrument(skip(self))]
    pub fn remove_course(&mut self, course_id: i64) -> bool {
        let Some(course) = self.find_course_by_id(course_id) else {
            return false;
        };
        let teacher_id = course.teacher_id;

        for student in &mut self.state.students {
            student.drop_course(course_id);
        }
        if let Some(teacher) = teacher_id.and_then(|tid| find_mut(&mut self.state.teachers, tid)) {
            teacher.remove_course(course_id, self.clock.now());
        }
        self.state.courses.retain(|c| c.id != course_id);
        self.persist();
        info!("Course removed: id={}", course_id);
        true
    }

    /// Points a course at a different teacher, or at none.
    ///
    /// Returns `false` if the course or the new teacher does not exist.
    #[instrument(skip(self))]
    pub fn assign_teacher(&mut self, course_id: i64, teacher_id: Option<i64>) -> bool {
        let Some(course) = self.find_course_by_id(course_id) else {
            return false;
        };
        if teacher_id.is_some_and(|tid| self.find_teacher_by_id(tid).is_none()) {
            return false;
        }
        let previous = course.teacher_id;
        let now = self.clock.now();

        if let Some(old) = previous.and_then(|tid| find_mut(&mut self.state.teachers, tid)) {
            old.remove_course(course_id, now);
        }
        if let Some(new) = teacher_id.and_then(|tid| find_mut(&mut self.state.teachers, tid)) {
            new.assign_course(course_id, now);
        }
        if let Some(course) = find_mut(&mut self.state.courses, course_id) {
            course.teacher_id = teacher_id;
        }
        self.persist();
        info!(
            "Course {} teacher changed: {:?} -> {:?}",
            course_id, previous, teacher_id
        );
        true
    }

    // ---------- updates ----------

    /// Renames a student. `Ok(false)` if the student does not exist.
    ///
    /// # Errors
    /// [`Error::Validation`] for an invalid name; the student is unchanged.
    pub fn rename_student(&mut self, student_id: i64, new_name: &str) -> Result<bool> {
        let Some(student) = find_mut(&mut self.state.students, student_id) else {
            return Ok(false);
        };
        student.rename(new_name)?;
        self.persist();
        info!("Student renamed: id={}, name={}", student_id, new_name.trim());
        Ok(true)
    }

    /// Renames a teacher. `Ok(false)` if the teacher does not exist.
    ///
    /// # Errors
    /// [`Error::Validation`] for an invalid name; the teacher is unchanged.
    pub fn rename_teacher(&mut self, teacher_id: i64, new_name: &str) -> Result<bool> {
        let now = self.clock.now();
        let Some(teacher) = find_mut(&mut self.state.teachers, teacher_id) else {
            return Ok(false);
        };
        teacher.rename(new_name)?;
        teacher.touch(now);
        self.persist();
        info!("Teacher renamed: id={}, name={}", teacher_id, new_name.trim());
        Ok(true)
    }

    /// # Errors
    /// [`Error::Validation`] for an empty speciality.
    pub fn update_teacher_speciality(&mut self, teacher_id: i64, speciality: &str) -> Result<bool> {
        let now = self.clock.now();
        let Some(teacher) = find_mut(&mut self.state.teachers, teacher_id) else {
            return Ok(false);
        };
        teacher.update_speciality(speciality, now)?;
        self.persist();
        info!(
            "Teacher speciality updated: id={}, speciality={}",
            teacher_id,
            speciality.trim()
        );
        Ok(true)
    }

    // ---------- enrolments ----------

    /// Enrols a student in a course on both sides of the relation. Enrolling
    /// twice is a no-op. `false` if either ID is unknown.
    #[instrument(skip(self))]
    pub fn enrol_student_in_course(&mut self, student_id: i64, course_id: i64) -> bool {
        if self.find_student_by_id(student_id).is_none() || self.find_course_by_id(course_id).is_none() {
            return false;
        }
        if let Some(course) = find_mut(&mut self.state.courses, course_id) {
            course.enroll_student(student_id);
        }
        if let Some(student) = find_mut(&mut self.state.students, student_id) {
            student.enroll_course(course_id);
        }
        self.persist();
        info!("Enrolment: student_id={} -> course_id={}", student_id, course_id);
        true
    }

    #[instrument(skip(self))]
    pub fn unenrol_student_from_course(&mut self, student_id: i64, course_id: i64) -> bool {
        if self.find_student_by_id(student_id).is_none() || self.find_course_by_id(course_id).is_none() {
            return false;
        }
        if let Some(course) = find_mut(&mut self.state.courses, course_id) {
            course.remove_student(student_id);
        }
        if let Some(student) = find_mut(&mut self.state.students, student_id) {
            student.drop_course(course_id);
        }
        self.persist();
        info!("Unenrol: student_id={} -/-> course_id={}", student_id, course_id);
        true
    }

    // ---------- attendance ----------

    /// Appends a check-in stamped with the current time. `false` if either ID
    /// is unknown.
    #[instrument(skip(self))]
    pub fn check_in(&mut self, student_id: i64, course_id: i64) -> bool {
        if self.find_student_by_id(student_id).is_none() || self.find_course_by_id(course_id).is_none() {
            return false;
        }
        self.state.attendance.push(AttendanceRecord {
            student_id,
            course_id,
            timestamp: self.clock.now(),
        });
        self.persist();
        info!("Check-in: student_id={}, course_id={}", student_id, course_id);
        true
    }

    #[must_use]
    pub fn get_attendance_by_student(&self, student_id: i64) -> Vec<&AttendanceRecord> {
        self.state
            .attendance
            .iter()
            .filter(|rec| rec.student_id == student_id)
            .collect()
    }

    #[must_use]
    pub fn get_attendance_by_course(&self, course_id: i64) -> Vec<&AttendanceRecord> {
        self.state
            .attendance
            .iter()
            .filter(|rec| rec.course_id == course_id)
            .collect()
    }

    // ---------- finance ----------

    /// Appends a payment stamped with the current time.
    ///
    /// # Errors
    /// [`Error::Validation`] if the student is unknown or the amount is
    /// negative or not a finite number.
    #[instrument(skip(self))]
    pub fn record_payment(&mut self, student_id: i64, amount: f64, method: &str) -> Result<()> {
        if self.find_student_by_id(student_id).is_none() {
            return Err(Error::validation(format!(
                "Student id {student_id} does not exist."
            )));
        }
        let amount = check_amount(amount)?;
        self.state.finance.push(PaymentRecord {
            student_id,
            amount,
            method: method.trim().to_string(),
            timestamp: self.clock.now(),
        });
        self.persist();
        info!(
            "Payment recorded: student_id={}, amount={}, method={}",
            student_id, amount, method
        );
        Ok(())
    }

    #[must_use]
    pub fn get_payment_history(&self, student_id: i64) -> Vec<&PaymentRecord> {
        self.state
            .finance
            .iter()
            .filter(|p| p.student_id == student_id)
            .collect()
    }

    // ---------- reports ----------

    /// Exports the `finance` or `attendance` log as CSV to `destination`.
    /// Returns the number of data rows written.
    ///
    /// # Errors
    /// [`Error::Validation`] for any other `kind`; I/O errors if the file
    /// cannot be written.
    #[instrument(skip(self))]
    pub fn export_report(&self, kind: &str, destination: &Path) -> Result<usize> {
        let kind: ReportKind = kind.parse()?;
        let written = match kind {
            ReportKind::Finance => report::write_csv(
                destination,
                kind.headers(),
                self.state.finance.iter().map(report::finance_row),
            )?,
            ReportKind::Attendance => report::write_csv(
                destination,
                kind.headers(),
                self.state.attendance.iter().map(report::attendance_row),
            )?,
        };
        info!("Report exported: kind={:?}, rows={}, path={:?}", kind, written, destination);
        Ok(written)
    }

    /// Writes a text ID card for a student into `folder`. `Ok(None)` if the
    /// student does not exist.
    pub fn save_student_card(&self, student_id: i64, folder: &Path) -> Result<Option<PathBuf>> {
        let Some(student) = self.find_student_by_id(student_id) else {
            return Ok(None);
        };
        let course_names: Vec<String> = student
            .enrolled_course_ids()
            .iter()
            .filter_map(|&cid| self.find_course_by_id(cid))
            .map(|c| c.name.clone())
            .collect();
        let path = report::write_student_card(
            folder,
            student.id(),
            student.name(),
            &course_names,
            self.clock.now(),
        )?;
        info!("Student card written: id={}, path={:?}", student_id, path);
        Ok(Some(path))
    }
}
