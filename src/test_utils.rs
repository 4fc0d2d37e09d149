//! Shared test utilities for MSMS.
//!
//! Helpers for building schedule managers on temporary directories or in
//! memory, a deterministic clock, and a small seeded roster.

use crate::{
    core::{Clock, ScheduleManager},
    errors::Result,
    storage::{JsonStore, LoadOutcome, PlainJsonStore},
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
        .with_test_writer()
        .try_init();
}

/// 2024-09-01 10:00:00 plus `secs` seconds.
#[must_use]
pub fn fixed_time(secs: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 9, 1)
        .and_then(|d| d.and_hms_opt(10, 0, 0))
        .unwrap_or_default()
        + TimeDelta::seconds(secs)
}

/// Clock that starts at [`fixed_time(0)`](fixed_time) and advances one second
/// per reading, so successive records get distinct, predictable stamps.
#[derive(Debug, Clone, Default)]
pub struct StepClock {
    ticks: Rc<Cell<i64>>,
}

impl StepClock {
    /// Number of readings taken so far, shared between clones.
    #[must_use]
    pub fn readings(&self) -> i64 {
        self.ticks.get()
    }
}

impl Clock for StepClock {
    fn now(&self) -> NaiveDateTime {
        let tick = self.ticks.get();
        self.ticks.set(tick + 1);
        fixed_time(tick)
    }
}

/// In-memory store shared between clones, for tests that reopen a manager
/// without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Rc<RefCell<HashMap<PathBuf, Value>>>,
}

impl MemoryStore {
    /// The value last written to `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Value> {
        self.files.borrow().get(path).cloned()
    }
}

impl JsonStore for MemoryStore {
    fn read(&self, path: &Path) -> LoadOutcome {
        match self.get(path) {
            Some(value) => LoadOutcome::Loaded(value),
            None => LoadOutcome::Absent,
        }
    }

    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        self.files.borrow_mut().insert(path.to_path_buf(), value.clone());
        Ok(())
    }
}

/// Store whose writes always fail, for exercising absorbed save errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl JsonStore for FailingStore {
    fn read(&self, _path: &Path) -> LoadOutcome {
        LoadOutcome::Absent
    }

    fn write(&self, path: &Path, _value: &Value) -> Result<()> {
        Err(crate::errors::Error::Storage {
            message: format!("refusing to write {}", path.display()),
        })
    }
}

/// A plaintext-backed manager in a fresh temporary directory, with a
/// [`StepClock`]. Keep the `TempDir` alive for the duration of the test.
pub fn setup_test_manager() -> Result<(TempDir, ScheduleManager)> {
    init_test_tracing();
    let dir = tempfile::tempdir()?;
    let manager = open_plain(dir.path());
    Ok((dir, manager))
}

/// Opens (or reopens) the plaintext manager stored under `dir`.
#[must_use]
pub fn open_plain(dir: &Path) -> ScheduleManager {
    ScheduleManager::open_with(
        dir.join("msms.json"),
        Box::new(PlainJsonStore),
        Box::new(StepClock::default()),
        None,
    )
}

/// A manager over a fresh [`MemoryStore`], returned alongside the store.
#[must_use]
pub fn memory_manager() -> (MemoryStore, ScheduleManager) {
    let store = MemoryStore::default();
    let manager = ScheduleManager::open_with(
        "memory/msms.json",
        Box::new(store.clone()),
        Box::new(StepClock::default()),
        None,
    );
    (store, manager)
}

/// IDs produced by [`seed_roster`].
#[derive(Debug, Clone, Copy)]
pub struct Roster {
    /// Alice
    pub student: i64,
    /// Bob, speciality Piano
    pub teacher: i64,
    /// Piano 101, taught by Bob
    pub course: i64,
}

/// Adds student Alice, teacher Bob (Piano) and course "Piano 101" taught by
/// Bob. Nobody is enrolled yet.
pub fn seed_roster(manager: &mut ScheduleManager) -> Result<Roster> {
    let student = manager.add_student("Alice", &[])?;
    let teacher = manager.add_teacher("Bob", "Piano")?;
    let course = manager.add_course("Piano 101", Some("Piano"), Some(teacher))?;
    Ok(Roster {
        student,
        teacher,
        course,
    })
}
