/// User registration and password authentication
pub mod auth;
/// Timestamped data file backups
pub mod backup;
/// Time source for records
pub mod clock;
/// CSV reports and student ID cards
pub mod report;
/// The schedule manager - students, teachers, courses, attendance, finance
pub mod schedule;
/// Persisted snapshot layout and load-time repairs
pub mod snapshot;

pub use auth::{AuthenticatedUser, Role, UserAuth};
pub use backup::backup_data;
pub use clock::{Clock, SystemClock};
pub use report::ReportKind;
pub use schedule::ScheduleManager;
pub use snapshot::Snapshot;
