//! Domain entities for the attendance ledger

pub mod attendance;
pub mod identity;

pub use attendance::{AttendanceRecord, AttendanceStatus, DayRow, DayStats, DayStatus, DayView};
pub use identity::Identity;
