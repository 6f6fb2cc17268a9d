//! Due-date status classification and attendance flag rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How many days past the due date an assessment still counts as overdue
/// before it closes.
const OVERDUE_WINDOW_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Due,
    Overdue,
    Closed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Due => "due",
            Status::Overdue => "overdue",
            Status::Closed => "closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("invalid date: {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

pub fn parse_date(s: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| DateError::InvalidDate(s.to_string()))
}

/// An assessment due today is already overdue (zero days late), not due.
pub fn classify(due: NaiveDate, today: NaiveDate) -> Status {
    if today < due {
        return Status::Due;
    }
    let days_late = (today - due).num_days();
    if days_late <= OVERDUE_WINDOW_DAYS {
        Status::Overdue
    } else {
        Status::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Present,
    Absent,
    Late,
    Excused,
}

impl Flag {
    pub fn parse(s: &str) -> Option<Flag> {
        match s {
            "present" => Some(Flag::Present),
            "absent" => Some(Flag::Absent),
            "late" => Some(Flag::Late),
            "excused" => Some(Flag::Excused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceFlags {
    pub present: bool,
    pub absent: bool,
    pub late: bool,
    pub excused: bool,
}

impl AttendanceFlags {
    /// Applies one flag change. Present, absent and excused displace each
    /// other; late is independent of all three. Clearing a flag touches
    /// only that flag.
    pub fn apply(mut self, flag: Flag, value: bool) -> AttendanceFlags {
        match flag {
            Flag::Present => {
                self.present = value;
                if value {
                    self.absent = false;
                    self.excused = false;
                }
            }
            Flag::Absent => {
                self.absent = value;
                if value {
                    self.present = false;
                    self.excused = false;
                }
            }
            Flag::Excused => {
                self.excused = value;
                if value {
                    self.present = false;
                    self.absent = false;
                }
            }
            Flag::Late => {
                self.late = value;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).expect("test date")
    }

    #[test]
    fn due_before_due_date() {
        assert_eq!(classify(d("2024-06-10"), d("2024-06-09")), Status::Due);
        assert_eq!(classify(d("2024-06-10"), d("2023-12-31")), Status::Due);
    }

    #[test]
    fn due_date_itself_is_overdue() {
        // Zero days late lands in the overdue branch; this boundary is easy
        // to get wrong.
        assert_eq!(classify(d("2024-06-10"), d("2024-06-10")), Status::Overdue);
    }

    #[test]
    fn overdue_window_then_closed() {
        assert_eq!(classify(d("2024-06-10"), d("2024-06-11")), Status::Overdue);
        assert_eq!(classify(d("2024-06-10"), d("2024-06-12")), Status::Overdue);
        assert_eq!(classify(d("2024-06-10"), d("2024-06-13")), Status::Closed);
    }

    #[test]
    fn bad_dates_rejected() {
        assert!(parse_date("2024-13-40").is_err());
        assert!(parse_date("10/06/2024").is_err());
        assert!(parse_date("").is_err());
        assert!(parse_date(" 2024-06-10 ").is_ok());
    }

    #[test]
    fn present_displaces_absent_and_excused() {
        let flags = AttendanceFlags {
            excused: true,
            ..Default::default()
        };
        let flags = flags.apply(Flag::Present, true);
        assert!(flags.present);
        assert!(!flags.absent);
        assert!(!flags.excused);
    }

    #[test]
    fn absent_displaces_present_and_excused() {
        let flags = AttendanceFlags {
            present: true,
            ..Default::default()
        };
        let flags = flags.apply(Flag::Absent, true);
        assert!(flags.absent);
        assert!(!flags.present);
        assert!(!flags.excused);
    }

    #[test]
    fn excused_displaces_present_and_absent() {
        let flags = AttendanceFlags {
            absent: true,
            ..Default::default()
        };
        let flags = flags.apply(Flag::Excused, true);
        assert!(flags.excused);
        assert!(!flags.present);
        assert!(!flags.absent);
    }

    #[test]
    fn late_is_independent() {
        let flags = AttendanceFlags {
            present: true,
            ..Default::default()
        };
        let flags = flags.apply(Flag::Late, true);
        assert!(flags.present);
        assert!(flags.late);

        // And the exclusive flags never clear late.
        let flags = flags.apply(Flag::Absent, true);
        assert!(flags.late);
        assert!(flags.absent);
        assert!(!flags.present);
    }

    #[test]
    fn clearing_touches_only_that_flag() {
        let flags = AttendanceFlags {
            present: true,
            late: true,
            ..Default::default()
        };
        let flags = flags.apply(Flag::Present, false);
        assert!(!flags.present);
        assert!(flags.late);
    }
}
