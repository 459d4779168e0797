//! Planned start and deadline of a new defect issue.

use chrono::{DateTime, Days, FixedOffset, Months};
use defect_gitee::Deadline;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Start at `created_at`; due one calendar month later, or `policy_days`
/// later when the component has an override. Times keep the issue's offset.
pub fn deadline(created_at: DateTime<FixedOffset>, policy_days: Option<u32>) -> Deadline {
  let due = match policy_days {
    Some(days) => created_at.checked_add_days(Days::new(u64::from(days))),
    None => created_at.checked_add_months(Months::new(1)),
  }
  .unwrap_or(created_at);

  Deadline {
    plan_started_at: created_at.format(FORMAT).to_string(),
    deadline:        due.format(FORMAT).to_string(),
  }
}
