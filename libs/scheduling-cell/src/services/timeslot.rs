// libs/scheduling-cell/src/services/timeslot.rs
//
// Parsing and comparison for 12-hour slot strings ("09:15 AM"). This module
// owns the single overlap predicate used by every conflict-sensitive write
// path; nothing else in the workspace re-implements interval arithmetic.

use thiserror::Error;

/// The canonical 45-minute slot grid: 14 slots per day, 09:15 AM - 07:00 PM.
/// Appointments are not forced onto the grid; the calendar view simply skips
/// start times that do not match a label exactly.
pub const CANONICAL_SLOTS: [&str; 14] = [
    "09:15 AM", "10:00 AM", "10:45 AM", "11:30 AM", "12:15 PM", "01:00 PM", "01:45 PM",
    "02:30 PM", "03:15 PM", "04:00 PM", "04:45 PM", "05:30 PM", "06:15 PM", "07:00 PM",
];

pub const SLOT_DURATION_MINUTES: i32 = 45;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed time string {input:?}: {reason}")]
pub struct MalformedTimeError {
    pub input: String,
    pub reason: String,
}

impl MalformedTimeError {
    fn new(input: &str, reason: &str) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parse "H:MM AM/PM" into minutes since midnight. 12 AM maps to 0 and
/// 12 PM to 720.
pub fn to_minutes(slot: &str) -> Result<i32, MalformedTimeError> {
    let trimmed = slot.trim();

    let (clock, meridiem) = trimmed
        .rsplit_once(' ')
        .ok_or_else(|| MalformedTimeError::new(slot, "missing AM/PM"))?;

    let meridiem = meridiem.to_ascii_uppercase();
    if meridiem != "AM" && meridiem != "PM" {
        return Err(MalformedTimeError::new(slot, "unit must be AM or PM"));
    }

    let (hour_part, minute_part) = clock
        .split_once(':')
        .ok_or_else(|| MalformedTimeError::new(slot, "missing ':' separator"))?;

    let hour: i32 = hour_part
        .trim()
        .parse()
        .map_err(|_| MalformedTimeError::new(slot, "non-numeric hour"))?;
    let minute: i32 = minute_part
        .trim()
        .parse()
        .map_err(|_| MalformedTimeError::new(slot, "non-numeric minute"))?;

    if !(1..=12).contains(&hour) {
        return Err(MalformedTimeError::new(slot, "hour out of 1-12 range"));
    }
    if !(0..=59).contains(&minute) {
        return Err(MalformedTimeError::new(slot, "minute out of 0-59 range"));
    }

    let hour24 = match (hour, meridiem.as_str()) {
        (12, "AM") => 0,
        (12, "PM") => 12,
        (h, "AM") => h,
        (h, _) => h + 12,
    };

    Ok(hour24 * 60 + minute)
}

/// Signed duration in minutes; negative or zero means the caller supplied an
/// inverted or empty interval and should treat it as a validation failure.
pub fn duration(start: &str, end: &str) -> Result<i32, MalformedTimeError> {
    Ok(to_minutes(end)? - to_minutes(start)?)
}

/// Half-open interval overlap: [aStart, aEnd) intersects [bStart, bEnd).
pub fn overlaps(
    a_start: &str,
    a_end: &str,
    b_start: &str,
    b_end: &str,
) -> Result<bool, MalformedTimeError> {
    Ok(to_minutes(a_start)? < to_minutes(b_end)? && to_minutes(a_end)? > to_minutes(b_start)?)
}
