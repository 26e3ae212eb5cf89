//! Windows FILETIME conversions. Directory timestamps are 100-nanosecond ticks since
//! 1601-01-01 UTC; durations such as the lockout observation window are stored as negative tick
//! counts.

use time::{Duration, OffsetDateTime};

pub const TICKS_PER_SECOND: i128 = 10_000_000;

const NANOS_PER_TICK: i128 = 100;
const FILETIME_UNIX_DIFF_SECONDS: i128 = 11_644_473_600;

pub fn to_ticks(at: OffsetDateTime) -> i128 {
	at.unix_timestamp_nanos() / NANOS_PER_TICK + FILETIME_UNIX_DIFF_SECONDS * TICKS_PER_SECOND
}

/// Returns `None` when the tick count falls outside the representable date range.
pub fn from_ticks(ticks: i128) -> Option<OffsetDateTime> {
	let unix_ticks = ticks.checked_sub(FILETIME_UNIX_DIFF_SECONDS * TICKS_PER_SECOND)?;
	let nanos = unix_ticks.checked_mul(NANOS_PER_TICK)?;

	OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

/// Parses a FILETIME attribute. Zero and `i64::MAX` both mean "never".
pub fn parse(raw: &str) -> Option<OffsetDateTime> {
	let ticks: i64 = raw.trim().parse().ok()?;

	if ticks <= 0 || ticks == i64::MAX {
		return None;
	}

	from_ticks(ticks as i128)
}

/// Converts a directory interval (negative ticks) into a positive duration.
pub fn parse_interval(raw: &str) -> Option<Duration> {
	let ticks: i64 = raw.trim().parse().ok()?;
	let ticks = (ticks as i128).checked_abs()?;
	let seconds = i64::try_from(ticks / TICKS_PER_SECOND).ok()?;
	let nanos = ((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK) as i32;

	Some(Duration::new(seconds, nanos))
}
