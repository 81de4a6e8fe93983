//! Hours-remaining banner arithmetic

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone};

/// Whole hours between `now` and the deadline, never less than 1.
///
/// Without an explicit deadline the campaign closes at 23:59:59 on the day
/// of `now`, in `now`'s offset.
pub fn hours_remaining(deadline: Option<DateTime<FixedOffset>>, now: DateTime<FixedOffset>) -> u32 {
    let end = deadline.or_else(|| end_of_day(now));
    let hours = end
        .map(|end| (end - now).num_seconds() / 3600)
        .unwrap_or(0);
    u32::try_from(hours).unwrap_or(0).max(1)
}

fn end_of_day(now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let time = NaiveTime::from_hms_opt(23, 59, 59)?;
    now.offset()
        .from_local_datetime(&now.date_naive().and_time(time))
        .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_counts_to_end_of_day() {
        assert_eq!(hours_remaining(None, at("2025-06-30T09:00:00+01:00")), 14);
        assert_eq!(hours_remaining(None, at("2025-06-30T00:00:01+01:00")), 23);
    }

    #[test]
    fn test_minimum_one_hour() {
        assert_eq!(hours_remaining(None, at("2025-06-30T23:30:00+01:00")), 1);
    }

    #[test]
    fn test_explicit_deadline() {
        let deadline = at("2025-07-02T12:00:00+00:00");
        assert_eq!(hours_remaining(Some(deadline), at("2025-07-01T12:00:00+00:00")), 24);
        // already passed
        assert_eq!(hours_remaining(Some(deadline), at("2025-07-03T00:00:00+00:00")), 1);
    }
}
