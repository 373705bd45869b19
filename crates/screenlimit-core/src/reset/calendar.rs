use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike};

/// The first instant of the next calendar day, in `now`'s offset.
pub fn next_midnight(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| now.offset().from_local_datetime(&naive).single())
        .unwrap_or_else(|| now + Duration::days(1))
}

/// True during the minute 00:00.
pub fn is_midnight_minute(now: DateTime<FixedOffset>) -> bool {
    now.hour() == 0 && now.minute() == 0
}
