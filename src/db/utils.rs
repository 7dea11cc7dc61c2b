use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

/// Midnight of the local calendar day containing `now`, as a UTC instant.
pub fn start_of_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    // Get the local calendar date at 00:00
    let midnight = now.date_naive().and_time(NaiveTime::MIN);

    // Convert back into UTC; a DST gap at midnight falls back to `now`
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now.with_timezone(&Utc))
}
